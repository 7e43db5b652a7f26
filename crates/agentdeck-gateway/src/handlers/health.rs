//! Health and banner endpoints.

use axum::Json;
use serde::Serialize;

/// Service name reported by the API.
pub const APP_NAME: &str = "agentdeck";

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub app: &'static str,
    pub version: &'static str,
}

/// `GET /health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        app: APP_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /`
pub async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "AgentDeck API",
        "version": env!("CARGO_PKG_VERSION"),
        "health": "/health",
    }))
}
