//! Gateway error types.

use agentdeck_agent::AgentError;
use agentdeck_store::StoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

/// Errors that can occur in the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid parameters.
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Not found error.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource is busy.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Storage error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Relay error.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// HTTP status for the error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidParams(_) | Self::Json(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Store(e) => store_status(e),
            Self::Agent(e) => match e {
                AgentError::SessionNotFound(_) => StatusCode::NOT_FOUND,
                AgentError::TurnInProgress(_) => StatusCode::CONFLICT,
                AgentError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                AgentError::Store(e) => store_status(e),
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Io(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self.status() {
            StatusCode::BAD_REQUEST => "invalid_request",
            StatusCode::NOT_FOUND => "not_found",
            StatusCode::CONFLICT => "conflict",
            StatusCode::FORBIDDEN => "forbidden",
            _ => "internal_error",
        }
    }
}

fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::SessionNotFound(_) | StoreError::TurnNotFound(_) | StoreError::PathNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        StoreError::Security(_) => StatusCode::FORBIDDEN,
        StoreError::AlreadyCommitted(_) => StatusCode::CONFLICT,
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let body = serde_json::json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        (status, Json(body)).into_response()
    }
}
