//! HTTP server.

use crate::error::GatewayError;
use crate::handlers;
use crate::Result;
use agentdeck_agent::Relay;
use agentdeck_core::config::ServerConfig;
use agentdeck_core::types::PermissionMode;
use agentdeck_store::{SessionRegistry, TurnStore, WorkspaceStore};
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared state handed to every handler.
pub struct AppState {
    /// Session registry.
    pub registry: Arc<dyn SessionRegistry>,

    /// Turn history.
    pub turns: Arc<dyn TurnStore>,

    /// Workspace directories.
    pub workspaces: WorkspaceStore,

    /// Turn relay.
    pub relay: Relay,

    /// Permission mode used when a chat request names none or an unknown one.
    pub default_permission_mode: PermissionMode,
}

/// The HTTP gateway.
pub struct Gateway {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl Gateway {
    /// Create a new gateway.
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self {
            config,
            state: Arc::new(state),
        }
    }

    /// Get the bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Build the router.
    pub fn router(&self) -> Router {
        create_router(self.state.clone(), &self.config)
    }

    /// Serve until Ctrl-C.
    pub async fn run(&self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Serve until `shutdown` resolves.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.bind_address();
        if !is_loopback(&self.config.host) {
            warn!(%addr, "gateway is listening on a non-loopback address without authentication");
        }

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!(addr = %listener.local_addr()?, "gateway listening");

        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))?;

        info!("gateway stopped");
        Ok(())
    }
}

fn is_loopback(host: &str) -> bool {
    matches!(host, "127.0.0.1" | "localhost" | "::1")
}

/// Build the API router over `state`.
pub fn create_router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    let mut router = Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::health))
        .route(
            "/api/sessions",
            get(handlers::sessions::list_sessions).post(handlers::sessions::create_session),
        )
        .route(
            "/api/sessions/:session_id",
            get(handlers::sessions::get_session).delete(handlers::sessions::delete_session),
        )
        .route(
            "/api/sessions/:session_id/messages",
            get(handlers::sessions::list_messages),
        )
        .route("/api/sessions/:session_id/files", get(handlers::files::list_files))
        .route(
            "/api/sessions/:session_id/files/content",
            get(handlers::files::file_content),
        )
        .route("/api/chat/stream", post(handlers::chat::stream_chat))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.cors {
        router = router.layer(create_cors_layer(&config.cors_origins));
    }

    router
}

fn create_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}


#[cfg(test)]
mod tests {
    use super::testing::TestApp;
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};

    #[test]
    fn test_loopback_hosts() {
        assert!(is_loopback("127.0.0.1"));
        assert!(is_loopback("localhost"));
        assert!(!is_loopback("0.0.0.0"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = TestApp::new().await;
        let (status, _) = app.get("/api/nothing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cors_preflight_allows_any_origin() {
        let app = TestApp::new().await;
        let response = app
            .request(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/sessions")
                    .header("origin", "http://localhost:3000")
                    .header("access-control-request-method", "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
    }
}
