//! Route handlers.

pub mod chat;
pub mod files;
pub mod health;
pub mod sessions;

use crate::error::GatewayError;
use crate::server::AppState;
use agentdeck_core::types::{Session, SessionId};

/// Look up a session or fail with 404.
pub(crate) async fn require_session(state: &AppState, id: &str) -> Result<Session, GatewayError> {
    state
        .registry
        .get(&SessionId::new(id))
        .await?
        .ok_or_else(|| GatewayError::NotFound(format!("Session {} not found", id)))
}
