//! Streaming chat endpoint.
//!
//! `POST /api/chat/stream` runs one turn through the relay and answers with
//! `text/event-stream`. Each SSE `data:` line carries one outbound event as
//! a JSON object; the stream ends after `done` or `error`. Closing the
//! connection cancels the turn, and whatever was accumulated so far is
//! still committed.

use crate::error::GatewayError;
use crate::server::AppState;
use crate::Result;
use agentdeck_agent::TurnRequest;
use agentdeck_core::types::{PermissionMode, SessionId, TurnOptions};
use agentdeck_store::NewSession;
use axum::extract::State;
use axum::http::header::{self, HeaderName};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

/// Body of `POST /api/chat/stream`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChatRequest {
    /// Target session; a new one is created when absent.
    pub session_id: Option<String>,
    pub message: String,
    /// Continuation token to resume when the session has none stored.
    pub resume: Option<String>,
    pub max_turns: Option<u32>,
    pub permission_mode: Option<String>,
}

impl ChatRequest {
    fn permission_mode(&self, default: PermissionMode) -> PermissionMode {
        match self.permission_mode.as_deref() {
            None => default,
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warn!(error = %e, "falling back to default permission mode");
                default
            }),
        }
    }
}

/// `POST /api/chat/stream`
pub async fn stream_chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Response> {
    if req.message.trim().is_empty() {
        return Err(GatewayError::InvalidParams("message must not be empty".into()));
    }

    let (session_id, created) = match &req.session_id {
        Some(id) => (SessionId::new(id), false),
        None => (state.registry.create(NewSession::default()).await?.id, true),
    };

    let options = TurnOptions {
        permission_mode: req.permission_mode(state.default_permission_mode),
        max_turns: req.max_turns,
        resume: req.resume.clone(),
    };

    let started = state
        .relay
        .start(TurnRequest {
            session_id: session_id.clone(),
            input: req.message,
            options,
        })
        .await;
    let handle = match started {
        Ok(handle) => handle,
        Err(e) => {
            if created {
                discard_session(&state, &session_id).await;
            }
            return Err(e.into());
        }
    };

    debug!(
        session_id = %handle.session_id,
        turn_id = %handle.turn_id,
        "Starting SSE stream"
    );

    let events = ReceiverStream::new(handle.events).map(|event| Event::default().json_data(event));

    let headers = [
        (header::CACHE_CONTROL, "no-cache"),
        (HeaderName::from_static("x-accel-buffering"), "no"),
    ];
    Ok((headers, Sse::new(events).keep_alive(KeepAlive::default())).into_response())
}

/// Remove a session created for a turn that never started.
async fn discard_session(state: &AppState, session_id: &SessionId) {
    if let Err(e) = state.registry.delete(session_id).await {
        warn!(session_id = %session_id, "Failed to remove unused session: {}", e);
    }
}
