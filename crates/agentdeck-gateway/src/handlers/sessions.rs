//! Session management and message history.

use super::require_session;
use crate::error::GatewayError;
use crate::server::AppState;
use crate::Result;
use agentdeck_core::types::{Session, SessionId, ToolCallRecord, Turn};
use agentdeck_store::NewSession;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

const DEFAULT_SESSION_LIMIT: u64 = 50;
const DEFAULT_MESSAGE_LIMIT: u64 = 100;
const MAX_LIMIT: u64 = 500;

/// Body of `POST /api/sessions`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateSessionRequest {
    pub session_id: Option<String>,
    pub workspace_name: Option<String>,
}

/// Paging parameters.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub skip: u64,
    pub limit: Option<u64>,
    pub active_only: bool,
}

impl ListQuery {
    fn limit_or(&self, default: u64) -> u64 {
        self.limit.unwrap_or(default).clamp(1, MAX_LIMIT)
    }
}

/// Response of `GET /api/sessions`.
#[derive(Debug, Serialize)]
pub struct SessionList {
    pub sessions: Vec<Session>,
    pub total: u64,
    pub skip: u64,
    pub limit: u64,
}

/// One chat message reconstructed from a stored turn.
#[derive(Debug, Serialize)]
pub struct Message {
    pub turn_id: String,
    pub role: &'static str,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRecord>>,
    pub created_at: DateTime<Utc>,
}

/// Response of `GET /api/sessions/{id}/messages`.
#[derive(Debug, Serialize)]
pub struct MessageList {
    pub messages: Vec<Message>,
    pub total: u64,
}

/// `POST /api/sessions`
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<Session>)> {
    let session = state
        .registry
        .create(NewSession {
            id: req.session_id.map(SessionId::new),
            workspace_name: req.workspace_name,
        })
        .await?;
    info!(session_id = %session.id, "session created");
    Ok((StatusCode::CREATED, Json(session)))
}

/// `GET /api/sessions`
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<SessionList>> {
    let limit = query.limit_or(DEFAULT_SESSION_LIMIT);
    let page = state
        .registry
        .list(query.skip, limit, query.active_only)
        .await?;
    Ok(Json(SessionList {
        sessions: page.sessions,
        total: page.total,
        skip: query.skip,
        limit,
    }))
}

/// `GET /api/sessions/{id}`
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<Session>> {
    Ok(Json(require_session(&state, &session_id).await?))
}

/// `DELETE /api/sessions/{id}`
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    if !state.registry.delete(&SessionId::new(&session_id)).await? {
        return Err(GatewayError::NotFound(format!(
            "Session {} not found",
            session_id
        )));
    }
    info!(session_id = %session_id, "session deleted");
    Ok(Json(serde_json::json!({
        "message": format!("Session {} deleted", session_id),
    })))
}

/// `GET /api/sessions/{id}/messages`
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<MessageList>> {
    let session = require_session(&state, &session_id).await?;
    let limit = query.limit_or(DEFAULT_MESSAGE_LIMIT);
    let turns = state.turns.list_turns(&session.id, query.skip, limit).await?;
    let total = state.turns.count_turns(&session.id).await?;

    Ok(Json(MessageList {
        messages: turns.into_iter().flat_map(expand_turn).collect(),
        total,
    }))
}

fn expand_turn(turn: Turn) -> Vec<Message> {
    let mut messages = vec![Message {
        turn_id: turn.id.to_string(),
        role: "user",
        content: turn.input,
        tool_calls: None,
        created_at: turn.created_at,
    }];
    if let Some(output) = turn.output {
        messages.push(Message {
            turn_id: turn.id.to_string(),
            role: "assistant",
            content: output,
            tool_calls: turn.tool_calls.filter(|calls| !calls.is_empty()),
            created_at: turn.completed_at.unwrap_or(turn.created_at),
        });
    }
    messages
}
