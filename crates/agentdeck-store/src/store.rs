//! Storage traits.

use crate::Result;
use agentdeck_core::types::{
    Session, SessionId, Turn, TurnCommit, TurnId, TurnOptions,
};
use async_trait::async_trait;

/// Request to create a session.
#[derive(Debug, Clone, Default)]
pub struct NewSession {
    /// Explicit session ID. Generated when absent.
    pub id: Option<SessionId>,

    /// Workspace folder name. Defaults to the session ID.
    pub workspace_name: Option<String>,
}

/// One page of sessions.
#[derive(Debug, Clone)]
pub struct SessionPage {
    /// Sessions on this page.
    pub sessions: Vec<Session>,

    /// Total matching sessions.
    pub total: u64,
}

/// Owner of session records and their continuation tokens.
#[async_trait]
pub trait SessionRegistry: Send + Sync {
    /// Create a session and its workspace.
    async fn create(&self, request: NewSession) -> Result<Session>;

    /// Get a session by ID.
    async fn get(&self, id: &SessionId) -> Result<Option<Session>>;

    /// List sessions, newest first.
    async fn list(&self, skip: u64, limit: u64, active_only: bool) -> Result<SessionPage>;

    /// Touch a session, optionally counting a turn and storing a new
    /// continuation token. A `None` token leaves the stored one in place.
    async fn update_activity(
        &self,
        id: &SessionId,
        increment_turn: bool,
        continuation_token: Option<&str>,
    ) -> Result<Option<Session>>;

    /// Forget the stored continuation token.
    async fn clear_continuation_token(&self, id: &SessionId) -> Result<()>;

    /// Delete a session, its turns, and its workspace.
    async fn delete(&self, id: &SessionId) -> Result<bool>;
}

/// Owner of turn records.
#[async_trait]
pub trait TurnStore: Send + Sync {
    /// Record the start of a turn.
    async fn create_turn(
        &self,
        session_id: &SessionId,
        input: &str,
        options: &TurnOptions,
    ) -> Result<Turn>;

    /// Persist a turn's final state and the session bookkeeping as one unit.
    async fn commit_turn(&self, commit: &TurnCommit) -> Result<()>;

    /// Get a turn by ID.
    async fn get_turn(&self, id: &TurnId) -> Result<Option<Turn>>;

    /// List a session's turns in chronological order.
    async fn list_turns(&self, session_id: &SessionId, skip: u64, limit: u64) -> Result<Vec<Turn>>;

    /// Count a session's turns.
    async fn count_turns(&self, session_id: &SessionId) -> Result<u64>;
}
