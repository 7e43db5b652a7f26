//! SQLite-backed session registry and turn store.

use crate::cache::SessionCache;
use crate::db::Database;
use crate::store::{NewSession, SessionPage, SessionRegistry, TurnStore};
use crate::workspace::WorkspaceStore;
use crate::{Result, StoreError};
use agentdeck_core::types::{
    PermissionMode, Session, SessionId, ToolCallRecord, Turn, TurnCommit, TurnId, TurnOptions,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: String,
    continuation_token: Option<String>,
    workspace_path: String,
    workspace_name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    turn_count: i64,
    is_active: bool,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            id: SessionId::new(row.id),
            continuation_token: row.continuation_token,
            workspace_path: PathBuf::from(row.workspace_path),
            workspace_name: row.workspace_name,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_activity: row.last_activity,
            turn_count: u32::try_from(row.turn_count).unwrap_or(u32::MAX),
            is_active: row.is_active,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TurnRow {
    id: String,
    session_id: String,
    input: String,
    output: Option<String>,
    tool_calls: Option<String>,
    permission_mode: String,
    max_turns: Option<i64>,
    resume_id: Option<String>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<TurnRow> for Turn {
    type Error = StoreError;

    fn try_from(row: TurnRow) -> Result<Self> {
        let tool_calls = row
            .tool_calls
            .as_deref()
            .map(serde_json::from_str::<Vec<ToolCallRecord>>)
            .transpose()?;

        let permission_mode = row.permission_mode.parse::<PermissionMode>().unwrap_or_else(|e| {
            warn!("Turn {} has {}; using default", row.id, e);
            PermissionMode::default()
        });

        Ok(Turn {
            id: TurnId::new(row.id),
            session_id: SessionId::new(row.session_id),
            input: row.input,
            output: row.output,
            tool_calls,
            options: TurnOptions {
                permission_mode,
                max_turns: row.max_turns.and_then(|n| u32::try_from(n).ok()),
                resume: row.resume_id,
            },
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

const SESSION_COLUMNS: &str = "id, continuation_token, workspace_path, workspace_name, \
     created_at, updated_at, last_activity, turn_count, is_active";

const TURN_COLUMNS: &str = "id, session_id, input, output, tool_calls, permission_mode, \
     max_turns, resume_id, created_at, completed_at";

/// Session registry and turn store over one SQLite database.
pub struct SqliteStore {
    db: Database,
    workspaces: WorkspaceStore,
    cache: SessionCache,
    max_sessions: u32,
}

impl SqliteStore {
    /// Create a store.
    pub fn new(db: Database, workspaces: WorkspaceStore, cache: SessionCache, max_sessions: u32) -> Self {
        Self {
            db,
            workspaces,
            cache,
            max_sessions,
        }
    }

    /// Workspace directories managed by this store.
    pub fn workspaces(&self) -> &WorkspaceStore {
        &self.workspaces
    }

    async fn fetch_session(&self, id: &SessionId) -> Result<Option<Session>> {
        let row: Option<SessionRow> =
            sqlx::query_as(&format!("SELECT {} FROM sessions WHERE id = ?", SESSION_COLUMNS))
                .bind(id.as_str())
                .fetch_optional(self.db.pool())
                .await?;
        Ok(row.map(Session::from))
    }

    async fn count_active(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE is_active = 1")
            .fetch_one(self.db.pool())
            .await?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl SessionRegistry for SqliteStore {
    async fn create(&self, request: NewSession) -> Result<Session> {
        if self.count_active().await? >= u64::from(self.max_sessions) {
            return Err(StoreError::SessionLimit {
                max: self.max_sessions,
            });
        }

        let id = request.id.unwrap_or_else(SessionId::generate);
        if id.as_str().is_empty() {
            return Err(StoreError::InvalidInput("session id is empty".to_string()));
        }
        if self.fetch_session(&id).await?.is_some() {
            return Err(StoreError::SessionExists(id.to_string()));
        }

        let path = self
            .workspaces
            .create(id.as_str(), request.workspace_name.as_deref())
            .await?;
        let name = request.workspace_name.unwrap_or_else(|| id.to_string());
        let session = Session::new(id, path).with_workspace_name(name);

        let inserted = sqlx::query(
            "INSERT INTO sessions (id, continuation_token, workspace_path, workspace_name, \
             created_at, updated_at, last_activity, turn_count, is_active) \
             VALUES (?, NULL, ?, ?, ?, ?, ?, 0, 1)",
        )
        .bind(session.id.as_str())
        .bind(session.workspace_path.to_string_lossy().into_owned())
        .bind(session.workspace_name.as_deref())
        .bind(session.created_at)
        .bind(session.updated_at)
        .bind(session.last_activity)
        .execute(self.db.pool())
        .await;

        if let Err(e) = inserted {
            if let Err(cleanup) = self.workspaces.delete(&session.workspace_path).await {
                warn!("Failed to remove orphaned workspace: {}", cleanup);
            }
            return Err(e.into());
        }

        info!("Created session {}", session.id);
        self.cache.insert(&session);
        Ok(session)
    }

    async fn get(&self, id: &SessionId) -> Result<Option<Session>> {
        if let Some(session) = self.cache.get(id) {
            return Ok(Some(session));
        }

        let seen = self.cache.generation();
        let session = self.fetch_session(id).await?;
        if let Some(ref s) = session {
            self.cache.insert_if_current(s, seen);
        }
        Ok(session)
    }

    async fn list(&self, skip: u64, limit: u64, active_only: bool) -> Result<SessionPage> {
        let filter = if active_only { "WHERE is_active = 1" } else { "" };

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM sessions {}", filter))
            .fetch_one(self.db.pool())
            .await?;

        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM sessions {} ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
            SESSION_COLUMNS, filter
        ))
        .bind(limit as i64)
        .bind(skip as i64)
        .fetch_all(self.db.pool())
        .await?;

        Ok(SessionPage {
            sessions: rows.into_iter().map(Session::from).collect(),
            total: total.max(0) as u64,
        })
    }

    async fn update_activity(
        &self,
        id: &SessionId,
        increment_turn: bool,
        continuation_token: Option<&str>,
    ) -> Result<Option<Session>> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE sessions SET last_activity = ?, updated_at = ?, \
             turn_count = turn_count + ?, \
             continuation_token = COALESCE(?, continuation_token) \
             WHERE id = ?",
        )
        .bind(now)
        .bind(now)
        .bind(i64::from(increment_turn))
        .bind(continuation_token)
        .bind(id.as_str())
        .execute(self.db.pool())
        .await?;

        self.cache.remove(id);
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get(id).await
    }

    async fn clear_continuation_token(&self, id: &SessionId) -> Result<()> {
        let result = sqlx::query(
            "UPDATE sessions SET continuation_token = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(id.as_str())
        .execute(self.db.pool())
        .await?;

        self.cache.remove(id);
        if result.rows_affected() == 0 {
            return Err(StoreError::SessionNotFound(id.to_string()));
        }
        debug!("Cleared continuation token for session {}", id);
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<bool> {
        let Some(session) = self.fetch_session(id).await? else {
            return Ok(false);
        };

        self.workspaces.delete(&session.workspace_path).await?;

        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id.as_str())
            .execute(self.db.pool())
            .await?;

        self.cache.remove(id);
        info!("Deleted session {}", id);
        Ok(true)
    }
}

#[async_trait]
impl TurnStore for SqliteStore {
    async fn create_turn(
        &self,
        session_id: &SessionId,
        input: &str,
        options: &TurnOptions,
    ) -> Result<Turn> {
        let turn = Turn::new(session_id.clone(), input, options.clone());

        let result = sqlx::query(
            "INSERT INTO turns (id, session_id, input, permission_mode, max_turns, resume_id, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(turn.id.as_str())
        .bind(session_id.as_str())
        .bind(input)
        .bind(options.permission_mode.as_str())
        .bind(options.max_turns.map(i64::from))
        .bind(options.resume.as_deref())
        .bind(turn.created_at)
        .execute(self.db.pool())
        .await;

        match result {
            Ok(_) => Ok(turn),
            Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
                Err(StoreError::SessionNotFound(session_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn commit_turn(&self, commit: &TurnCommit) -> Result<()> {
        let tool_calls = serde_json::to_string(&commit.tool_calls)?;

        let mut tx = self.db.pool().begin().await?;

        let updated = sqlx::query(
            "UPDATE turns SET output = ?, tool_calls = ?, completed_at = ? \
             WHERE id = ? AND session_id = ? AND completed_at IS NULL",
        )
        .bind(commit.output.as_deref())
        .bind(&tool_calls)
        .bind(commit.completed_at)
        .bind(commit.turn_id.as_str())
        .bind(commit.session_id.as_str())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            let exists: Option<String> = sqlx::query_scalar("SELECT id FROM turns WHERE id = ?")
                .bind(commit.turn_id.as_str())
                .fetch_optional(&mut *tx)
                .await?;
            return Err(match exists {
                Some(_) => StoreError::AlreadyCommitted(commit.turn_id.to_string()),
                None => StoreError::TurnNotFound(commit.turn_id.to_string()),
            });
        }

        let touched = sqlx::query(
            "UPDATE sessions SET last_activity = ?, updated_at = ?, \
             turn_count = turn_count + 1, \
             continuation_token = COALESCE(?, continuation_token) \
             WHERE id = ?",
        )
        .bind(commit.completed_at)
        .bind(commit.completed_at)
        .bind(commit.continuation_token.as_deref())
        .bind(commit.session_id.as_str())
        .execute(&mut *tx)
        .await?;

        if touched.rows_affected() == 0 {
            return Err(StoreError::SessionNotFound(commit.session_id.to_string()));
        }

        tx.commit().await?;
        self.cache.remove(&commit.session_id);

        debug!(
            "Committed turn {} ({} tool calls)",
            commit.turn_id,
            commit.tool_calls.len()
        );
        Ok(())
    }

    async fn get_turn(&self, id: &TurnId) -> Result<Option<Turn>> {
        let row: Option<TurnRow> =
            sqlx::query_as(&format!("SELECT {} FROM turns WHERE id = ?", TURN_COLUMNS))
                .bind(id.as_str())
                .fetch_optional(self.db.pool())
                .await?;
        row.map(Turn::try_from).transpose()
    }

    async fn list_turns(&self, session_id: &SessionId, skip: u64, limit: u64) -> Result<Vec<Turn>> {
        let rows: Vec<TurnRow> = sqlx::query_as(&format!(
            "SELECT {} FROM turns WHERE session_id = ? \
             ORDER BY created_at ASC, rowid ASC LIMIT ? OFFSET ?",
            TURN_COLUMNS
        ))
        .bind(session_id.as_str())
        .bind(limit as i64)
        .bind(skip as i64)
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter().map(Turn::try_from).collect()
    }

    async fn count_turns(&self, session_id: &SessionId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM turns WHERE session_id = ?")
            .bind(session_id.as_str())
            .fetch_one(self.db.pool())
            .await?;
        Ok(count.max(0) as u64)
    }
}
