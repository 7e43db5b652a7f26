//! Session types.

use super::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// A workspace-bound conversation identity.
///
/// The continuation token is issued by the upstream agent after the first
/// turn and lets the next turn resume the same upstream context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session ID.
    pub id: SessionId,

    /// Opaque upstream continuation token.
    pub continuation_token: Option<String>,

    /// Working directory handed to the upstream agent.
    pub workspace_path: PathBuf,

    /// Workspace folder name.
    pub workspace_name: Option<String>,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,

    /// Last activity timestamp.
    pub last_activity: DateTime<Utc>,

    /// Number of committed turns.
    pub turn_count: u32,

    /// Whether the session is active.
    pub is_active: bool,
}

impl Session {
    /// Create a new active session.
    pub fn new(id: SessionId, workspace_path: impl Into<PathBuf>) -> Self {
        let now = Utc::now();
        Self {
            id,
            continuation_token: None,
            workspace_path: workspace_path.into(),
            workspace_name: None,
            created_at: now,
            updated_at: now,
            last_activity: now,
            turn_count: 0,
            is_active: true,
        }
    }

    /// Set the workspace name.
    pub fn with_workspace_name(mut self, name: impl Into<String>) -> Self {
        self.workspace_name = Some(name.into());
        self
    }
}

/// Upstream permission mode for tool execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    /// Ask before every sensitive action.
    Default,

    /// Auto-accept file edits.
    #[default]
    AcceptEdits,

    /// Skip all permission prompts.
    BypassPermissions,

    /// Plan only, no edits.
    Plan,
}

impl PermissionMode {
    /// Get the wire name of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::AcceptEdits => "acceptEdits",
            Self::BypassPermissions => "bypassPermissions",
            Self::Plan => "plan",
        }
    }
}

impl fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "acceptEdits" => Ok(Self::AcceptEdits),
            "bypassPermissions" => Ok(Self::BypassPermissions),
            "plan" => Ok(Self::Plan),
            other => Err(format!("unknown permission mode: {}", other)),
        }
    }
}
