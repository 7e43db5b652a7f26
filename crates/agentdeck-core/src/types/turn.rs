//! Turn (conversation record) types.

use super::{PermissionMode, SessionId, TurnId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Options requested for a turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnOptions {
    /// Upstream permission mode.
    #[serde(default)]
    pub permission_mode: PermissionMode,

    /// Upstream turn limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,

    /// Explicit resume target supplied by the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume: Option<String>,
}

/// One request/response cycle within a session.
///
/// Created at request start with no output; mutated once at commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Turn ID.
    pub id: TurnId,

    /// Owning session.
    pub session_id: SessionId,

    /// User input text.
    pub input: String,

    /// Accumulated output text, set at commit.
    pub output: Option<String>,

    /// Tool calls made during the turn, set at commit.
    pub tool_calls: Option<Vec<ToolCallRecord>>,

    /// Requested options.
    pub options: TurnOptions,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Commit timestamp.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Turn {
    /// Create a new, uncommitted turn.
    pub fn new(session_id: SessionId, input: impl Into<String>, options: TurnOptions) -> Self {
        Self {
            id: TurnId::generate(),
            session_id,
            input: input.into(),
            output: None,
            tool_calls: None,
            options,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Whether the turn has been committed.
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// One tool invocation and, once reported, its result.
///
/// The identifier is assigned upstream and joins the invocation with its
/// later result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Upstream tool-use identifier.
    pub id: String,

    /// Tool name.
    pub name: String,

    /// Input payload.
    pub input: serde_json::Value,

    /// Result payload.
    pub result: Option<serde_json::Value>,

    /// Whether the tool reported an error.
    #[serde(default)]
    pub is_error: bool,
}

impl ToolCallRecord {
    /// Create a pending tool call.
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
            result: None,
            is_error: false,
        }
    }

    /// Attach the result reported by the upstream.
    pub fn resolve(&mut self, result: serde_json::Value, is_error: bool) {
        self.result = Some(result);
        self.is_error = is_error;
    }

    /// Whether a result has arrived.
    pub fn is_resolved(&self) -> bool {
        self.result.is_some()
    }
}

/// Final state of a turn handed to the persistence layer.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnCommit {
    /// Session the turn belongs to.
    pub session_id: SessionId,

    /// Turn being committed.
    pub turn_id: TurnId,

    /// Final output text.
    pub output: Option<String>,

    /// Tool calls in invocation order.
    pub tool_calls: Vec<ToolCallRecord>,

    /// Continuation token captured during this turn.
    pub continuation_token: Option<String>,

    /// Commit timestamp.
    pub completed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_turn_is_uncommitted() {
        let turn = Turn::new(SessionId::new("s1"), "hello", TurnOptions::default());
        assert!(!turn.is_completed());
        assert!(turn.output.is_none());
        assert!(turn.tool_calls.is_none());
        assert_eq!(turn.options.permission_mode, PermissionMode::AcceptEdits);
    }

    #[test]
    fn test_tool_call_resolve() {
        let mut call = ToolCallRecord::new("t1", "write_file", json!({"path": "a.txt"}));
        assert!(!call.is_resolved());

        call.resolve(json!("ok"), true);
        assert!(call.is_resolved());
        assert!(call.is_error);

        let value = serde_json::to_value(&call).unwrap();
        assert_eq!(value["id"], "t1");
        assert_eq!(value["result"], "ok");
        assert_eq!(value["is_error"], true);
    }

    #[test]
    fn test_tool_call_missing_is_error_defaults_false() {
        let call: ToolCallRecord = serde_json::from_value(json!({
            "id": "t2", "name": "read", "input": {}, "result": null
        }))
        .unwrap();
        assert!(!call.is_error);
    }
}
