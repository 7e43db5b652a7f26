//! Per-turn response accumulation.

use agentdeck_core::types::{
    EventKind, SessionId, ToolCallRecord, TurnCommit, TurnId,
};
use chrono::Utc;
use tracing::warn;

/// Folds one turn's outbound events into the fields persisted at commit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Accumulator {
    text: String,
    saw_delta: bool,
    tool_calls: Vec<ToolCallRecord>,
    continuation_token: Option<String>,
    result_text: Option<String>,
}

impl Accumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event.
    pub fn apply(&mut self, event: &EventKind) {
        match event {
            EventKind::TextDelta { content } => {
                self.saw_delta = true;
                self.text.push_str(content);
            }
            EventKind::ToolInvoked { tool } => {
                self.tool_calls.push(ToolCallRecord::new(
                    tool.id.clone(),
                    tool.name.clone(),
                    tool.input.clone(),
                ));
            }
            EventKind::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => match self.tool_calls.iter_mut().find(|c| &c.id == tool_use_id) {
                Some(call) => call.resolve(content.clone(), *is_error),
                None => warn!(tool_use_id = %tool_use_id, "Tool result for unknown tool call"),
            },
            EventKind::SystemInfo { subtype, data } if subtype == "init" => {
                if let Some(token) = data.get("session_id").and_then(|v| v.as_str()) {
                    self.continuation_token = Some(token.to_string());
                }
            }
            EventKind::ResultSummary { data } => {
                if data.result.is_some() {
                    self.result_text = data.result.clone();
                }
            }
            _ => {}
        }
    }

    /// Final text: the joined deltas if any arrived, else the result text.
    pub fn output(&self) -> Option<String> {
        if self.saw_delta {
            Some(self.text.clone())
        } else {
            self.result_text.clone()
        }
    }

    /// Tool calls in invocation order.
    pub fn tool_calls(&self) -> &[ToolCallRecord] {
        &self.tool_calls
    }

    /// Continuation token captured this turn.
    pub fn continuation_token(&self) -> Option<&str> {
        self.continuation_token.as_deref()
    }

    /// Build the commit for this turn.
    pub fn to_commit(&self, session_id: &SessionId, turn_id: &TurnId) -> TurnCommit {
        TurnCommit {
            session_id: session_id.clone(),
            turn_id: turn_id.clone(),
            output: self.output(),
            tool_calls: self.tool_calls.clone(),
            continuation_token: self.continuation_token.clone(),
            completed_at: Utc::now(),
        }
    }
}
