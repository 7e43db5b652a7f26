//! Outbound event protocol.
//!
//! Every event the relay sends to a client is an [`OutboundEvent`]: the
//! correlation fields plus one [`EventKind`], serialized as a single flat
//! JSON object with a `type` tag. A stream always opens with `connected`
//! and ends with exactly one `done` or `error`.

use super::{SessionId, TurnId};
use serde::{Deserialize, Serialize};

/// A normalized event sent to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEvent {
    /// Correlation: session.
    pub session_id: SessionId,

    /// Correlation: turn.
    pub turn_id: TurnId,

    /// Event payload.
    #[serde(flatten)]
    pub kind: EventKind,
}

impl OutboundEvent {
    /// Create a new outbound event.
    pub fn new(session_id: SessionId, turn_id: TurnId, kind: EventKind) -> Self {
        Self {
            session_id,
            turn_id,
            kind,
        }
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }

    /// Wire tag of the event.
    pub fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }
}

/// Stable client-facing event vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Stream opened.
    Connected,

    /// Incremental assistant text.
    TextDelta { content: String },

    /// Raw fragment of a tool's streamed input arguments.
    ToolInputDelta { partial_json: String },

    /// A content unit started.
    ContentBlockStart {
        block_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool: Option<ToolRef>,
    },

    /// A tool invocation completed on the upstream side.
    #[serde(rename = "tool_use")]
    ToolInvoked { tool: ToolInvocation },

    /// A tool reported its result.
    ToolResult {
        tool_use_id: String,
        content: serde_json::Value,
        is_error: bool,
    },

    /// Block-boundary or administrative upstream event, passed through.
    #[serde(rename = "stream_event")]
    UpstreamStatus {
        event_type: String,
        data: serde_json::Value,
    },

    /// Upstream system message.
    #[serde(rename = "system")]
    SystemInfo {
        subtype: String,
        data: serde_json::Value,
    },

    /// Final turn statistics.
    #[serde(rename = "result")]
    ResultSummary { data: TurnSummary },

    /// Turn finished and committed.
    Done {
        #[serde(default)]
        continuation_token: Option<String>,
    },

    /// Turn failed.
    Error {
        error: String,
        classification: ErrorClass,
        detail: String,
        suggestion: String,
    },
}

impl EventKind {
    /// Whether this kind ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }

    /// Wire tag of the kind.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::TextDelta { .. } => "text_delta",
            Self::ToolInputDelta { .. } => "tool_input_delta",
            Self::ContentBlockStart { .. } => "content_block_start",
            Self::ToolInvoked { .. } => "tool_use",
            Self::ToolResult { .. } => "tool_result",
            Self::UpstreamStatus { .. } => "stream_event",
            Self::SystemInfo { .. } => "system",
            Self::ResultSummary { .. } => "result",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}

/// Tool identity announced at block start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRef {
    pub id: String,
    pub name: String,
}

/// A completed tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// Turn-level statistics reported by the upstream's terminal event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnSummary {
    #[serde(default)]
    pub subtype: String,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub total_cost_usd: Option<f64>,
    #[serde(default)]
    pub num_turns: Option<u32>,
    #[serde(default)]
    pub usage: Option<serde_json::Value>,
    #[serde(default)]
    pub result: Option<String>,
}

/// Classification attached to a terminal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorClass {
    /// The upstream no longer knows the stored continuation token.
    SessionInvalidated,

    /// The upstream stopped producing events in time.
    Timeout,

    /// Any other upstream failure.
    UpstreamError,

    /// A failure inside the relay itself.
    Internal,
}

impl ErrorClass {
    /// Wire name of the class.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionInvalidated => "session-invalidated",
            Self::Timeout => "timeout",
            Self::UpstreamError => "upstream-error",
            Self::Internal => "internal",
        }
    }

    /// Client-facing hint for recovering from this class of error.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::SessionInvalidated => {
                "The agent session has expired. Send your message again to start a fresh context."
            }
            Self::Timeout => "The agent stopped responding. Please try again.",
            Self::UpstreamError => "The agent failed while answering. Please try again.",
            Self::Internal => "An internal error occurred. Please try again later.",
        }
    }
}
