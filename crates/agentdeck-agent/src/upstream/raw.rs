//! Raw upstream event vocabulary.
//!
//! The agent writes one JSON object per line. Parsing is two-step: the line
//! becomes a `serde_json::Value`, then the `type` tag selects a variant.
//! Tags this module does not know become [`RawEvent::Unknown`] rather than
//! errors, so newer agents keep working.

use crate::error::UpstreamError;
use agentdeck_core::types::TurnSummary;
use serde_json::{Map, Value};

/// One item from the agent's native event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum RawEvent {
    /// Administrative message. `init` carries the continuation token.
    System {
        /// System subtype.
        subtype: String,
        /// Full payload.
        data: Value,
    },

    /// Partial message event.
    Stream(StreamEvent),

    /// Completed assistant message.
    Assistant {
        /// Content blocks.
        content: Vec<ContentBlock>,
    },

    /// Message fed back to the model, carrying tool results.
    User {
        /// Content blocks.
        content: Vec<ContentBlock>,
    },

    /// Terminal turn summary.
    Result {
        /// Turn-level statistics.
        summary: TurnSummary,
        /// Continuation token echoed by the agent.
        session_id: Option<String>,
    },

    /// Unrecognized event.
    Unknown {
        /// Original `type` tag.
        kind: String,
        /// Full payload.
        payload: Value,
    },
}

/// Partial message events.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Incremental content for the block at `index`.
    ContentBlockDelta {
        index: Option<u64>,
        delta: Delta,
        /// Original event.
        raw: Value,
    },

    /// A content block opened.
    ContentBlockStart {
        index: Option<u64>,
        /// Block type (`text`, `tool_use`, ...).
        block_type: String,
        /// Tool identifier for `tool_use` blocks.
        tool_id: Option<String>,
        /// Tool name for `tool_use` blocks.
        tool_name: Option<String>,
    },

    /// `message_start`, `message_delta`, `message_stop` or `content_block_stop`.
    Lifecycle { subtype: String, data: Value },

    /// Anything else.
    Unknown { subtype: String, data: Value },
}

/// Content of a `content_block_delta`.
#[derive(Debug, Clone, PartialEq)]
pub enum Delta {
    /// Generated text.
    Text(String),
    /// Fragment of a tool's JSON input.
    InputJson(String),
    /// Thinking, signatures, or future delta kinds.
    Other(Value),
}

/// Block inside an assistant or user message.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text(String),
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: Value,
        is_error: bool,
    },
    Other(Value),
}

const LIFECYCLE_EVENTS: &[&str] = &[
    "message_start",
    "message_delta",
    "message_stop",
    "content_block_stop",
];

impl RawEvent {
    /// Parse one line of agent output.
    pub fn parse_line(line: &str) -> Result<Self, UpstreamError> {
        let value: Value = serde_json::from_str(line)
            .map_err(|e| UpstreamError::Protocol(format!("invalid JSON line: {}", e)))?;
        Self::from_value(value)
    }

    /// Classify a decoded event object.
    pub fn from_value(value: Value) -> Result<Self, UpstreamError> {
        let Value::Object(obj) = value else {
            return Err(UpstreamError::Protocol("event is not an object".into()));
        };
        let kind = str_field(&obj, "type").unwrap_or_default();

        let event = match kind.as_str() {
            "system" => RawEvent::System {
                subtype: str_field(&obj, "subtype").unwrap_or_default(),
                data: Value::Object(obj),
            },
            "stream_event" => {
                let event = obj.get("event").cloned().unwrap_or(Value::Null);
                RawEvent::Stream(StreamEvent::from_value(event))
            }
            "assistant" => RawEvent::Assistant {
                content: message_content(&obj),
            },
            "user" => RawEvent::User {
                content: message_content(&obj),
            },
            "result" => RawEvent::Result {
                summary: TurnSummary {
                    subtype: str_field(&obj, "subtype").unwrap_or_default(),
                    is_error: obj.get("is_error").and_then(Value::as_bool).unwrap_or(false),
                    duration_ms: obj.get("duration_ms").and_then(Value::as_u64),
                    total_cost_usd: obj.get("total_cost_usd").and_then(Value::as_f64),
                    num_turns: obj
                        .get("num_turns")
                        .and_then(Value::as_u64)
                        .and_then(|n| u32::try_from(n).ok()),
                    usage: obj.get("usage").cloned().filter(|v| !v.is_null()),
                    result: str_field(&obj, "result"),
                },
                session_id: str_field(&obj, "session_id"),
            },
            _ => RawEvent::Unknown {
                kind,
                payload: Value::Object(obj),
            },
        };
        Ok(event)
    }

    /// Whether this event ends the turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RawEvent::Result { .. })
    }
}

impl StreamEvent {
    fn from_value(event: Value) -> Self {
        let subtype = event
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let index = event.get("index").and_then(Value::as_u64);

        match subtype.as_str() {
            "content_block_delta" => {
                let delta = event.get("delta").cloned().unwrap_or(Value::Null);
                let delta = match delta.get("type").and_then(Value::as_str) {
                    Some("text_delta") => Delta::Text(
                        delta
                            .get("text")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                    ),
                    Some("input_json_delta") => Delta::InputJson(
                        delta
                            .get("partial_json")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                    ),
                    _ => Delta::Other(delta),
                };
                StreamEvent::ContentBlockDelta {
                    index,
                    delta,
                    raw: event,
                }
            }
            "content_block_start" => {
                let block = event.get("content_block");
                let field = |name: &str| {
                    block
                        .and_then(|b| b.get(name))
                        .and_then(Value::as_str)
                        .map(String::from)
                };
                StreamEvent::ContentBlockStart {
                    index,
                    block_type: field("type").unwrap_or_default(),
                    tool_id: field("id"),
                    tool_name: field("name"),
                }
            }
            s if LIFECYCLE_EVENTS.contains(&s) => StreamEvent::Lifecycle {
                subtype,
                data: event,
            },
            _ => StreamEvent::Unknown {
                subtype,
                data: event,
            },
        }
    }
}

impl ContentBlock {
    fn from_value(block: &Value) -> Self {
        let text = |name: &str| {
            block
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        match block.get("type").and_then(Value::as_str) {
            Some("text") => ContentBlock::Text(text("text")),
            Some("tool_use") => ContentBlock::ToolUse {
                id: text("id"),
                name: text("name"),
                input: block.get("input").cloned().unwrap_or(Value::Null),
            },
            Some("tool_result") => ContentBlock::ToolResult {
                tool_use_id: text("tool_use_id"),
                content: block.get("content").cloned().unwrap_or(Value::Null),
                is_error: block.get("is_error").and_then(Value::as_bool).unwrap_or(false),
            },
            _ => ContentBlock::Other(block.clone()),
        }
    }
}

fn str_field(obj: &Map<String, Value>, name: &str) -> Option<String> {
    obj.get(name).and_then(Value::as_str).map(String::from)
}

/// Content blocks live under `message.content`. A bare string is a single
/// text block.
fn message_content(obj: &Map<String, Value>) -> Vec<ContentBlock> {
    match obj.get("message").and_then(|m| m.get("content")) {
        Some(Value::Array(blocks)) => blocks.iter().map(ContentBlock::from_value).collect(),
        Some(Value::String(text)) => vec![ContentBlock::Text(text.clone())],
        _ => Vec::new(),
    }
}
