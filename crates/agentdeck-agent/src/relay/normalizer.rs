//! Raw event to outbound event translation.

use crate::upstream::{ContentBlock, Delta, RawEvent, StreamEvent};
use agentdeck_core::types::{
    EventKind, OutboundEvent, SessionId, ToolInvocation, ToolRef, TurnId,
};
use tracing::debug;

/// Translates raw upstream events into the client protocol for one turn.
///
/// Most raw events map to exactly one outbound event. An assistant message
/// maps to one `tool_use` per tool block and nothing for its text (already
/// streamed as deltas); a user message maps to one `tool_result` per result
/// block. Output order always follows input order.
#[derive(Debug, Clone)]
pub struct Normalizer {
    session_id: SessionId,
    turn_id: TurnId,
}

impl Normalizer {
    /// Create a normalizer stamping events with the given correlation IDs.
    pub fn new(session_id: SessionId, turn_id: TurnId) -> Self {
        Self {
            session_id,
            turn_id,
        }
    }

    /// Wrap a payload with this turn's correlation IDs.
    pub fn wrap(&self, kind: EventKind) -> OutboundEvent {
        OutboundEvent::new(self.session_id.clone(), self.turn_id.clone(), kind)
    }

    /// Translate one raw event.
    pub fn normalize(&self, event: RawEvent) -> Vec<OutboundEvent> {
        translate(event).into_iter().map(|kind| self.wrap(kind)).collect()
    }
}

fn translate(event: RawEvent) -> Vec<EventKind> {
    match event {
        RawEvent::System { subtype, data } => vec![EventKind::SystemInfo { subtype, data }],

        RawEvent::Stream(stream) => vec![translate_stream(stream)],

        RawEvent::Assistant { content } => content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => Some(EventKind::ToolInvoked {
                    tool: ToolInvocation { id, name, input },
                }),
                _ => None,
            })
            .collect(),

        RawEvent::User { content } => content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                } => Some(EventKind::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                }),
                _ => None,
            })
            .collect(),

        RawEvent::Result { summary, .. } => vec![EventKind::ResultSummary { data: summary }],

        RawEvent::Unknown { kind, payload } => {
            debug!("Forwarding unknown upstream event type {:?}", kind);
            vec![EventKind::UpstreamStatus {
                event_type: kind,
                data: payload,
            }]
        }
    }
}

fn translate_stream(event: StreamEvent) -> EventKind {
    match event {
        StreamEvent::ContentBlockDelta { delta, raw, .. } => match delta {
            Delta::Text(content) => EventKind::TextDelta { content },
            Delta::InputJson(partial_json) => EventKind::ToolInputDelta { partial_json },
            Delta::Other(_) => EventKind::UpstreamStatus {
                event_type: "content_block_delta".into(),
                data: raw,
            },
        },

        StreamEvent::ContentBlockStart {
            index,
            block_type,
            tool_id,
            tool_name,
        } => {
            let tool = match (block_type.as_str(), tool_id, tool_name) {
                ("tool_use", Some(id), Some(name)) => Some(ToolRef { id, name }),
                _ => None,
            };
            EventKind::ContentBlockStart {
                block_type,
                index,
                tool,
            }
        }

        StreamEvent::Lifecycle { subtype, data } => EventKind::UpstreamStatus {
            event_type: subtype,
            data,
        },

        StreamEvent::Unknown { subtype, data } => {
            debug!("Forwarding unknown stream event {:?}", subtype);
            EventKind::UpstreamStatus {
                event_type: subtype,
                data,
            }
        }
    }
}
