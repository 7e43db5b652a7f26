//! Shared fixtures for the cross-crate tests.

use agentdeck_agent::{AgentConnector, Relay, ScriptStep};
use agentdeck_core::config::RelayConfig;
use agentdeck_core::types::{Session, SessionId};
use agentdeck_store::{Database, NewSession, SessionCache, SessionRegistry, SqliteStore, WorkspaceStore};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// A store over an in-memory database and a temporary workspace root.
pub struct Harness {
    pub dir: TempDir,
    pub store: Arc<SqliteStore>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_cache_ttl(Duration::ZERO).await
    }

    pub async fn with_cache_ttl(ttl: Duration) -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteStore::new(
            Database::in_memory().await.unwrap(),
            WorkspaceStore::new(dir.path()),
            SessionCache::new(ttl),
            10,
        ));
        Self { dir, store }
    }

    pub fn relay(&self, connector: Arc<dyn AgentConnector>, gate_timeout_secs: u64) -> Relay {
        let config = RelayConfig {
            event_buffer: 4,
            turn_gate_timeout_secs: gate_timeout_secs,
            upstream_idle_timeout_secs: 0,
        };
        Relay::new(self.store.clone(), self.store.clone(), connector, &config)
    }

    pub async fn session(&self, id: &str) -> Session {
        self.store
            .create(NewSession {
                id: Some(SessionId::new(id)),
                workspace_name: None,
            })
            .await
            .unwrap()
    }

    pub async fn reload(&self, id: &SessionId) -> Session {
        self.store.get(id).await.unwrap().unwrap()
    }
}

/// Raw upstream lines, in the agent's stream-json format.
pub mod upstream {
    use super::*;

    pub fn init(token: &str) -> Value {
        json!({"type": "system", "subtype": "init", "session_id": token, "cwd": "/w"})
    }

    pub fn text(chunk: &str) -> Value {
        json!({
            "type": "stream_event",
            "event": {"type": "content_block_delta", "index": 0,
                      "delta": {"type": "text_delta", "text": chunk}}
        })
    }

    pub fn tool_use(id: &str, name: &str, input: Value) -> Value {
        json!({
            "type": "assistant",
            "message": {"content": [{"type": "tool_use", "id": id, "name": name, "input": input}]}
        })
    }

    pub fn tool_result(id: &str, content: &str) -> Value {
        json!({
            "type": "user",
            "message": {"content": [{"type": "tool_result", "tool_use_id": id, "content": content}]}
        })
    }

    pub fn result(text: &str, token: &str) -> Value {
        json!({
            "type": "result", "subtype": "success", "is_error": false,
            "duration_ms": 1200, "num_turns": 1, "result": text, "session_id": token
        })
    }

    pub fn failure(message: &str) -> Value {
        json!({"type": "error", "message": message})
    }

    /// Turn a list of lines into a replay script.
    pub fn script(lines: &[Value]) -> Vec<ScriptStep> {
        let transcript: Vec<String> = lines.iter().map(Value::to_string).collect();
        agentdeck_agent::upstream::replay::parse_transcript(&transcript.join("\n")).unwrap()
    }

    /// Render lines as a JSONL transcript.
    pub fn transcript(lines: &[Value]) -> String {
        lines
            .iter()
            .map(|line| format!("{}\n", line))
            .collect()
    }
}
