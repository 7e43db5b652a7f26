//! HTTP API end-to-end tests.
//!
//! The app is wired exactly as `agentdeck serve` wires it, with the upstream
//! replaced by a recorded transcript on disk.

use agentdeck_cli::commands::serve::build_state;
use agentdeck_core::config::Config;
use agentdeck_gateway::create_router;
use agentdeck_integration_tests::upstream::{init, result, text, tool_result, tool_use, transcript};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

struct App {
    _dir: TempDir,
    router: Router,
}

async fn app(lines: &[Value]) -> App {
    let dir = TempDir::new().unwrap();
    let replay = dir.path().join("turn.jsonl");
    std::fs::write(&replay, transcript(lines)).unwrap();

    let mut config = Config::default();
    config.database.path = Some(dir.path().join("agentdeck.db"));
    config.workspace.root = Some(dir.path().join("workspaces"));
    config.agent.replay_file = Some(replay);
    config.relay.turn_gate_timeout_secs = 0;

    let state = build_state(&config).await.unwrap();
    let router = create_router(Arc::new(state), &config.server);
    App { _dir: dir, router }
}

impl App {
    async fn call(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let (status, bytes) = self
            .call(Request::get(uri).body(Body::empty()).unwrap())
            .await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Vec<u8>) {
        self.call(
            Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn chat(&self, body: Value) -> Vec<Value> {
        let (status, bytes) = self.post("/api/chat/stream", body).await;
        assert_eq!(status, StatusCode::OK);
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(|data| serde_json::from_str(data.trim()).unwrap())
            .collect()
    }
}

fn types(events: &[Value]) -> Vec<&str> {
    events.iter().map(|e| e["type"].as_str().unwrap()).collect()
}

#[tokio::test]
async fn test_chat_round_trip() {
    let app = app(&[
        init("tok-http"),
        tool_use("toolu_1", "Write", json!({"file_path": "hello.txt"})),
        tool_result("toolu_1", "ok"),
        text("Wrote hello.txt"),
        result("Wrote hello.txt", "tok-http"),
    ])
    .await;

    let (status, body) = app
        .post("/api/sessions", json!({"session_id": "web-1"}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let created: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(created["id"], "web-1");

    let events = app
        .chat(json!({"session_id": "web-1", "message": "write hello.txt"}))
        .await;
    assert_eq!(
        types(&events),
        vec!["connected", "system", "tool_use", "tool_result", "text_delta", "result", "done"]
    );
    assert!(events.iter().all(|e| e["session_id"] == "web-1"));
    assert_eq!(events[2]["tool"]["name"], "Write");
    assert_eq!(events[6]["continuation_token"], "tok-http");

    let (_, session) = app.get("/api/sessions/web-1").await;
    assert_eq!(session["continuation_token"], "tok-http");
    assert_eq!(session["turn_count"], 1);

    let (status, history) = app.get("/api/sessions/web-1/messages").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["total"], 1);
    assert_eq!(history["messages"][0]["role"], "user");
    assert_eq!(history["messages"][0]["content"], "write hello.txt");
    assert_eq!(history["messages"][1]["role"], "assistant");
    assert_eq!(history["messages"][1]["content"], "Wrote hello.txt");
    assert_eq!(history["messages"][1]["tool_calls"][0]["result"], "ok");
}

#[tokio::test]
async fn test_chat_without_session_creates_one() {
    let app = app(&[init("tok-auto"), result("hi", "tok-auto")]).await;

    let events = app.chat(json!({"message": "hello"})).await;
    assert_eq!(types(&events).last(), Some(&"done"));

    let session_id = events[0]["session_id"].as_str().unwrap();
    let (status, session) = app.get(&format!("/api/sessions/{}", session_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["turn_count"], 1);

    let (_, files) = app.get(&format!("/api/sessions/{}/files", session_id)).await;
    let names: Vec<_> = files["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&".claude"));
    assert!(names.contains(&"README.md"));

    let (status, readme) = app
        .get(&format!("/api/sessions/{}/files/content?path=README.md", session_id))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(readme["content"].as_str().unwrap().contains("AgentDeck"));
}

#[tokio::test]
async fn test_chat_rejections() {
    let app = app(&[result("unused", "tok")]).await;

    let (status, body) = app
        .post("/api/chat/stream", json!({"session_id": "missing", "message": "hi"}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["code"], "not_found");

    let (status, _) = app.post("/api/chat/stream", json!({"message": ""})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, sessions) = app.get("/api/sessions").await;
    assert_eq!(sessions["total"], 0);
}

#[tokio::test]
async fn test_upstream_failure_is_streamed() {
    let app = app(&[
        init("tok-f"),
        text("Working"),
        json!({"type": "error", "message": "Error: rate limit exceeded"}),
    ])
    .await;

    let events = app.chat(json!({"message": "hello"})).await;
    assert_eq!(
        types(&events),
        vec!["connected", "system", "text_delta", "error"]
    );
    assert_eq!(events[3]["classification"], "upstream-error");
    assert_eq!(events[3]["error"], "Error: rate limit exceeded");

    let session_id = events[0]["session_id"].as_str().unwrap();
    let (_, history) = app
        .get(&format!("/api/sessions/{}/messages", session_id))
        .await;
    assert_eq!(history["messages"][1]["content"], "Working");
}

#[tokio::test]
async fn test_health() {
    let app = app(&[]).await;
    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}
