//! End-to-end relay scenarios over the real store.
//!
//! Each test drives complete turns through the relay with a replayed
//! upstream and then checks what a client saw and what was persisted.

use agentdeck_agent::{AgentError, ReplayConnector, ScriptStep, TurnRequest, TurnState};
use agentdeck_core::types::{ErrorClass, EventKind, OutboundEvent, SessionId, TurnOptions};
use agentdeck_integration_tests::upstream::{self, failure, init, result, text, tool_result, tool_use};
use agentdeck_integration_tests::Harness;
use agentdeck_store::{SessionRegistry, TurnStore};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn request(session_id: &SessionId, input: &str) -> TurnRequest {
    TurnRequest {
        session_id: session_id.clone(),
        input: input.into(),
        options: TurnOptions::default(),
    }
}

fn types(events: &[OutboundEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.event_type()).collect()
}

#[tokio::test]
async fn test_text_turn_then_resume() {
    let h = Harness::new().await;
    let session = h.session("alpha").await;
    let connector = Arc::new(ReplayConnector::script(upstream::script(&[
        init("tok-1"),
        text("Hi"),
        text(" there"),
        result("Hi there", "tok-1"),
    ])));
    let relay = h.relay(connector.clone(), 0);

    let first = relay.start(request(&session.id, "hello")).await.unwrap();
    let first_id = first.turn_id.clone();
    let (events, state) = first.collect().await;
    assert_eq!(state, TurnState::Completed);
    assert_eq!(
        types(&events),
        vec!["connected", "system", "text_delta", "text_delta", "result", "done"]
    );

    let stored = h.reload(&session.id).await;
    assert_eq!(stored.continuation_token.as_deref(), Some("tok-1"));
    assert_eq!(stored.turn_count, 1);
    let turn = h.store.get_turn(&first_id).await.unwrap().unwrap();
    assert_eq!(turn.output.as_deref(), Some("Hi there"));

    // The next turn resumes the captured conversation even when the client
    // asks for a different one.
    let mut second = request(&session.id, "and again");
    second.options.resume = Some("client-supplied".into());
    let (_, state) = relay.start(second).await.unwrap().collect().await;
    assert_eq!(state, TurnState::Completed);

    let opened = connector.opened().await;
    assert_eq!(opened.len(), 2);
    assert_eq!(opened[0].resume, None);
    assert_eq!(opened[1].resume.as_deref(), Some("tok-1"));
    assert_eq!(opened[1].working_dir, stored.workspace_path);
    assert_eq!(h.reload(&session.id).await.turn_count, 2);
}

#[tokio::test]
async fn test_tool_turn_records_calls() {
    let h = Harness::new().await;
    let session = h.session("tools").await;
    let connector = Arc::new(ReplayConnector::script(upstream::script(&[
        init("tok-t"),
        tool_use("toolu_1", "Write", json!({"file_path": "notes.md"})),
        tool_result("toolu_1", "File created"),
        tool_use("toolu_2", "Bash", json!({"command": "ls"})),
        tool_result("toolu_2", "notes.md"),
        text("Created notes.md."),
        result("Created notes.md.", "tok-t"),
    ])));
    let relay = h.relay(connector, 0);

    let handle = relay.start(request(&session.id, "make notes")).await.unwrap();
    let turn_id = handle.turn_id.clone();
    let (events, state) = handle.collect().await;

    assert_eq!(state, TurnState::Completed);
    assert_eq!(
        types(&events),
        vec![
            "connected",
            "system",
            "tool_use",
            "tool_result",
            "tool_use",
            "tool_result",
            "text_delta",
            "result",
            "done"
        ]
    );

    let turn = h.store.get_turn(&turn_id).await.unwrap().unwrap();
    assert_eq!(turn.output.as_deref(), Some("Created notes.md."));
    let calls = turn.tool_calls.unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].name, "Write");
    assert_eq!(calls[0].result, Some(json!("File created")));
    assert_eq!(calls[1].input, json!({"command": "ls"}));
    assert_eq!(calls[1].result, Some(json!("notes.md")));
}

#[tokio::test]
async fn test_invalidated_session_starts_fresh() {
    let h = Harness::new().await;
    let session = h.session("stale").await;
    h.store
        .update_activity(&session.id, false, Some("expired-token"))
        .await
        .unwrap();

    let broken = Arc::new(ReplayConnector::script(upstream::script(&[failure(
        "Error: No conversation found with session ID: expired-token",
    )])));
    let handle = h
        .relay(broken.clone(), 0)
        .start(request(&session.id, "continue"))
        .await
        .unwrap();
    let (events, state) = handle.collect().await;

    assert_eq!(state, TurnState::Failed);
    assert_eq!(types(&events), vec!["connected", "error"]);
    match &events[1].kind {
        EventKind::Error {
            classification,
            suggestion,
            ..
        } => {
            assert_eq!(*classification, ErrorClass::SessionInvalidated);
            assert!(!suggestion.is_empty());
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(broken.opened().await[0].resume.as_deref(), Some("expired-token"));
    assert!(h.reload(&session.id).await.continuation_token.is_none());

    // The retry opens a brand new conversation.
    let healthy = Arc::new(ReplayConnector::script(upstream::script(&[
        init("tok-new"),
        result("fresh start", "tok-new"),
    ])));
    let (events, state) = h
        .relay(healthy.clone(), 0)
        .start(request(&session.id, "continue"))
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(state, TurnState::Completed);
    assert_eq!(healthy.opened().await[0].resume, None);
    assert_eq!(
        events.last().unwrap().kind,
        EventKind::Done {
            continuation_token: Some("tok-new".into())
        }
    );
    assert_eq!(
        h.reload(&session.id).await.continuation_token.as_deref(),
        Some("tok-new")
    );
}

#[tokio::test]
async fn test_disconnect_mid_stream_keeps_partial_output() {
    let h = Harness::new().await;
    let session = h.session("drop").await;
    let (connector, feed) = ReplayConnector::channel(8);
    let connector = Arc::new(connector);
    let relay = h.relay(connector.clone(), 0);

    let mut handle = relay.start(request(&session.id, "long answer")).await.unwrap();
    let turn_id = handle.turn_id.clone();
    assert_eq!(handle.events.recv().await.unwrap().event_type(), "connected");

    for step in upstream::script(&[init("tok-d"), text("Part one. ")]) {
        feed.send(step).await.unwrap();
    }
    assert_eq!(handle.events.recv().await.unwrap().event_type(), "system");
    assert_eq!(handle.events.recv().await.unwrap().event_type(), "text_delta");

    let task = handle.task;
    drop(handle.events);
    for step in upstream::script(&[text("Part two."), result("Part one. Part two.", "tok-d")]) {
        let _ = feed.send(step).await;
    }

    assert_eq!(task.await.unwrap(), TurnState::Cancelled);
    let turn = h.store.get_turn(&turn_id).await.unwrap().unwrap();
    assert_eq!(turn.output.as_deref(), Some("Part one. "));
    assert!(turn.is_completed());
    assert_eq!(
        h.reload(&session.id).await.continuation_token.as_deref(),
        Some("tok-d")
    );
    assert_eq!(connector.closed(), 1);
    assert!(!relay.gate().is_busy(&session.id));
}

#[tokio::test]
async fn test_second_turn_waits_for_the_first() {
    let h = Harness::new().await;
    let session = h.session("serial").await;
    let mut steps = upstream::script(&[init("tok-s")]);
    steps.push(ScriptStep::Pause(Duration::from_millis(200)));
    steps.extend(upstream::script(&[result("ok", "tok-s")]));
    let relay = h.relay(Arc::new(ReplayConnector::script(steps)), 5);

    let first = relay.start(request(&session.id, "one")).await.unwrap();
    let first_id = first.turn_id.clone();
    let first_done = tokio::spawn(first.collect());

    let second = relay.start(request(&session.id, "two")).await.unwrap();
    let first_turn = h.store.get_turn(&first_id).await.unwrap().unwrap();
    assert!(first_turn.is_completed());

    let (_, state) = second.collect().await;
    assert_eq!(state, TurnState::Completed);
    assert_eq!(first_done.await.unwrap().1, TurnState::Completed);
    assert_eq!(h.reload(&session.id).await.turn_count, 2);
}

#[tokio::test]
async fn test_busy_session_rejected_without_wait() {
    let h = Harness::new().await;
    let session = h.session("busy").await;
    let (connector, feed) = ReplayConnector::channel(4);
    let relay = h.relay(Arc::new(connector), 0);

    let first = relay.start(request(&session.id, "one")).await.unwrap();
    let err = relay.start(request(&session.id, "two")).await.err().unwrap();
    assert!(matches!(err, AgentError::TurnInProgress(_)));
    assert_eq!(h.store.count_turns(&session.id).await.unwrap(), 1);

    for step in upstream::script(&[result("ok", "tok")]) {
        feed.send(step).await.unwrap();
    }
    assert_eq!(first.collect().await.1, TurnState::Completed);
}

#[tokio::test]
async fn test_cached_session_reflects_commits() {
    let h = Harness::with_cache_ttl(Duration::from_secs(3600)).await;
    let session = h.session("cached").await;
    assert!(h.reload(&session.id).await.continuation_token.is_none());

    let connector = Arc::new(ReplayConnector::script(upstream::script(&[
        init("tok-c"),
        result("cached", "tok-c"),
    ])));
    h.relay(connector, 0)
        .start(request(&session.id, "hi"))
        .await
        .unwrap()
        .collect()
        .await;

    let reloaded = h.reload(&session.id).await;
    assert_eq!(reloaded.continuation_token.as_deref(), Some("tok-c"));
    assert_eq!(reloaded.turn_count, 1);

    assert!(h.store.delete(&session.id).await.unwrap());
    assert!(h.store.get(&session.id).await.unwrap().is_none());
}
