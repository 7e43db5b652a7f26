//! Replayed upstream.
//!
//! Plays back a recorded transcript instead of running the agent. A
//! transcript is JSONL in the agent's own `stream-json` format; a line of
//! the form `{"type":"error","message":"..."}` makes the upstream fail at
//! that point. Tests drive the same machinery from in-memory scripts or
//! from a channel, which lets them interleave upstream events with client
//! behaviour.

use super::{AgentConnector, AgentOptions, AgentSession, RawEvent, RawEventStream};
use crate::error::UpstreamError;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// One step of a replay script.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    /// Emit an event.
    Event(RawEvent),
    /// Fail with the given message.
    Fail(String),
    /// Wait before the next step.
    Pause(Duration),
}

impl From<RawEvent> for ScriptStep {
    fn from(event: RawEvent) -> Self {
        ScriptStep::Event(event)
    }
}

enum Source {
    Script(Vec<ScriptStep>),
    File(PathBuf),
    Channel(Mutex<Option<mpsc::Receiver<ScriptStep>>>),
}

/// Connector that replays scripted events.
pub struct ReplayConnector {
    source: Source,
    opened: Mutex<Vec<AgentOptions>>,
    inputs: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicUsize>,
}

impl ReplayConnector {
    fn with_source(source: Source) -> Self {
        Self {
            source,
            opened: Mutex::new(Vec::new()),
            inputs: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replay the same steps on every open.
    pub fn script(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self::with_source(Source::Script(steps.into_iter().collect()))
    }

    /// Replay a JSONL transcript, re-read on every open.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self::with_source(Source::File(path.into()))
    }

    /// Replay steps pushed through the returned sender. Opens once; the
    /// stream ends when the sender is dropped.
    pub fn channel(buffer: usize) -> (Self, mpsc::Sender<ScriptStep>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::with_source(Source::Channel(Mutex::new(Some(rx)))), tx)
    }

    /// Options of every session opened so far.
    pub async fn opened(&self) -> Vec<AgentOptions> {
        self.opened.lock().await.clone()
    }

    /// Inputs sent so far.
    pub async fn inputs(&self) -> Vec<String> {
        self.inputs.lock().await.clone()
    }

    /// Number of `close` calls.
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Parse a JSONL transcript.
pub fn parse_transcript(content: &str) -> Result<Vec<ScriptStep>, UpstreamError> {
    let mut steps = Vec::new();
    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line).map_err(|e| {
            UpstreamError::Protocol(format!("transcript line {}: {}", number + 1, e))
        })?;
        if value.get("type").and_then(Value::as_str) == Some("error") {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("replayed failure");
            steps.push(ScriptStep::Fail(message.to_string()));
        } else {
            steps.push(ScriptStep::Event(RawEvent::from_value(value)?));
        }
    }
    Ok(steps)
}

#[async_trait]
impl AgentConnector for ReplayConnector {
    fn name(&self) -> &str {
        "replay"
    }

    async fn open(&self, options: AgentOptions) -> Result<Box<dyn AgentSession>, UpstreamError> {
        let feed = match &self.source {
            Source::Script(steps) => Feed::Steps(steps.clone()),
            Source::File(path) => {
                let content = tokio::fs::read_to_string(path).await?;
                Feed::Steps(parse_transcript(&content)?)
            }
            Source::Channel(rx) => {
                let rx = rx.lock().await.take().ok_or(UpstreamError::Closed)?;
                Feed::Channel(rx)
            }
        };

        debug!(resume = ?options.resume, "Opened replay session");
        self.opened.lock().await.push(options);

        Ok(Box::new(ReplaySession {
            feed: Some(feed),
            inputs: self.inputs.clone(),
            closed: self.closed.clone(),
        }))
    }
}

enum Feed {
    Steps(Vec<ScriptStep>),
    Channel(mpsc::Receiver<ScriptStep>),
}

impl Feed {
    async fn next(&mut self) -> Option<ScriptStep> {
        match self {
            Feed::Steps(steps) => {
                if steps.is_empty() {
                    None
                } else {
                    Some(steps.remove(0))
                }
            }
            Feed::Channel(rx) => rx.recv().await,
        }
    }
}

struct ReplaySession {
    feed: Option<Feed>,
    inputs: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl AgentSession for ReplaySession {
    async fn send(&mut self, input: &str) -> Result<(), UpstreamError> {
        self.inputs.lock().await.push(input.to_string());
        Ok(())
    }

    fn receive(&mut self) -> Result<RawEventStream, UpstreamError> {
        let mut feed = self
            .feed
            .take()
            .ok_or_else(|| UpstreamError::Protocol("event stream already taken".into()))?;

        Ok(Box::pin(async_stream::stream! {
            while let Some(step) = feed.next().await {
                match step {
                    ScriptStep::Event(event) => {
                        let terminal = event.is_terminal();
                        yield Ok(event);
                        if terminal {
                            return;
                        }
                    }
                    ScriptStep::Fail(message) => {
                        yield Err(UpstreamError::Failed(message));
                        return;
                    }
                    ScriptStep::Pause(duration) => tokio::time::sleep(duration).await,
                }
            }
            warn!("Replay ended without a result");
            yield Err(UpstreamError::Closed);
        }))
    }

    async fn close(&mut self) -> Result<(), UpstreamError> {
        self.feed = None;
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
