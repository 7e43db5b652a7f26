//! The streaming turn relay.
//!
//! A turn moves through `Streaming` and ends in exactly one of `Completed`,
//! `Failed` or `Cancelled`:
//!
//! - **Completed**: the upstream delivered its result. The turn is committed,
//!   then `done` is sent carrying the captured continuation token.
//! - **Failed**: the upstream raised. The error is classified, the partial
//!   turn is committed, a single `error` event is sent, and a stale
//!   continuation token is cleared when the classification calls for it.
//! - **Cancelled**: the client went away. The upstream is closed and the
//!   partial turn is committed; nothing further is sent.
//!
//! Each turn runs in its own task and talks to the client through a bounded
//! channel, so a slow reader suspends consumption of the upstream. The
//! per-session [`TurnGate`] is held from before the continuation token is
//! read until commit and recovery are finished.

pub mod accumulator;
pub mod commit;
pub mod gate;
pub mod normalizer;
pub mod recovery;

pub use accumulator::Accumulator;
pub use gate::{TurnGate, TurnGuard};
pub use normalizer::Normalizer;
pub use recovery::{ErrorClassifier, HeuristicClassifier};

use crate::error::{AgentError, UpstreamError};
use crate::upstream::{AgentConnector, AgentOptions, AgentSession, RawEvent, RawEventStream};
use crate::Result;
use agentdeck_core::config::RelayConfig;
use agentdeck_core::types::{
    ErrorClass, EventKind, OutboundEvent, Session, SessionId, Turn, TurnId, TurnOptions,
};
use agentdeck_store::{SessionRegistry, TurnStore};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Lifecycle of one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// Events are flowing.
    Streaming,
    /// The upstream finished the turn.
    Completed,
    /// The upstream failed.
    Failed,
    /// The client disconnected.
    Cancelled,
}

impl TurnState {
    /// Whether the turn has ended.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TurnState::Streaming)
    }
}

/// A request to run one turn.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    /// Target session. Must exist.
    pub session_id: SessionId,

    /// User input.
    pub input: String,

    /// Requested options.
    pub options: TurnOptions,
}

/// A running turn.
pub struct TurnHandle {
    /// Session the turn belongs to.
    pub session_id: SessionId,

    /// Turn ID.
    pub turn_id: TurnId,

    /// Outbound events. Dropping the receiver cancels the turn.
    pub events: mpsc::Receiver<OutboundEvent>,

    /// Relay task. Resolves after commit and recovery.
    pub task: JoinHandle<TurnState>,
}

impl TurnHandle {
    /// Drain every event, then wait for the relay task.
    pub async fn collect(mut self) -> (Vec<OutboundEvent>, TurnState) {
        let mut events = Vec::new();
        while let Some(event) = self.events.recv().await {
            events.push(event);
        }
        let state = self.task.await.unwrap_or(TurnState::Failed);
        (events, state)
    }
}

/// Runs turns against the upstream agent.
#[derive(Clone)]
pub struct Relay {
    registry: Arc<dyn SessionRegistry>,
    turns: Arc<dyn TurnStore>,
    connector: Arc<dyn AgentConnector>,
    classifier: Arc<dyn ErrorClassifier>,
    gate: TurnGate,
    event_buffer: usize,
    idle_timeout: Option<Duration>,
}

impl Relay {
    /// Create a relay.
    pub fn new(
        registry: Arc<dyn SessionRegistry>,
        turns: Arc<dyn TurnStore>,
        connector: Arc<dyn AgentConnector>,
        config: &RelayConfig,
    ) -> Self {
        Self {
            registry,
            turns,
            connector,
            classifier: Arc::new(HeuristicClassifier::new()),
            gate: TurnGate::new(Duration::from_secs(config.turn_gate_timeout_secs)),
            event_buffer: config.event_buffer.max(1),
            idle_timeout: (config.upstream_idle_timeout_secs > 0)
                .then(|| Duration::from_secs(config.upstream_idle_timeout_secs)),
        }
    }

    /// Replace the error classifier.
    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// The per-session turn gate.
    pub fn gate(&self) -> &TurnGate {
        &self.gate
    }

    /// Start a turn.
    ///
    /// Input errors (empty message, unknown session, busy session) are
    /// returned before the upstream is contacted. Everything after that is
    /// reported on the event stream, which always ends with `done` or
    /// `error` unless the client disconnects first.
    pub async fn start(&self, request: TurnRequest) -> Result<TurnHandle> {
        if request.input.trim().is_empty() {
            return Err(AgentError::invalid_request("message must not be empty"));
        }

        let guard = self.gate.acquire(&request.session_id).await?;

        let session = self
            .registry
            .get(&request.session_id)
            .await?
            .ok_or_else(|| AgentError::SessionNotFound(request.session_id.to_string()))?;

        let turn = self
            .turns
            .create_turn(&session.id, &request.input, &request.options)
            .await?;

        let (tx, rx) = mpsc::channel(self.event_buffer);
        let span = info_span!("turn", session_id = %session.id, turn_id = %turn.id);
        let handle_session = session.id.clone();
        let handle_turn = turn.id.clone();

        let normalizer = Normalizer::new(session.id.clone(), turn.id.clone());
        let fallback = tx.clone();
        let worker = TurnWorker {
            relay: self.clone(),
            normalizer: normalizer.clone(),
            accumulator: Accumulator::new(),
            state: TurnState::Streaming,
            tx,
        };
        let worker = tokio::spawn(worker.run(guard, session, turn).instrument(span.clone()));
        let task = tokio::spawn(supervise(worker, fallback, normalizer).instrument(span));

        Ok(TurnHandle {
            session_id: handle_session,
            turn_id: handle_turn,
            events: rx,
            task,
        })
    }
}

enum Outcome {
    Completed,
    Failed(UpstreamError),
    Cancelled,
}

struct TurnWorker {
    relay: Relay,
    normalizer: Normalizer,
    accumulator: Accumulator,
    state: TurnState,
    tx: mpsc::Sender<OutboundEvent>,
}

impl TurnWorker {
    async fn run(mut self, guard: TurnGuard, session: Session, turn: Turn) -> TurnState {
        info!("Turn started");

        let outcome = if self.emit(EventKind::Connected).await {
            let options = AgentOptions {
                working_dir: session.workspace_path.clone(),
                permission_mode: turn.options.permission_mode,
                resume: session
                    .continuation_token
                    .clone()
                    .or_else(|| turn.options.resume.clone()),
                max_turns: turn.options.max_turns,
            };
            self.stream(options, &turn.input).await
        } else {
            Outcome::Cancelled
        };

        match outcome {
            Outcome::Completed => {
                self.transition(TurnState::Completed);
                self.commit(&session.id, &turn.id).await;
                let token = self.accumulator.continuation_token().map(String::from);
                if !self.emit(EventKind::Done { continuation_token: token }).await {
                    debug!("Client left before done");
                }
            }
            Outcome::Failed(error) => {
                self.transition(TurnState::Failed);
                let class = self.relay.classifier.classify(&error);
                warn!(classification = class.as_str(), "Turn failed: {}", error);
                self.commit(&session.id, &turn.id).await;
                if !self.emit(recovery::error_event(&error, class)).await {
                    debug!("Client left before error");
                }
                recovery::recover(self.relay.registry.as_ref(), &session.id, class).await;
            }
            Outcome::Cancelled => {
                self.transition(TurnState::Cancelled);
                info!("Client disconnected; committing partial turn");
                self.commit(&session.id, &turn.id).await;
            }
        }

        drop(guard);
        info!(state = ?self.state, "Turn finished");
        self.state
    }

    /// Open the upstream, relay its events, and close it on every path.
    async fn stream(&mut self, options: AgentOptions, input: &str) -> Outcome {
        let mut upstream = match self.relay.connector.open(options).await {
            Ok(upstream) => upstream,
            Err(e) => return Outcome::Failed(e),
        };

        let outcome = self.pump(upstream.as_mut(), input).await;

        if let Err(e) = upstream.close().await {
            warn!("Failed to close upstream session: {}", e);
        }
        outcome
    }

    async fn pump(&mut self, upstream: &mut dyn AgentSession, input: &str) -> Outcome {
        if let Err(e) = upstream.send(input).await {
            return Outcome::Failed(e);
        }
        let mut events = match upstream.receive() {
            Ok(events) => events,
            Err(e) => return Outcome::Failed(e),
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = self.tx.closed() => return Outcome::Cancelled,
                next = next_event(&mut events, self.relay.idle_timeout) => next,
            };

            let raw = match next {
                Ok(raw) => raw,
                Err(e) => return Outcome::Failed(e),
            };
            let terminal = raw.is_terminal();

            for event in self.normalizer.normalize(raw) {
                self.accumulator.apply(&event.kind);
                if self.tx.send(event).await.is_err() {
                    return Outcome::Cancelled;
                }
            }

            if terminal {
                return Outcome::Completed;
            }
        }
    }

    async fn emit(&self, kind: EventKind) -> bool {
        self.tx.send(self.normalizer.wrap(kind)).await.is_ok()
    }

    async fn commit(&self, session_id: &SessionId, turn_id: &TurnId) {
        commit::commit_turn(
            self.relay.turns.as_ref(),
            session_id,
            turn_id,
            &self.accumulator,
        )
        .await;
    }

    fn transition(&mut self, next: TurnState) {
        debug_assert_eq!(self.state, TurnState::Streaming);
        debug!("Turn {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// Wait for a turn worker. A worker that dies without finishing still
/// leaves the client with a terminal `error` event.
async fn supervise(
    worker: JoinHandle<TurnState>,
    tx: mpsc::Sender<OutboundEvent>,
    normalizer: Normalizer,
) -> TurnState {
    match worker.await {
        Ok(state) => state,
        Err(e) => {
            error!("Turn worker aborted: {}", e);
            let class = ErrorClass::Internal;
            let event = normalizer.wrap(EventKind::Error {
                error: "The relay stopped unexpectedly".into(),
                classification: class,
                detail: if e.is_panic() { "Panic" } else { "Aborted" }.into(),
                suggestion: class.suggestion().into(),
            });
            let _ = tx.send(event).await;
            TurnState::Failed
        }
    }
}

/// Next raw event, with the stream's end and the idle window folded into
/// upstream errors.
async fn next_event(
    events: &mut RawEventStream,
    idle_timeout: Option<Duration>,
) -> std::result::Result<RawEvent, UpstreamError> {
    let next = match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, events.next())
            .await
            .map_err(|_| UpstreamError::Timeout {
                secs: limit.as_secs(),
            })?,
        None => events.next().await,
    };
    next.unwrap_or(Err(UpstreamError::Closed))
}
