//! Agent error types.

use agentdeck_store::StoreError;
use std::io;
use thiserror::Error;

/// Failures raised by the upstream agent while a turn is running.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The agent process could not be started.
    #[error("Failed to start agent: {0}")]
    Spawn(#[source] io::Error),

    /// I/O error talking to the agent.
    #[error("Upstream I/O error: {0}")]
    Io(#[from] io::Error),

    /// The agent broke the event protocol.
    #[error("Upstream protocol error: {0}")]
    Protocol(String),

    /// The agent exited before finishing the turn.
    #[error("Agent exited with status {code:?}: {message}")]
    Exited {
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
        /// Captured stderr tail.
        message: String,
    },

    /// The event stream ended without a result.
    #[error("Upstream closed before the turn finished")]
    Closed,

    /// No event arrived within the idle window.
    #[error("No upstream event within {secs}s")]
    Timeout {
        /// Idle window in seconds.
        secs: u64,
    },

    /// The agent reported a failure.
    #[error("{0}")]
    Failed(String),
}

impl UpstreamError {
    /// Text inspected by error classifiers.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Short variant name for the client-facing `detail` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Spawn(_) => "Spawn",
            Self::Io(_) => "Io",
            Self::Protocol(_) => "Protocol",
            Self::Exited { .. } => "Exited",
            Self::Closed => "Closed",
            Self::Timeout { .. } => "Timeout",
            Self::Failed(_) => "Failed",
        }
    }
}

/// Errors that can occur before or around a relayed turn.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Upstream failure.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Session not found.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Another turn holds the session.
    #[error("A turn is already running for session {0}")]
    TurnInProgress(String),

    /// Malformed request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Create an invalid request error.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Whether the caller caused the error.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::SessionNotFound(_) | Self::TurnInProgress(_) | Self::InvalidRequest(_) => true,
            Self::Store(e) => e.is_client_error(),
            _ => false,
        }
    }
}
