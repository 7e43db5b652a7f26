//! Upstream failure classification and recovery.

use crate::error::UpstreamError;
use agentdeck_core::types::{ErrorClass, EventKind, SessionId};
use agentdeck_store::SessionRegistry;
use regex::Regex;
use tracing::{info, warn};

/// Decides what kind of failure an upstream error is.
pub trait ErrorClassifier: Send + Sync {
    /// Classify an upstream error.
    fn classify(&self, error: &UpstreamError) -> ErrorClass;
}

/// Classifies by matching the error message.
///
/// A message is treated as session invalidation when it contains
/// "no conversation found", or mentions a session together with a
/// not-found signal. Matching is case-insensitive.
#[derive(Debug, Clone)]
pub struct HeuristicClassifier {
    session_invalidated: Regex,
}

const SESSION_INVALIDATED: &str = r"(?is)no conversation found|session.*\b(not found|does not exist|no longer exists|expired|unknown)\b|\b(not found|does not exist|no longer exists|expired|unknown)\b.*session";

impl HeuristicClassifier {
    /// Create a classifier with the built-in patterns.
    pub fn new() -> Self {
        Self {
            session_invalidated: Regex::new(SESSION_INVALIDATED).expect("invalid regex"),
        }
    }

    /// Create a classifier with a custom session-invalidation pattern.
    pub fn with_pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            session_invalidated: Regex::new(pattern)?,
        })
    }
}

impl Default for HeuristicClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorClassifier for HeuristicClassifier {
    fn classify(&self, error: &UpstreamError) -> ErrorClass {
        if let UpstreamError::Timeout { .. } = error {
            return ErrorClass::Timeout;
        }
        if self.session_invalidated.is_match(&error.message()) {
            ErrorClass::SessionInvalidated
        } else {
            ErrorClass::UpstreamError
        }
    }
}

/// Build the terminal error event for a failed turn.
pub fn error_event(error: &UpstreamError, class: ErrorClass) -> EventKind {
    EventKind::Error {
        error: error.message(),
        classification: class,
        detail: error.kind().to_string(),
        suggestion: class.suggestion().to_string(),
    }
}

/// Apply the token policy for a classified failure.
///
/// Session invalidation clears the stored continuation token so the next
/// turn starts a fresh upstream context. Failures here are logged only.
pub async fn recover(registry: &dyn SessionRegistry, session_id: &SessionId, class: ErrorClass) {
    if class != ErrorClass::SessionInvalidated {
        return;
    }
    match registry.clear_continuation_token(session_id).await {
        Ok(()) => info!(session_id = %session_id, "Cleared invalidated continuation token"),
        Err(e) => warn!(session_id = %session_id, "Failed to clear continuation token: {}", e),
    }
}
