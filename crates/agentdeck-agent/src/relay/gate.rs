//! Per-session turn serialization.

use crate::error::AgentError;
use agentdeck_core::types::SessionId;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

type Locks = Arc<DashMap<SessionId, Arc<Mutex<()>>>>;

/// Keyed mutex allowing one in-flight turn per session.
///
/// Entries are created on first use and removed when the last holder or
/// waiter is gone.
#[derive(Debug, Clone)]
pub struct TurnGate {
    locks: Locks,
    timeout: Duration,
}

impl TurnGate {
    /// Create a gate. A zero timeout rejects a busy session immediately.
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
            timeout,
        }
    }

    /// Wait for the session to be free and take it.
    pub async fn acquire(&self, session_id: &SessionId) -> Result<TurnGuard, AgentError> {
        let lock = self
            .locks
            .entry(session_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = if self.timeout.is_zero() {
            lock.try_lock_owned().ok()
        } else {
            tokio::time::timeout(self.timeout, lock.lock_owned()).await.ok()
        };

        match guard {
            Some(guard) => {
                debug!(session_id = %session_id, "Turn gate acquired");
                Ok(TurnGuard {
                    guard: Some(guard),
                    session_id: session_id.clone(),
                    locks: self.locks.clone(),
                })
            }
            None => {
                self.release_entry(session_id);
                Err(AgentError::TurnInProgress(session_id.to_string()))
            }
        }
    }

    /// Whether a turn currently holds the session.
    pub fn is_busy(&self, session_id: &SessionId) -> bool {
        self.locks
            .get(session_id)
            .map(|lock| lock.try_lock().is_err())
            .unwrap_or(false)
    }

    /// Number of sessions with a holder or waiter.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no session is held.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    fn release_entry(&self, session_id: &SessionId) {
        remove_idle(&self.locks, session_id);
    }
}

fn remove_idle(locks: &Locks, session_id: &SessionId) {
    locks.remove_if(session_id, |_, lock| Arc::strong_count(lock) == 1);
}

/// Holds a session's turn gate until dropped.
#[derive(Debug)]
pub struct TurnGuard {
    guard: Option<OwnedMutexGuard<()>>,
    session_id: SessionId,
    locks: Locks,
}

impl TurnGuard {
    /// Session this guard holds.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        // Unlock first so the map entry's count reflects waiters only.
        self.guard.take();
        remove_idle(&self.locks, &self.session_id);
        debug!(session_id = %self.session_id, "Turn gate released");
    }
}
