//! Read-through session cache.

use agentdeck_core::types::{Session, SessionId};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// TTL cache of session records keyed by session ID.
///
/// A zero TTL disables caching entirely.
///
/// Every [`remove`](Self::remove) bumps a generation counter. Read-through
/// fills go through [`insert_if_current`](Self::insert_if_current) with the
/// generation seen before the database read, so a record fetched before a
/// concurrent write is never left behind.
pub struct SessionCache {
    entries: DashMap<SessionId, (Session, Instant)>,
    ttl: Duration,
    generation: AtomicU64,
}

impl SessionCache {
    /// Create a cache with the given entry lifetime.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            generation: AtomicU64::new(0),
        }
    }

    /// Create a cache that never holds anything.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Whether caching is enabled.
    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// Get a fresh entry, evicting it if expired.
    pub fn get(&self, id: &SessionId) -> Option<Session> {
        if !self.is_enabled() {
            return None;
        }

        let expired = match self.entries.get(id) {
            Some(entry) => {
                let (session, stored_at) = entry.value();
                if stored_at.elapsed() < self.ttl {
                    return Some(session.clone());
                }
                true
            }
            None => false,
        };

        if expired {
            self.entries.remove(id);
        }
        None
    }

    /// Store a session.
    pub fn insert(&self, session: &Session) {
        if self.is_enabled() {
            self.entries
                .insert(session.id.clone(), (session.clone(), Instant::now()));
        }
    }

    /// Current invalidation generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Store a session read while the cache was at `seen`. Dropped again if
    /// any invalidation happened since.
    pub fn insert_if_current(&self, session: &Session, seen: u64) {
        if !self.is_enabled() || self.generation() != seen {
            return;
        }
        self.insert(session);
        if self.generation() != seen {
            self.entries.remove(&session.id);
        }
    }

    /// Drop a session.
    pub fn remove(&self, id: &SessionId) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.entries.remove(id);
    }

    /// Number of entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
