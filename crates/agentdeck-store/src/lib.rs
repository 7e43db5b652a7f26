//! Session registry, turn history, and workspace storage for AgentDeck.
//!
//! This crate provides:
//! - The [`SessionRegistry`] and [`TurnStore`] traits the relay commits through
//! - A SQLite implementation backed by `sqlx`
//! - A read-through session cache
//! - Per-session workspace directories

pub mod cache;
pub mod db;
pub mod error;
pub mod sqlite;
pub mod store;
pub mod workspace;

pub use cache::SessionCache;
pub use db::Database;
pub use error::StoreError;
pub use sqlite::SqliteStore;
pub use store::{NewSession, SessionPage, SessionRegistry, TurnStore};
pub use workspace::{FileContent, FileEntry, FileKind, WorkspaceStore};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
