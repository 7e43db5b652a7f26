//! Store error types.

use agentdeck_core::error::SecurityError;
use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Session not found.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Session already exists.
    #[error("Session already exists: {0}")]
    SessionExists(String),

    /// Active session limit reached.
    #[error("Maximum number of sessions ({max}) reached")]
    SessionLimit {
        /// Configured limit.
        max: u32,
    },

    /// Turn not found.
    #[error("Turn not found: {0}")]
    TurnNotFound(String),

    /// Turn was already committed.
    #[error("Turn already committed: {0}")]
    AlreadyCommitted(String),

    /// Workspace directory already exists.
    #[error("Workspace {0} already exists")]
    WorkspaceExists(String),

    /// Workspace path does not exist.
    #[error("Path not found: {0}")]
    PathNotFound(String),

    /// Path is not a directory.
    #[error("Path is not a directory: {0}")]
    NotADirectory(String),

    /// Path is not a regular file.
    #[error("Path is not a file: {0}")]
    NotAFile(String),

    /// File exceeds the preview limit.
    #[error("File too large for preview: {size} bytes (max {max})")]
    FileTooLarge {
        /// File size in bytes.
        size: u64,
        /// Preview limit in bytes.
        max: u64,
    },

    /// File content is not UTF-8 text.
    #[error("File is not a text file: {0}")]
    BinaryFile(String),

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Path escaped the workspace.
    #[error("Security error: {0}")]
    Security(#[from] SecurityError),
}

impl StoreError {
    /// Whether the error was caused by the caller rather than the store.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::SessionNotFound(_)
                | Self::SessionExists(_)
                | Self::SessionLimit { .. }
                | Self::TurnNotFound(_)
                | Self::WorkspaceExists(_)
                | Self::PathNotFound(_)
                | Self::NotADirectory(_)
                | Self::NotAFile(_)
                | Self::FileTooLarge { .. }
                | Self::BinaryFile(_)
                | Self::InvalidInput(_)
                | Self::Security(_)
        )
    }
}
