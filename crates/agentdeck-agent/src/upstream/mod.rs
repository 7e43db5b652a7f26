//! Upstream agent capability.
//!
//! A turn opens one [`AgentSession`] through an [`AgentConnector`], sends the
//! user input, drains the raw event stream, and closes the session. Sessions
//! are per-turn values owned by the caller; nothing here is global.

pub mod cli;
pub mod raw;
pub mod replay;

use crate::error::UpstreamError;
use agentdeck_core::types::PermissionMode;
use async_trait::async_trait;
use futures::Stream;
use std::path::PathBuf;
use std::pin::Pin;

pub use cli::CliConnector;
pub use raw::{ContentBlock, Delta, RawEvent, StreamEvent};
pub use replay::{ReplayConnector, ScriptStep};

/// Raw events from one turn, ending after the terminal result or an error.
pub type RawEventStream = Pin<Box<dyn Stream<Item = Result<RawEvent, UpstreamError>> + Send>>;

/// Per-turn options for opening an agent session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentOptions {
    /// Working directory for the agent.
    pub working_dir: PathBuf,

    /// Permission mode for tool execution.
    pub permission_mode: PermissionMode,

    /// Continuation token to resume.
    pub resume: Option<String>,

    /// Upstream turn limit.
    pub max_turns: Option<u32>,
}

/// Factory for agent sessions.
#[async_trait]
pub trait AgentConnector: Send + Sync {
    /// Connector name, for logs.
    fn name(&self) -> &str;

    /// Open a session for one turn.
    async fn open(&self, options: AgentOptions) -> Result<Box<dyn AgentSession>, UpstreamError>;
}

/// One open conversation with the upstream agent.
#[async_trait]
pub trait AgentSession: Send {
    /// Send the user input.
    async fn send(&mut self, input: &str) -> Result<(), UpstreamError>;

    /// Take the raw event stream. Can only be taken once.
    fn receive(&mut self) -> Result<RawEventStream, UpstreamError>;

    /// Release the session. Safe to call more than once.
    async fn close(&mut self) -> Result<(), UpstreamError>;
}
