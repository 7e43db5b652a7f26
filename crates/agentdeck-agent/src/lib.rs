//! Upstream agent adapters and the streaming turn relay for AgentDeck.
//!
//! This crate provides:
//! - The raw upstream event vocabulary and its parser
//! - The per-turn agent session capability, with subprocess and replay
//!   implementations
//! - The relay: event normalization, response accumulation, turn commit,
//!   failure recovery, and per-session turn serialization

pub mod error;
pub mod relay;
pub mod upstream;

pub use error::{AgentError, UpstreamError};
pub use relay::{
    Accumulator, ErrorClassifier, HeuristicClassifier, Normalizer, Relay, TurnGate, TurnGuard,
    TurnHandle, TurnRequest, TurnState,
};
pub use upstream::{
    AgentConnector, AgentOptions, AgentSession, CliConnector, ContentBlock, RawEvent,
    RawEventStream, ReplayConnector, ScriptStep,
};

/// Result type for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;
