//! # agentdeck-gateway
//!
//! HTTP API for AgentDeck.
//!
//! Exposes the relay as a server-sent-events chat endpoint alongside
//! session management, message history and workspace file browsing.

pub mod error;
pub mod handlers;
pub mod server;

pub use error::GatewayError;
pub use server::{create_router, AppState, Gateway};

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
