//! # agentdeck-core
//!
//! Core types, configuration, and utilities for AgentDeck.
//!
//! This crate provides shared functionality used across all AgentDeck crates:
//!
//! - **Configuration**: Loading, validation, and management of the config file
//! - **Types**: Sessions, turns, tool-call records, and the outbound event protocol
//! - **Utilities**: Path resolution

pub mod config;
pub mod error;
pub mod paths;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
