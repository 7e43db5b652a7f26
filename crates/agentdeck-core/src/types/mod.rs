//! Core types for AgentDeck.

mod event;
mod identifiers;
mod session;
mod turn;

pub use event::*;
pub use identifiers::*;
pub use session::*;
pub use turn::*;
