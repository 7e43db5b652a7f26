//! Turn commit.

use super::Accumulator;
use agentdeck_core::types::{SessionId, TurnId};
use agentdeck_store::TurnStore;
use tracing::{debug, error};

/// Persist a turn's accumulated state. Returns whether the write succeeded.
///
/// Failures are logged and never reach the client: the stream reports what
/// the agent did regardless of whether history could be recorded.
pub async fn commit_turn(
    store: &dyn TurnStore,
    session_id: &SessionId,
    turn_id: &TurnId,
    accumulator: &Accumulator,
) -> bool {
    let commit = accumulator.to_commit(session_id, turn_id);
    match store.commit_turn(&commit).await {
        Ok(()) => {
            debug!(
                output_len = commit.output.as_ref().map_or(0, String::len),
                tool_calls = commit.tool_calls.len(),
                token_captured = commit.continuation_token.is_some(),
                "Turn committed"
            );
            true
        }
        Err(e) => {
            error!("Failed to commit turn: {}", e);
            false
        }
    }
}
