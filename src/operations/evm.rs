//! Ledger clock control for development nodes.

use crate::environment::Environment;
use crate::error::PipelineError;
use tracing::debug;

/// Advance the node clock by `seconds` and mine a block so the new time is
/// visible to the next call.
pub async fn increase_time(env: &Environment, seconds: u64) -> Result<(), PipelineError> {
    env.ledger()
        .increase_time(seconds)
        .await
        .map_err(PipelineError::Node)?;
    env.ledger().mine_block().await.map_err(PipelineError::Node)?;
    debug!(seconds, "ledger time advanced");
    Ok(())
}
