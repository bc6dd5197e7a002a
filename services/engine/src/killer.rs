//! The final kill action.

use async_trait::async_trait;
use havoc_model::Termination;

/// Terminates a running instance.
#[async_trait]
pub trait Terminator: Send + Sync {
    /// Kill the instance named by the termination.
    async fn execute(&self, term: &Termination) -> Result<(), KillError>;
}

/// The kill action failed.
#[derive(Debug, thiserror::Error)]
#[error("termination failed: {0}")]
pub struct KillError(pub String);

/// The killer substituted when running leashed: logs instead of killing.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeashedKiller;

#[async_trait]
impl Terminator for LeashedKiller {
    async fn execute(&self, term: &Termination) -> Result<(), KillError> {
        tracing::info!(instance_id = %term.instance.id, "leashed=true, not killing instance");
        Ok(())
    }
}
