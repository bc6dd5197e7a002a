//! Ongoing-outage check. Havoc does not run during outages.

use async_trait::async_trait;

/// Checks whether there is currently an ongoing outage.
#[async_trait]
pub trait OutageChecker: Send + Sync {
    /// Returns true if there is an ongoing outage.
    ///
    /// Callers treat an error here the same as an outage: if we cannot
    /// tell, we do not terminate.
    async fn outage(&self) -> Result<bool, OutageError>;
}

/// The outage check itself failed.
#[derive(Debug, thiserror::Error)]
#[error("outage check failed: {0}")]
pub struct OutageError(pub String);

/// An outage checker that always reports "no outage".
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOutage;

#[async_trait]
impl OutageChecker for NoOutage {
    async fn outage(&self) -> Result<bool, OutageError> {
        Ok(false)
    }
}
