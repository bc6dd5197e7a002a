//! Termination event trackers.

use async_trait::async_trait;
use havoc_model::Termination;

/// Records termination events in an external tracking system.
///
/// Tracker failures are treated as reasons *not* to terminate: a
/// termination that cannot be recorded should not happen.
#[async_trait]
pub trait Tracker: Send + Sync {
    /// A short name for log lines.
    fn name(&self) -> &str;

    /// Push a termination event to the tracking system.
    async fn track(&self, term: &Termination) -> Result<(), TrackerError>;
}

/// A tracker call failed.
#[derive(Debug, thiserror::Error)]
#[error("tracker {tracker} failed: {message}")]
pub struct TrackerError {
    pub tracker: String,
    pub message: String,
}

/// A tracker that records terminations in the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingTracker;

#[async_trait]
impl Tracker for LoggingTracker {
    fn name(&self) -> &str {
        "log"
    }

    async fn track(&self, term: &Termination) -> Result<(), TrackerError> {
        tracing::info!(
            instance = %term.instance,
            time = %term.time,
            leashed = term.leashed,
            "termination"
        );
        Ok(())
    }
}
