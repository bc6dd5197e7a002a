//! Explicit dependency wiring for the engine.
//!
//! Collaborators are constructed once at process start and threaded
//! through calls; there is no global registration.

use std::sync::Arc;

use async_trait::async_trait;
use havoc_deploy::Deployment;
use havoc_model::AppConfig;
use thiserror::Error;

use crate::clock::Clock;
use crate::config::MonkeyConfig;
use crate::env::RuntimeEnv;
use crate::killer::Terminator;
use crate::outage::OutageChecker;
use crate::store::{Checker, SchedStore};
use crate::tracker::Tracker;

/// Retrieves per-app termination policy.
#[async_trait]
pub trait AppConfigGetter: Send + Sync {
    /// Return the policy for one app.
    async fn get(&self, app: &str) -> Result<AppConfig, ConfigGetError>;
}

/// Per-app config retrieval failed.
#[derive(Debug, Error)]
#[error("could not retrieve config for app {app}: {message}")]
pub struct ConfigGetError {
    pub app: String,
    pub message: String,
}

/// Everything the orchestrator and scheduler need, built once at startup.
#[derive(Clone)]
pub struct Deps {
    pub cfg: MonkeyConfig,
    pub env: RuntimeEnv,
    pub clock: Arc<dyn Clock>,
    pub deployment: Arc<dyn Deployment>,
    pub config_getter: Arc<dyn AppConfigGetter>,
    pub checker: Arc<dyn Checker>,
    pub sched_store: Arc<dyn SchedStore>,
    pub trackers: Vec<Arc<dyn Tracker>>,
    pub outage: Arc<dyn OutageChecker>,
    pub killer: Arc<dyn Terminator>,
}
