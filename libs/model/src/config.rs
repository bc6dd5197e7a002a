//! Per-app termination policy.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::exception::Exception;

/// The granularity at which "one termination per group per day" is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grouping {
    /// One termination per app per day.
    App,
    /// One termination per stack per day.
    Stack,
    /// One termination per cluster per day.
    Cluster,
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Grouping::App => "app",
            Grouping::Stack => "stack",
            Grouping::Cluster => "cluster",
        };
        f.write_str(s)
    }
}

/// Per-app termination policy.
///
/// Loaded fresh for every scheduling or termination decision; policy may
/// change mid-day, so it is never cached across decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub enabled: bool,
    pub regions_are_independent: bool,
    /// Mean time between kills, counted in work-days. Must be positive.
    pub mean_time_between_kills_in_work_days: u32,
    /// Minimum time between kills, counted in work-days.
    pub min_time_between_kills_in_work_days: u32,
    pub grouping: Grouping,
    #[serde(default)]
    pub exceptions: Vec<Exception>,
    /// Deprecated allow-list. When present, the termination path refuses to
    /// run for this app (logged, treated as a no-op).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whitelist: Option<Vec<Exception>>,
}

impl AppConfig {
    /// An enabled config with default policy and the given exceptions.
    pub fn with_exceptions(exceptions: Vec<Exception>) -> Self {
        Self {
            enabled: true,
            regions_are_independent: true,
            mean_time_between_kills_in_work_days: 5,
            min_time_between_kills_in_work_days: 1,
            grouping: Grouping::Cluster,
            exceptions,
            whitelist: None,
        }
    }
}
