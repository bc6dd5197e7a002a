//! Terminations and the instances they target.

use std::fmt;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// The full naming coordinates of a running instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub app: String,
    pub account: String,
    pub region: String,
    pub stack: String,
    pub cluster: String,
    pub asg: String,
    /// Provider-assigned instance id, e.g. `i-dbcba24c`.
    pub id: String,
    pub cloud_provider: String,
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "app={} account={} region={} stack={} cluster={} asg={} instance-id={}",
            self.app, self.account, self.region, self.stack, self.cluster, self.asg, self.id
        )
    }
}

/// A proposed or executed instance termination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Termination {
    pub instance: Instance,
    pub time: DateTime<Utc>,
    /// Leashed terminations run the full decision path but replace the
    /// final kill with a log line.
    pub leashed: bool,
}

/// A proposed termination was rejected because a prior kill is too recent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinTimeViolation {
    /// The most recently terminated conflicting instance.
    pub instance_id: String,
    /// When that instance was killed, in UTC.
    pub killed_at: DateTime<Utc>,
    /// Policy time zone, for human-readable reporting.
    pub tz: Option<Tz>,
}

impl fmt::Display for MinTimeViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "would violate min time between kills: instance {} was killed at {}",
            self.instance_id, self.killed_at
        )?;
        if let Some(tz) = self.tz {
            write!(f, " ({})", self.killed_at.with_timezone(&tz))?;
        }
        Ok(())
    }
}

impl std::error::Error for MinTimeViolation {}
