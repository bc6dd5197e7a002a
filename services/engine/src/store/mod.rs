//! Durable state: termination history and published schedules.
//!
//! Two backends implement the same traits. [`pg::PgStore`] is the
//! production Postgres store; [`memory::MemoryStore`] backs tests and
//! local runs.
//!
//! The min-time-between-kills guard lives here because it must be
//! atomic: checking for a recent conflicting kill and recording the new
//! one happen inside one serializable transaction, so two concurrent
//! proposals for the same group can never both pass.

pub mod memory;
pub mod pg;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use havoc_model::cal;
use havoc_model::{AppConfig, Grouping, MinTimeViolation, Termination};

use crate::schedule::Schedule;

/// A store operation failed.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A schedule for this date was already published.
    #[error("schedule already exists for {0}")]
    AlreadyExists(NaiveDate),

    /// No schedule was published for this date.
    #[error("no schedule found for {0}")]
    NotFound(NaiveDate),

    /// The proposed termination conflicts with a recent kill.
    #[error(transparent)]
    MinTime(#[from] MinTimeViolation),

    /// The serializable transaction lost a conflict race. The caller may
    /// retry; by then the winner's kill is visible and the retry fails
    /// with [`StoreError::MinTime`] instead.
    #[error("transaction conflict: {0}")]
    TxConflict(String),

    /// The policy time window has no valid representation in the policy
    /// time zone.
    #[error("invalid time: {0}")]
    Time(String),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error(transparent)]
    Query(#[from] sqlx::Error),
}

/// What the store persists about one termination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminationRecord {
    pub app: String,
    pub account: String,
    pub region: String,
    pub stack: String,
    pub cluster: String,
    pub asg: String,
    pub instance_id: String,
    pub killed_at: DateTime<Utc>,
    pub leashed: bool,
}

impl From<&Termination> for TerminationRecord {
    fn from(term: &Termination) -> Self {
        Self {
            app: term.instance.app.clone(),
            account: term.instance.account.clone(),
            region: term.instance.region.clone(),
            stack: term.instance.stack.clone(),
            cluster: term.instance.cluster.clone(),
            asg: term.instance.asg.clone(),
            instance_id: term.instance.id.clone(),
            killed_at: term.time,
            leashed: term.leashed,
        }
    }
}

/// Atomically checks a proposed termination against recent kills and,
/// if it passes, records it.
#[async_trait]
pub trait Checker: Send + Sync {
    /// Record `term` unless a conflicting kill happened within the
    /// policy's min time between kills.
    ///
    /// Conflict scope follows `app_cfg.grouping` and
    /// `app_cfg.regions_are_independent`; see [`records_conflict`].
    /// `end_hour` and `tz` define the end of the termination window used
    /// to anchor the work-day walk.
    async fn check(
        &self,
        term: &Termination,
        app_cfg: &AppConfig,
        end_hour: u32,
        tz: Tz,
    ) -> Result<(), StoreError>;
}

/// Publishes and retrieves daily schedules.
#[async_trait]
pub trait SchedStore: Send + Sync {
    /// Persist the schedule for `date`. Fails with
    /// [`StoreError::AlreadyExists`] if one was already published.
    async fn publish(&self, date: NaiveDate, schedule: &Schedule) -> Result<(), StoreError>;

    /// Fetch the schedule published for `date`.
    async fn retrieve(&self, date: NaiveDate) -> Result<Schedule, StoreError>;
}

/// The earliest kill time that still conflicts with a termination
/// proposed at `now`.
///
/// Walks backward `days` work-days from `now`'s date in `tz`, skipping
/// weekends without spending a day, then lands on `end_hour:00` local
/// time of the resulting date. `days == 0` means same-calendar-day
/// conflicts only.
pub fn no_kills_since(
    days: u32,
    now: DateTime<Utc>,
    end_hour: u32,
    tz: Tz,
) -> Result<DateTime<Utc>, StoreError> {
    let mut date = now.with_timezone(&tz).date_naive();
    let mut remaining = days;
    loop {
        if !cal::is_workday(&date) {
            date -= Duration::days(1);
            continue;
        }
        if remaining == 0 {
            break;
        }
        remaining -= 1;
        date -= Duration::days(1);
    }

    tz.with_ymd_and_hms(date.year(), date.month(), date.day(), end_hour, 0, 0)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| StoreError::Time(format!("no valid time for {date} {end_hour}:00 in {tz}")))
}

/// Whether a stored kill conflicts with a proposed one under the policy.
///
/// Conflicts always require the same app and account. The grouping
/// narrows further: `Stack` requires the same stack, `Cluster` the same
/// cluster. When regions are independent, only kills in the same region
/// conflict. Leashed kills never block an unleashed proposal; unleashed
/// kills block everything.
pub fn records_conflict(
    proposed: &TerminationRecord,
    prior: &TerminationRecord,
    app_cfg: &AppConfig,
) -> bool {
    if prior.app != proposed.app || prior.account != proposed.account {
        return false;
    }
    match app_cfg.grouping {
        Grouping::App => {}
        Grouping::Stack => {
            if prior.stack != proposed.stack {
                return false;
            }
        }
        Grouping::Cluster => {
            if prior.cluster != proposed.cluster {
                return false;
            }
        }
    }
    if app_cfg.regions_are_independent && prior.region != proposed.region {
        return false;
    }
    // a leashed history entry does not protect real instances
    if !proposed.leashed && prior.leashed {
        return false;
    }
    true
}
