//! The daily termination schedule.
//!
//! Once a day, for every eligible group of every enabled app, the
//! scheduler flips a biased coin and, on a hit, picks a uniformly random
//! time inside the configured termination window. The result is a
//! [`Schedule`] that is published to the store and replayed by cron.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use havoc_deploy::{eligible_instance_groups, App, DeployError, Deployment};
use havoc_model::{AppConfig, InstanceGroup};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::MonkeyConfig;
use crate::deps::AppConfigGetter;

/// Errors that abort a whole schedule run.
///
/// Failures scoped to one app never abort the run; they are logged and
/// the app is skipped.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("could not retrieve list of apps: {0}")]
    AppList(#[from] DeployError),
}

/// One planned termination: the group to pick from and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub group: InstanceGroup,
    pub time: DateTime<Utc>,
}

impl Entry {
    /// Render this entry as a crontab line, not newline-terminated.
    ///
    /// Format: minute, hour, day-of-month, month, weekday, then the OS
    /// account and the termination command. Times are rendered in UTC.
    pub fn crontab(&self, term_path: &str, os_account: &str) -> String {
        let t = self.time.with_timezone(&Utc);
        format!(
            "{} {} {} {} {} {} {}",
            t.minute(),
            t.hour(),
            t.day(),
            t.month(),
            t.weekday().num_days_from_sunday(),
            os_account,
            terminate_command(term_path, &self.group),
        )
    }
}

/// The command string a cron entry uses to terminate from a group.
fn terminate_command(term_path: &str, group: &InstanceGroup) -> String {
    let mut cmd = format!("{term_path} {} {}", group.app, group.account);
    if let Some(cluster) = &group.cluster {
        cmd.push_str(&format!(" --cluster={cluster}"));
    }
    if let Some(stack) = &group.stack {
        cmd.push_str(&format!(" --stack={stack}"));
    }
    if let Some(region) = &group.region {
        cmd.push_str(&format!(" --region={region}"));
    }
    cmd
}

/// A day's plan of terminations.
///
/// Unordered for storage; time-ordered when rendered for cron.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schedule {
    entries: Vec<Entry>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plan a termination for `group` at `time`.
    pub fn add(&mut self, time: DateTime<Utc>, group: InstanceGroup) {
        self.entries.push(Entry { group, time });
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the whole schedule as crontab lines sorted by time
    /// ascending. Ties keep insertion order.
    pub fn crontab(&self, term_path: &str, os_account: &str) -> String {
        let mut entries: Vec<&Entry> = self.entries.iter().collect();
        entries.sort_by_key(|entry| entry.time);

        let mut out = String::new();
        for entry in entries {
            out.push_str(&entry.crontab(term_path, os_account));
            out.push('\n');
        }
        out
    }

    /// Populate the schedule with random terminations for the given apps.
    /// An empty `apps` slice means all apps known to the inventory.
    ///
    /// One bad app never aborts the run: config or inventory failures for
    /// an app are logged and the app is skipped.
    pub async fn populate(
        &mut self,
        deployment: &dyn Deployment,
        getter: &dyn AppConfigGetter,
        cfg: &MonkeyConfig,
        clock: &dyn Clock,
        apps: &[String],
    ) -> Result<(), ScheduleError> {
        let names = if apps.is_empty() {
            deployment.app_names().await?
        } else {
            apps.to_vec()
        };

        let mut examined = 0usize;
        for name in names {
            if examined >= cfg.max_apps {
                break;
            }

            let app = match deployment.get_app(&name).await {
                Ok(app) => app,
                Err(e) => {
                    warn!(app = %name, error = %e, "could not retrieve deployment, skipping app");
                    continue;
                }
            };
            examined += 1;

            let app_cfg = match getter.get(&name).await {
                Ok(app_cfg) => app_cfg,
                Err(e) => {
                    warn!(app = %name, error = %e, "could not retrieve config, skipping app");
                    continue;
                }
            };

            self.schedule_app(&app, &app_cfg, cfg, clock);
        }

        Ok(())
    }

    /// Plan terminations for one app.
    fn schedule_app(
        &mut self,
        app: &App,
        app_cfg: &AppConfig,
        cfg: &MonkeyConfig,
        clock: &dyn Clock,
    ) {
        if !app_cfg.enabled {
            info!(app = %app.name(), "app disabled");
            return;
        }

        let groups = eligible_instance_groups(app, app_cfg);
        if groups.is_empty() {
            info!(app = %app.name(), "no eligible instance groups");
        }

        let mut rng = rand::rng();
        for group in groups {
            let sample: f64 = rng.random();
            let mean = app_cfg.mean_time_between_kills_in_work_days;
            let kill = should_kill(mean, sample);
            info!(group = %group, mtbk = mean, kill, "schedule decision");
            if kill {
                let time =
                    choose_termination_time(clock.now(), cfg.start_hour, cfg.end_hour, cfg.time_zone);
                self.add(time, group);
            }
        }
    }
}

/// Decide by biased coin flip whether a group gets a termination today.
///
/// The kill probability is `1 / mean_days`; a sample exactly equal to the
/// probability counts as a kill.
///
/// # Panics
///
/// Panics if `mean_days` is zero; a non-positive mean time between kills
/// is a configuration error that must not be coerced.
pub fn should_kill(mean_days: u32, sample: f64) -> bool {
    assert!(mean_days > 0, "mean time between kills is zero or negative");

    let p_kill = 1.0 / f64::from(mean_days);
    p_kill >= sample
}

/// Randomly select a termination time on the same date as `now`, between
/// `start_hour:00` (inclusive) and `end_hour:00` (exclusive) in `tz`.
///
/// There is no guarantee the selected time is in the future.
///
/// # Panics
///
/// Panics if `end_hour <= start_hour`; an inverted window is a
/// configuration error.
pub fn choose_termination_time(
    now: DateTime<Utc>,
    start_hour: u32,
    end_hour: u32,
    tz: Tz,
) -> DateTime<Utc> {
    assert!(
        end_hour > start_hour,
        "termination window is inverted: start_hour={start_hour} end_hour={end_hour}"
    );

    let minutes_in_window = (end_hour - start_hour) * 60;
    let offset = rand::rng().random_range(0..minutes_in_window);
    termination_time_at_offset(now, start_hour, offset, tz)
}

/// `start_hour:00` on `now`'s date in `tz`, plus `offset` minutes.
///
/// A DST spring-forward can remove the start hour from the local day;
/// the start then slides forward to the first hour that exists.
fn termination_time_at_offset(
    now: DateTime<Utc>,
    start_hour: u32,
    offset_minutes: u32,
    tz: Tz,
) -> DateTime<Utc> {
    let local = now.with_timezone(&tz);
    let start = (start_hour..24)
        .find_map(|hour| {
            tz.with_ymd_and_hms(local.year(), local.month(), local.day(), hour, 0, 0)
                .earliest()
        })
        .unwrap_or(local);
    (start + Duration::minutes(i64::from(offset_minutes))).with_timezone(&Utc)
}
