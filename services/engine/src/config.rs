//! Global havoc configuration.
//!
//! Loaded once at process start from a TOML file plus `HAVOC_*`
//! environment overrides. Per-app policy lives in
//! [`havoc_model::AppConfig`] and is fetched fresh per decision; this is
//! the process-wide knobs only.

use std::path::Path;

use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::env::RuntimeEnv;

/// Hours before `start_hour` at which the daily schedule job runs.
const CRON_BEFORE_START_HOUR: u32 = 2;

/// Process-wide configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonkeyConfig {
    /// Master switch. When false every termination request is a no-op.
    pub enabled: bool,
    /// When true the kill action is replaced by a log line; everything
    /// else (selection, guard, tracking) still runs.
    pub leashed: bool,
    /// When false the daily schedule job does nothing.
    pub schedule_enabled: bool,
    /// Accounts havoc is allowed to terminate in.
    pub accounts: Vec<String>,
    /// Start of the daily termination window, 24-hour local time.
    pub start_hour: u32,
    /// End of the daily termination window, 24-hour local time.
    /// Must be strictly greater than `start_hour`.
    pub end_hour: u32,
    /// Time zone the termination window is expressed in.
    pub time_zone: Tz,
    /// Where the daily termination crontab is written.
    pub cron_path: String,
    /// Executable each termination cron entry invokes.
    pub term_path: String,
    /// OS account the termination cron entries run as.
    pub term_account: String,
    /// Cap on the number of apps examined per schedule run.
    pub max_apps: usize,
    /// Override for the daily schedule job's cron expression.
    pub cron_expression: Option<String>,
    /// Where the schedule job's own cron file is written by `install`.
    pub schedule_cron_path: String,
    /// Executable the schedule cron entry invokes.
    pub schedule_path: String,
    /// Deployed environment; test environments may only run leashed.
    pub environment: RuntimeEnv,
    /// Postgres connection string for the schedule/termination store.
    pub database_url: Option<String>,
    /// Spinnaker collaborator settings.
    pub spinnaker: SpinnakerConfig,
    /// Names of trackers to notify before a kill.
    pub trackers: Vec<String>,
}

/// Spinnaker endpoint settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SpinnakerConfig {
    pub endpoint: String,
    /// Email recorded as the submitting user on terminateInstances tasks.
    pub user: String,
}

impl Default for MonkeyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            leashed: true,
            schedule_enabled: false,
            accounts: Vec::new(),
            start_hour: 9,
            end_hour: 15,
            time_zone: chrono_tz::America::Los_Angeles,
            cron_path: "/etc/cron.d/havoc-daily-terminations".to_string(),
            term_path: "/apps/havoc/havoc-terminate.sh".to_string(),
            term_account: "root".to_string(),
            max_apps: usize::MAX,
            cron_expression: None,
            schedule_cron_path: "/etc/cron.d/havoc-schedule".to_string(),
            schedule_path: "/apps/havoc/havoc-schedule.sh".to_string(),
            environment: RuntimeEnv::Prod,
            database_url: None,
            spinnaker: SpinnakerConfig::default(),
            trackers: Vec::new(),
        }
    }
}

impl MonkeyConfig {
    /// Load configuration from an optional TOML file plus `HAVOC_*`
    /// environment variables (e.g. `HAVOC_ENABLED=true`,
    /// `HAVOC_SPINNAKER__ENDPOINT=...`).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        builder = match path {
            Some(path) => builder.add_source(File::from(path)),
            None => builder.add_source(File::with_name("/etc/havoc/havoc").required(false)),
        };
        builder = builder.add_source(Environment::with_prefix("HAVOC").separator("__"));

        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations the engine would otherwise have to panic on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start_hour > 23 {
            return Err(ConfigError::Message(format!(
                "start_hour {} is not in range 0-23",
                self.start_hour
            )));
        }
        if self.end_hour > 23 {
            return Err(ConfigError::Message(format!(
                "end_hour {} is not in range 0-23",
                self.end_hour
            )));
        }
        if self.end_hour <= self.start_hour {
            return Err(ConfigError::Message(format!(
                "end_hour ({}) must be after start_hour ({})",
                self.end_hour, self.start_hour
            )));
        }
        Ok(())
    }

    /// True if the account is in the configured allow-list.
    pub fn account_enabled(&self, account: &str) -> bool {
        self.accounts.iter().any(|a| a == account)
    }

    /// Cron expression for the daily schedule job. Defaults to two hours
    /// before `start_hour` on weekdays.
    pub fn cron_expression(&self) -> String {
        if let Some(expr) = &self.cron_expression {
            return expr.clone();
        }
        let run_at_hour = (self.start_hour + 24 - CRON_BEFORE_START_HOUR) % 24;
        format!("0 {run_at_hour} * * 1-5")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_safe() {
        let cfg = MonkeyConfig::default();
        assert!(!cfg.enabled);
        assert!(cfg.leashed);
        assert!(!cfg.schedule_enabled);
        assert!(cfg.accounts.is_empty());
        cfg.validate().unwrap();
    }

    #[test]
    fn test_account_enabled() {
        let cfg = MonkeyConfig {
            accounts: vec!["prod".into(), "test".into()],
            ..Default::default()
        };
        assert!(cfg.account_enabled("prod"));
        assert!(!cfg.account_enabled("staging"));
    }

    #[test]
    fn test_validate_rejects_inverted_window() {
        let cfg = MonkeyConfig {
            start_hour: 15,
            end_hour: 9,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_default_cron_expression() {
        let cfg = MonkeyConfig::default();
        assert_eq!(cfg.cron_expression(), "0 7 * * 1-5");
    }

    #[test]
    fn test_cron_expression_wraps_past_midnight() {
        let cfg = MonkeyConfig {
            start_hour: 1,
            end_hour: 5,
            ..Default::default()
        };
        assert_eq!(cfg.cron_expression(), "0 23 * * 1-5");
    }

    #[test]
    fn test_cron_expression_override() {
        let cfg = MonkeyConfig {
            cron_expression: Some("30 6 * * *".into()),
            ..Default::default()
        };
        assert_eq!(cfg.cron_expression(), "30 6 * * *");
    }

    #[test]
    fn test_deserialize_from_toml() {
        let cfg: MonkeyConfig = toml::from_str(
            r#"
            enabled = true
            leashed = false
            accounts = ["prod"]
            time_zone = "America/New_York"
            environment = "test"

            [spinnaker]
            endpoint = "http://spinnaker.example.com:8084"
            "#,
        )
        .unwrap();
        assert!(cfg.enabled);
        assert!(!cfg.leashed);
        assert_eq!(cfg.time_zone, chrono_tz::America::New_York);
        assert!(cfg.environment.in_test());
        assert_eq!(cfg.spinnaker.endpoint, "http://spinnaker.example.com:8084");
        // unspecified keys keep their defaults
        assert_eq!(cfg.start_hour, 9);
        assert_eq!(cfg.end_hour, 15);
    }
}
