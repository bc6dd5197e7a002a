//! `havoc install` - register the daily schedule job with cron.

use anyhow::{Context, Result};
use havoc_engine::config::MonkeyConfig;
use tracing::info;

pub fn run(cfg: MonkeyConfig) -> Result<()> {
    let line = cron_line(&cfg);
    std::fs::write(&cfg.schedule_cron_path, &line)
        .with_context(|| format!("could not write cron entry to {}", cfg.schedule_cron_path))?;
    info!(path = %cfg.schedule_cron_path, "schedule cron entry installed");
    Ok(())
}

/// The cron.d line that runs the schedule job.
fn cron_line(cfg: &MonkeyConfig) -> String {
    format!(
        "{} {} {}\n",
        cfg.cron_expression(),
        cfg.term_account,
        cfg.schedule_path
    )
}
