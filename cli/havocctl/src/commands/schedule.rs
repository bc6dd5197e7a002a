//! `havoc schedule` - plan today's terminations and install the crontab.
//!
//! Publishing is first-writer-wins per date. When another engine instance
//! has already published today's schedule, this one installs the
//! published schedule instead of its own draft, so every instance ends up
//! executing the same plan.

use anyhow::{Context, Result};
use clap::Args;
use havoc_engine::config::MonkeyConfig;
use havoc_engine::deps::Deps;
use havoc_engine::schedule::Schedule;
use havoc_engine::store::StoreError;
use tracing::info;

use crate::wiring;

#[derive(Debug, Args)]
pub struct ScheduleArgs {
    /// Apps to schedule. When empty, every app in the inventory.
    pub apps: Vec<String>,
}

pub async fn run(cfg: MonkeyConfig, args: ScheduleArgs) -> Result<()> {
    let deps = wiring::build_deps(cfg).await?;
    if !deps.cfg.schedule_enabled {
        info!("schedule generation is disabled, doing nothing");
        return Ok(());
    }

    let today = deps
        .clock
        .now()
        .with_timezone(&deps.cfg.time_zone)
        .date_naive();

    let mut draft = Schedule::new();
    draft
        .populate(
            deps.deployment.as_ref(),
            deps.config_getter.as_ref(),
            &deps.cfg,
            deps.clock.as_ref(),
            &args.apps,
        )
        .await?;

    let schedule = match deps.sched_store.publish(today, &draft).await {
        Ok(()) => draft,
        Err(StoreError::AlreadyExists(date)) => {
            info!(%date, "schedule already published, installing the published one");
            deps.sched_store.retrieve(today).await?
        }
        Err(e) => return Err(e.into()),
    };

    install_crontab(&deps, &schedule)
}

pub fn install_crontab(deps: &Deps, schedule: &Schedule) -> Result<()> {
    let contents = schedule.crontab(&deps.cfg.term_path, &deps.cfg.term_account);
    std::fs::write(&deps.cfg.cron_path, &contents)
        .with_context(|| format!("could not write crontab to {}", deps.cfg.cron_path))?;
    info!(
        path = %deps.cfg.cron_path,
        terminations = schedule.entries().len(),
        "crontab installed"
    );
    Ok(())
}
