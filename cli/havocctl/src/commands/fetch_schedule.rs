//! `havoc fetch-schedule` - install today's published schedule.

use anyhow::Result;
use havoc_engine::config::MonkeyConfig;

use crate::commands::schedule::install_crontab;
use crate::wiring;

pub async fn run(cfg: MonkeyConfig) -> Result<()> {
    let deps = wiring::build_deps(cfg).await?;
    let today = deps
        .clock
        .now()
        .with_timezone(&deps.cfg.time_zone)
        .date_naive();

    let schedule = deps.sched_store.retrieve(today).await?;
    install_crontab(&deps, &schedule)
}
