//! CLI commands.

mod eligible;
mod fetch_schedule;
mod install;
mod migrate;
mod schedule;
mod terminate;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use havoc_engine::config::MonkeyConfig;

/// Randomly terminates instances so that engineers build for failure.
#[derive(Debug, Parser)]
#[command(name = "havoc")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file. Defaults to /etc/havoc/havoc.toml.
    #[arg(long, global = true, env = "HAVOC_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Terminate one random eligible instance of an app.
    Terminate(terminate::TerminateArgs),

    /// Generate today's termination schedule and install it as a crontab.
    Schedule(schedule::ScheduleArgs),

    /// Fetch today's already-published schedule and install it.
    FetchSchedule,

    /// Install the cron entry that runs the daily schedule job.
    Install,

    /// Print the instances eligible for termination in a group.
    Eligible(eligible::EligibleArgs),

    /// Run database migrations.
    Migrate,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let cfg = MonkeyConfig::load(self.config.as_deref())?;

        match self.command {
            Commands::Terminate(args) => terminate::run(cfg, args).await,
            Commands::Schedule(args) => schedule::run(cfg, args).await,
            Commands::FetchSchedule => fetch_schedule::run(cfg).await,
            Commands::Install => install::run(cfg),
            Commands::Eligible(args) => eligible::run(cfg, args).await,
            Commands::Migrate => migrate::run(cfg).await,
        }
    }
}
