//! havoc - random instance termination, on purpose.
//!
//! Entry points are thin: cron invokes `havoc schedule` once a day and
//! `havoc terminate` once per planned kill; everything interesting lives
//! in the engine crate.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
mod wiring;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = cli.run().await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }

    Ok(())
}
