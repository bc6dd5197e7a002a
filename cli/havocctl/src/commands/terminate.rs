//! `havoc terminate` - one kill decision, end to end.

use anyhow::{Context, Result};
use clap::Args;
use havoc_engine::config::MonkeyConfig;
use havoc_engine::terminate;

use crate::wiring;

#[derive(Debug, Args)]
pub struct TerminateArgs {
    /// App to terminate an instance of.
    pub app: String,

    /// Account the instance runs in.
    pub account: String,

    /// Restrict selection to one region.
    #[arg(long)]
    pub region: Option<String>,

    /// Restrict selection to one stack.
    #[arg(long)]
    pub stack: Option<String>,

    /// Restrict selection to one cluster.
    #[arg(long)]
    pub cluster: Option<String>,
}

pub async fn run(cfg: MonkeyConfig, args: TerminateArgs) -> Result<()> {
    let deps = wiring::build_deps(cfg).await?;
    terminate::terminate(
        &deps,
        &args.app,
        &args.account,
        args.region.as_deref(),
        args.stack.as_deref(),
        args.cluster.as_deref(),
    )
    .await
    .with_context(|| format!("termination failed for app {}", args.app))
}
