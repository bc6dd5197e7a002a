//! `havoc eligible` - show what would be fair game for a group.

use anyhow::Result;
use clap::Args;
use havoc_engine::config::MonkeyConfig;
use havoc_engine::eligible;
use havoc_model::InstanceGroup;

use crate::wiring;

#[derive(Debug, Args)]
pub struct EligibleArgs {
    pub app: String,
    pub account: String,

    #[arg(long)]
    pub region: Option<String>,

    #[arg(long)]
    pub stack: Option<String>,

    #[arg(long)]
    pub cluster: Option<String>,
}

pub async fn run(cfg: MonkeyConfig, args: EligibleArgs) -> Result<()> {
    let deps = wiring::build_deps(cfg).await?;
    let app_cfg = deps.config_getter.get(&args.app).await?;
    let tree = deps.deployment.get_app(&args.app).await?;

    let group = InstanceGroup::new(
        args.app,
        args.account,
        args.region.unwrap_or_default(),
        args.stack.unwrap_or_default(),
        args.cluster.unwrap_or_default(),
    );

    let whitelist = app_cfg.whitelist.as_deref();
    for instance in eligible::instances(&group, &app_cfg.exceptions, whitelist, &tree) {
        println!("{instance}");
    }
    Ok(())
}
