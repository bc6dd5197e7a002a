//! `havoc migrate` - bring the database schema up to date.

use anyhow::{bail, Result};
use havoc_engine::config::MonkeyConfig;
use havoc_engine::store::pg::PgStore;

pub async fn run(cfg: MonkeyConfig) -> Result<()> {
    let Some(url) = &cfg.database_url else {
        bail!("no database_url configured, nothing to migrate");
    };
    let store = PgStore::connect(url).await?;
    store.run_migrations().await?;
    Ok(())
}
