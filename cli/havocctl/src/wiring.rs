//! Builds the engine's dependency set from configuration.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use havoc_engine::clock::SystemClock;
use havoc_engine::config::MonkeyConfig;
use havoc_engine::deps::Deps;
use havoc_engine::killer::{LeashedKiller, Terminator};
use havoc_engine::outage::NoOutage;
use havoc_engine::spinnaker::SpinnakerClient;
use havoc_engine::store::memory::MemoryStore;
use havoc_engine::store::pg::PgStore;
use havoc_engine::store::{Checker, SchedStore};
use havoc_engine::tracker::{LoggingTracker, Tracker};
use tracing::warn;

/// Wire up every engine collaborator from the loaded configuration.
pub async fn build_deps(cfg: MonkeyConfig) -> Result<Deps> {
    let spinnaker = Arc::new(
        SpinnakerClient::new(&cfg.spinnaker).context("could not build spinnaker client")?,
    );

    let (checker, sched_store): (Arc<dyn Checker>, Arc<dyn SchedStore>) = match &cfg.database_url {
        Some(url) => {
            let store = Arc::new(
                PgStore::connect(url)
                    .await
                    .context("could not connect to database")?,
            );
            (store.clone(), store)
        }
        None => {
            warn!("no database_url configured, using in-memory store; kill history will not persist");
            let store = Arc::new(MemoryStore::new());
            (store.clone(), store)
        }
    };

    let killer: Arc<dyn Terminator> = if cfg.leashed {
        Arc::new(LeashedKiller)
    } else {
        spinnaker.clone()
    };

    let mut trackers: Vec<Arc<dyn Tracker>> = Vec::new();
    for name in &cfg.trackers {
        match name.as_str() {
            "log" => trackers.push(Arc::new(LoggingTracker)),
            other => bail!("unknown tracker configured: {other}"),
        }
    }

    let env = cfg.environment;
    Ok(Deps {
        cfg,
        env,
        clock: Arc::new(SystemClock),
        deployment: spinnaker.clone(),
        config_getter: spinnaker,
        checker,
        sched_store,
        trackers,
        outage: Arc::new(NoOutage),
        killer,
    })
}
