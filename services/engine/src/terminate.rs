//! The termination orchestrator.
//!
//! Runs one end-to-end kill decision: policy gates, eligibility, victim
//! selection, the min-time guard, tracker notification, and finally the
//! kill itself. Gates that say "do nothing today" are logged successes;
//! only safety violations and infrastructure failures are errors.

use havoc_model::{InstanceGroup, Termination};
use rand::seq::IndexedRandom;
use tracing::{info, warn};

use crate::deps::{ConfigGetError, Deps};
use crate::eligible;
use crate::killer::KillError;
use crate::outage::OutageError;
use crate::store::StoreError;
use crate::tracker::TrackerError;

/// A termination request failed.
///
/// Policy no-ops (master switch off, disabled app, no eligible
/// instances, active outage) are not errors; they return `Ok`.
#[derive(Debug, thiserror::Error)]
pub enum TerminateError {
    /// Running unleashed in a test environment is never allowed.
    #[error("may not run unleashed in a test environment")]
    UnleashedInTestEnv,

    #[error("outage check failed: {0}")]
    Outage(#[from] OutageError),

    #[error(transparent)]
    ConfigGet(#[from] ConfigGetError),

    #[error(transparent)]
    Deployment(#[from] havoc_deploy::DeployError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    Kill(#[from] KillError),
}

/// Terminate one random eligible instance of `app` in `account`,
/// optionally narrowed to a region, stack, or cluster.
pub async fn terminate(
    deps: &Deps,
    app: &str,
    account: &str,
    region: Option<&str>,
    stack: Option<&str>,
    cluster: Option<&str>,
) -> Result<(), TerminateError> {
    if !deps.cfg.enabled {
        info!(app, account, "master enabled flag is off, not terminating");
        return Ok(());
    }

    if deps.outage.outage().await? {
        info!(app, account, "ongoing outage, not terminating");
        return Ok(());
    }

    if !deps.cfg.account_enabled(account) {
        info!(app, account, "account not enabled, not terminating");
        return Ok(());
    }

    // a test deployment must never do real harm
    if deps.env.in_test() && !deps.cfg.leashed {
        return Err(TerminateError::UnleashedInTestEnv);
    }

    let app_cfg = deps.config_getter.get(app).await?;
    if !app_cfg.enabled {
        info!(app, account, "app is disabled, not terminating");
        return Ok(());
    }
    if app_cfg.whitelist.is_some() {
        warn!(app, account, "app uses the deprecated whitelist, not terminating");
        return Ok(());
    }

    let group = InstanceGroup::new(
        app,
        account,
        region.unwrap_or_default(),
        stack.unwrap_or_default(),
        cluster.unwrap_or_default(),
    );

    let tree = deps.deployment.get_app(app).await?;
    let candidates = eligible::instances(
        &group,
        &app_cfg.exceptions,
        app_cfg.whitelist.as_deref(),
        &tree,
    );
    let Some(victim) = candidates.choose(&mut rand::rng()) else {
        info!(group = %group, "no eligible instances, not terminating");
        return Ok(());
    };

    let term = Termination {
        instance: victim.clone(),
        time: deps.clock.now(),
        leashed: deps.cfg.leashed,
    };

    // the guard both checks and records; a termination we cannot record
    // must not happen
    deps.checker
        .check(&term, &app_cfg, deps.cfg.end_hour, deps.cfg.time_zone)
        .await?;

    for tracker in &deps.trackers {
        tracker.track(&term).await.map_err(|e| {
            warn!(tracker = tracker.name(), error = %e, "tracker failed, not terminating");
            e
        })?;
    }

    info!(instance = %term.instance, leashed = term.leashed, "terminating instance");
    deps.killer.execute(&term).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use havoc_deploy::{AccountInfo, App, AppMap, DeployError, Deployment};
    use havoc_model::AppConfig;
    use tokio::sync::Mutex;

    use super::*;
    use crate::clock::FixedClock;
    use crate::config::MonkeyConfig;
    use crate::deps::AppConfigGetter;
    use crate::env::RuntimeEnv;
    use crate::killer::Terminator;
    use crate::outage::{NoOutage, OutageChecker};
    use crate::store::memory::MemoryStore;
    use crate::tracker::Tracker;

    struct FixedDeployment;

    #[async_trait]
    impl Deployment for FixedDeployment {
        async fn get_app(&self, name: &str) -> Result<App, DeployError> {
            if name != "abc" {
                return Err(DeployError::AppNotFound(name.to_string()));
            }
            let data: AppMap = BTreeMap::from([(
                "prod".to_string(),
                AccountInfo {
                    cloud_provider: "aws".to_string(),
                    clusters: BTreeMap::from([(
                        "abc-staging".to_string(),
                        BTreeMap::from([(
                            "us-east-1".to_string(),
                            BTreeMap::from([(
                                "abc-staging-v003".to_string(),
                                vec!["i-01".to_string(), "i-02".to_string()],
                            )]),
                        )]),
                    )]),
                },
            )]);
            Ok(App::new("abc", data))
        }

        async fn app_names(&self) -> Result<Vec<String>, DeployError> {
            Ok(vec!["abc".to_string()])
        }

        async fn get_cluster_names(
            &self,
            _app: &str,
            _account: &str,
        ) -> Result<Vec<String>, DeployError> {
            Ok(vec!["abc-staging".to_string()])
        }

        async fn get_region_names(
            &self,
            _app: &str,
            _account: &str,
            _cluster: &str,
        ) -> Result<Vec<String>, DeployError> {
            Ok(vec!["us-east-1".to_string()])
        }

        async fn get_instance_ids(
            &self,
            _app: &str,
            _account: &str,
            _cloud_provider: &str,
            _region: &str,
            _cluster: &str,
        ) -> Result<(String, Vec<String>), DeployError> {
            Ok((
                "abc-staging-v003".to_string(),
                vec!["i-01".to_string(), "i-02".to_string()],
            ))
        }

        async fn cloud_provider(&self, _account: &str) -> Result<String, DeployError> {
            Ok("aws".to_string())
        }
    }

    struct FixedConfigGetter(AppConfig);

    #[async_trait]
    impl AppConfigGetter for FixedConfigGetter {
        async fn get(&self, _app: &str) -> Result<AppConfig, ConfigGetError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct RecordingKiller {
        killed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Terminator for RecordingKiller {
        async fn execute(&self, term: &Termination) -> Result<(), KillError> {
            self.killed.lock().await.push(term.instance.id.clone());
            Ok(())
        }
    }

    struct Outage;

    #[async_trait]
    impl OutageChecker for Outage {
        async fn outage(&self) -> Result<bool, OutageError> {
            Ok(true)
        }
    }

    struct FailingTracker;

    #[async_trait]
    impl Tracker for FailingTracker {
        fn name(&self) -> &str {
            "failing"
        }

        async fn track(&self, _term: &Termination) -> Result<(), TrackerError> {
            Err(TrackerError {
                tracker: "failing".to_string(),
                message: "unreachable".to_string(),
            })
        }
    }

    fn deps(cfg: MonkeyConfig, app_cfg: AppConfig, killer: Arc<RecordingKiller>) -> Deps {
        let store = Arc::new(MemoryStore::new());
        let env = cfg.environment;
        Deps {
            cfg,
            env,
            clock: Arc::new(FixedClock(
                Utc.with_ymd_and_hms(2015, 12, 17, 19, 35, 0).unwrap(),
            )),
            deployment: Arc::new(FixedDeployment),
            config_getter: Arc::new(FixedConfigGetter(app_cfg)),
            checker: store.clone(),
            sched_store: store,
            trackers: vec![],
            outage: Arc::new(NoOutage),
            killer,
        }
    }

    fn enabled_cfg() -> MonkeyConfig {
        MonkeyConfig {
            enabled: true,
            leashed: false,
            accounts: vec!["prod".to_string()],
            ..MonkeyConfig::default()
        }
    }

    #[tokio::test]
    async fn test_kills_one_eligible_instance() {
        let killer = Arc::new(RecordingKiller::default());
        let deps = deps(
            enabled_cfg(),
            AppConfig::with_exceptions(vec![]),
            killer.clone(),
        );

        terminate(&deps, "abc", "prod", None, None, None)
            .await
            .unwrap();

        let killed = killer.killed.lock().await;
        assert_eq!(killed.len(), 1);
        assert!(killed[0] == "i-01" || killed[0] == "i-02");
    }

    #[tokio::test]
    async fn test_master_switch_off_is_a_noop() {
        let killer = Arc::new(RecordingKiller::default());
        let cfg = MonkeyConfig {
            enabled: false,
            ..enabled_cfg()
        };
        let deps = deps(cfg, AppConfig::with_exceptions(vec![]), killer.clone());

        terminate(&deps, "abc", "prod", None, None, None)
            .await
            .unwrap();
        assert!(killer.killed.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_unleashed_in_test_env_is_an_error() {
        let killer = Arc::new(RecordingKiller::default());
        let cfg = MonkeyConfig {
            environment: RuntimeEnv::Test,
            ..enabled_cfg()
        };
        let deps = deps(cfg, AppConfig::with_exceptions(vec![]), killer.clone());

        let err = terminate(&deps, "abc", "prod", None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, TerminateError::UnleashedInTestEnv));
        assert!(killer.killed.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_outage_noop_wins_over_unleashed_refusal() {
        // the outage gate runs first, so even an unleashed test
        // deployment backs off silently during an outage
        let killer = Arc::new(RecordingKiller::default());
        let cfg = MonkeyConfig {
            environment: RuntimeEnv::Test,
            ..enabled_cfg()
        };
        let mut deps = deps(cfg, AppConfig::with_exceptions(vec![]), killer.clone());
        deps.outage = Arc::new(Outage);

        terminate(&deps, "abc", "prod", None, None, None)
            .await
            .unwrap();
        assert!(killer.killed.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_account_wins_over_unleashed_refusal() {
        let killer = Arc::new(RecordingKiller::default());
        let cfg = MonkeyConfig {
            environment: RuntimeEnv::Test,
            ..enabled_cfg()
        };
        let deps = deps(cfg, AppConfig::with_exceptions(vec![]), killer.clone());

        terminate(&deps, "abc", "staging", None, None, None)
            .await
            .unwrap();
        assert!(killer.killed.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_outage_is_a_noop() {
        let killer = Arc::new(RecordingKiller::default());
        let mut deps = deps(
            enabled_cfg(),
            AppConfig::with_exceptions(vec![]),
            killer.clone(),
        );
        deps.outage = Arc::new(Outage);

        terminate(&deps, "abc", "prod", None, None, None)
            .await
            .unwrap();
        assert!(killer.killed.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_account_is_a_noop() {
        let killer = Arc::new(RecordingKiller::default());
        let deps = deps(
            enabled_cfg(),
            AppConfig::with_exceptions(vec![]),
            killer.clone(),
        );

        terminate(&deps, "abc", "staging", None, None, None)
            .await
            .unwrap();
        assert!(killer.killed.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_app_is_a_noop() {
        let killer = Arc::new(RecordingKiller::default());
        let app_cfg = AppConfig {
            enabled: false,
            ..AppConfig::with_exceptions(vec![])
        };
        let deps = deps(enabled_cfg(), app_cfg, killer.clone());

        terminate(&deps, "abc", "prod", None, None, None)
            .await
            .unwrap();
        assert!(killer.killed.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_whitelisted_app_is_a_noop() {
        let killer = Arc::new(RecordingKiller::default());
        let app_cfg = AppConfig {
            whitelist: Some(vec![]),
            ..AppConfig::with_exceptions(vec![])
        };
        let deps = deps(enabled_cfg(), app_cfg, killer.clone());

        terminate(&deps, "abc", "prod", None, None, None)
            .await
            .unwrap();
        assert!(killer.killed.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_no_eligible_instances_is_a_noop() {
        let killer = Arc::new(RecordingKiller::default());
        let deps = deps(
            enabled_cfg(),
            AppConfig::with_exceptions(vec![]),
            killer.clone(),
        );

        // no such cluster
        terminate(&deps, "abc", "prod", None, None, Some("abc-prod"))
            .await
            .unwrap();
        assert!(killer.killed.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_second_kill_same_day_violates_min_time() {
        let killer = Arc::new(RecordingKiller::default());
        let deps = deps(
            enabled_cfg(),
            AppConfig::with_exceptions(vec![]),
            killer.clone(),
        );

        terminate(&deps, "abc", "prod", None, None, None)
            .await
            .unwrap();
        let err = terminate(&deps, "abc", "prod", None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, TerminateError::Store(StoreError::MinTime(_))));
        assert_eq!(killer.killed.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_tracker_failure_blocks_the_kill() {
        let killer = Arc::new(RecordingKiller::default());
        let mut deps = deps(
            enabled_cfg(),
            AppConfig::with_exceptions(vec![]),
            killer.clone(),
        );
        deps.trackers = vec![Arc::new(FailingTracker)];

        let err = terminate(&deps, "abc", "prod", None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, TerminateError::Tracker(_)));
        assert!(killer.killed.lock().await.is_empty());
    }
}
