//! Divides an app's deployment into termination domains.

use std::collections::BTreeSet;

use havoc_model::{AppConfig, Grouping, InstanceGroup};

use crate::tree::App;

/// Returns the instance groups of an app that are eligible for termination.
///
/// How instances are divided into groups depends on the app's grouping
/// granularity (app, stack, or cluster) and on whether regions are
/// independent. Each returned group covers at least one instance. Output
/// order is unspecified; deduplication is by set semantics.
///
/// Minimum-time-between-kills is not checked here; the termination path
/// checks it immediately before killing, not when forming groups.
///
/// # Panics
///
/// Panics if the app is disabled. Callers must only pass enabled apps;
/// anything else is a programming error.
pub fn eligible_instance_groups(app: &App, cfg: &AppConfig) -> Vec<InstanceGroup> {
    assert!(
        cfg.enabled,
        "app {} unexpectedly disabled in eligible_instance_groups",
        app.name()
    );

    let groups: BTreeSet<GroupKey> = match (cfg.grouping, cfg.regions_are_independent) {
        (Grouping::App, true) => app_indep(app),
        (Grouping::App, false) => app_dep(app),
        (Grouping::Stack, true) => stack_indep(app),
        (Grouping::Stack, false) => stack_dep(app),
        (Grouping::Cluster, true) => cluster_indep(app),
        (Grouping::Cluster, false) => cluster_dep(app),
    };

    groups
        .into_iter()
        .map(|key| {
            InstanceGroup::new(
                app.name(),
                key.account,
                key.region.unwrap_or_default(),
                key.stack.unwrap_or_default(),
                key.cluster.unwrap_or_default(),
            )
        })
        .collect()
}

/// Ordered key used for set-deduplication of groups.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct GroupKey {
    account: String,
    region: Option<String>,
    stack: Option<String>,
    cluster: Option<String>,
}

impl GroupKey {
    fn new(account: &str) -> Self {
        Self {
            account: account.to_string(),
            region: None,
            stack: None,
            cluster: None,
        }
    }

    fn region(mut self, region: &str) -> Self {
        self.region = Some(region.to_string());
        self
    }

    fn stack(mut self, stack: String) -> Self {
        self.stack = Some(stack);
        self
    }

    fn cluster(mut self, cluster: &str) -> Self {
        self.cluster = Some(cluster.to_string());
        self
    }
}

/// One group per (account, region) pair present in the deployment.
fn app_indep(app: &App) -> BTreeSet<GroupKey> {
    app.accounts()
        .iter()
        .flat_map(|account| {
            account
                .region_names()
                .into_iter()
                .map(|region| GroupKey::new(account.name()).region(&region))
        })
        .collect()
}

/// One group per account, spanning regions.
fn app_dep(app: &App) -> BTreeSet<GroupKey> {
    app.accounts()
        .iter()
        .map(|account| GroupKey::new(account.name()))
        .collect()
}

/// One group per distinct (account, stack, region) triple.
fn stack_indep(app: &App) -> BTreeSet<GroupKey> {
    let mut set = BTreeSet::new();
    for account in app.accounts() {
        for cluster in account.clusters() {
            let stack = cluster.stack_name();
            for region in cluster.region_names() {
                set.insert(
                    GroupKey::new(account.name())
                        .region(&region)
                        .stack(stack.clone()),
                );
            }
        }
    }
    set
}

/// One group per distinct (account, stack) pair.
fn stack_dep(app: &App) -> BTreeSet<GroupKey> {
    app.accounts()
        .iter()
        .flat_map(|account| {
            account
                .stack_names()
                .into_iter()
                .map(|stack| GroupKey::new(account.name()).stack(stack))
        })
        .collect()
}

/// One group per (account, cluster, region) triple.
fn cluster_indep(app: &App) -> BTreeSet<GroupKey> {
    let mut set = BTreeSet::new();
    for account in app.accounts() {
        for cluster in account.clusters() {
            for region in cluster.region_names() {
                set.insert(
                    GroupKey::new(account.name())
                        .region(&region)
                        .cluster(cluster.name()),
                );
            }
        }
    }
    set
}

/// One group per (account, cluster) pair.
fn cluster_dep(app: &App) -> BTreeSet<GroupKey> {
    app.accounts()
        .iter()
        .flat_map(|account| {
            account
                .clusters()
                .iter()
                .map(|cluster| GroupKey::new(account.name()).cluster(cluster.name()))
        })
        .collect()
}
