//! The App → Account → Cluster → ASG ownership hierarchy.

use std::collections::{BTreeMap, BTreeSet};

use havoc_model::{naming, Instance};

/// Maps cluster name → region name → ASG name → instance ids.
pub type ClusterMap = BTreeMap<String, BTreeMap<String, BTreeMap<String, Vec<String>>>>;

/// Per-account inventory: the cloud provider and the clusters running there.
#[derive(Debug, Clone, Default)]
pub struct AccountInfo {
    pub cloud_provider: String,
    pub clusters: ClusterMap,
}

/// Maps account name → account inventory.
pub type AppMap = BTreeMap<String, AccountInfo>;

/// An application's deployment across accounts.
#[derive(Debug, Clone)]
pub struct App {
    name: String,
    accounts: Vec<Account>,
}

/// The clusters an app runs in one cloud account (e.g. "prod", "test").
#[derive(Debug, Clone)]
pub struct Account {
    name: String,
    cloud_provider: String,
    clusters: Vec<Cluster>,
}

/// A named set of ASGs following the `app-stack-detail` convention.
/// Clusters can span regions.
#[derive(Debug, Clone)]
pub struct Cluster {
    name: String,
    asgs: Vec<Asg>,
}

/// An autoscaling group and its member instance ids.
///
/// Coordinates are denormalized at construction so an ASG can be examined
/// without walking back up the tree.
#[derive(Debug, Clone)]
pub struct Asg {
    name: String,
    region: String,
    instance_ids: Vec<String>,
    app: String,
    account: String,
    cluster: String,
    cloud_provider: String,
}

impl App {
    /// Build the ownership tree from the nested inventory map.
    pub fn new(name: impl Into<String>, data: AppMap) -> Self {
        let name = name.into();
        let mut accounts = Vec::new();

        for (account_name, info) in data {
            let mut clusters = Vec::new();
            for (cluster_name, regions) in info.clusters {
                let mut asgs = Vec::new();
                for (region_name, asg_map) in regions {
                    for (asg_name, instance_ids) in asg_map {
                        asgs.push(Asg {
                            name: asg_name,
                            region: region_name.clone(),
                            instance_ids,
                            app: name.clone(),
                            account: account_name.clone(),
                            cluster: cluster_name.clone(),
                            cloud_provider: info.cloud_provider.clone(),
                        });
                    }
                }
                clusters.push(Cluster {
                    name: cluster_name,
                    asgs,
                });
            }
            accounts.push(Account {
                name: account_name,
                cloud_provider: info.cloud_provider,
                clusters,
            });
        }

        Self { name, accounts }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    /// All ASGs across every account and cluster of this app.
    pub fn asgs(&self) -> impl Iterator<Item = &Asg> {
        self.accounts
            .iter()
            .flat_map(|account| account.clusters.iter())
            .flat_map(|cluster| cluster.asgs.iter())
    }
}

impl Account {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cloud_provider(&self) -> &str {
        &self.cloud_provider
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// The distinct regions that clusters in this account run in.
    pub fn region_names(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self
            .clusters
            .iter()
            .flat_map(|cluster| cluster.asgs.iter())
            .map(|asg| asg.region.as_str())
            .collect();
        set.into_iter().map(String::from).collect()
    }

    /// The distinct stacks across clusters in this account.
    pub fn stack_names(&self) -> Vec<String> {
        let set: BTreeSet<String> = self
            .clusters
            .iter()
            .map(|cluster| cluster.stack_name())
            .collect();
        set.into_iter().collect()
    }
}

impl Cluster {
    /// The full cluster name, convention: `app-stack-detail`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn asgs(&self) -> &[Asg] {
        &self.asgs
    }

    /// The stack component of the cluster name.
    ///
    /// # Panics
    ///
    /// Panics if the cluster name does not follow the naming convention;
    /// a malformed name in the inventory is a configuration error.
    pub fn stack_name(&self) -> String {
        naming::parse(&self.name)
            .unwrap_or_else(|e| panic!("malformed cluster name {:?}: {e}", self.name))
            .stack
    }

    /// The distinct regions this cluster runs in.
    pub fn region_names(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self.asgs.iter().map(|asg| asg.region.as_str()).collect();
        set.into_iter().map(String::from).collect()
    }
}

impl Asg {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn app_name(&self) -> &str {
        &self.app
    }

    pub fn account_name(&self) -> &str {
        &self.account
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster
    }

    pub fn region_name(&self) -> &str {
        &self.region
    }

    pub fn cloud_provider(&self) -> &str {
        &self.cloud_provider
    }

    pub fn is_empty(&self) -> bool {
        self.instance_ids.is_empty()
    }

    /// The stack component of the owning cluster's name.
    pub fn stack_name(&self) -> String {
        naming::parse(&self.cluster)
            .unwrap_or_else(|e| panic!("malformed cluster name {:?}: {e}", self.cluster))
            .stack
    }

    /// The detail component of the ASG name.
    ///
    /// ASGs launched before the deployment system existed may be missing the
    /// `-vNNN` push number. When the ASG name equals the cluster name the
    /// push number is absent, and we must not mistake a detail that happens
    /// to look like a push number (e.g. `v005`) for one.
    pub fn detail_name(&self) -> String {
        let base = if self.name == self.cluster {
            self.name.as_str()
        } else {
            naming::strip_push_number(&self.name)
        };
        naming::parse(base)
            .unwrap_or_else(|e| panic!("malformed ASG name {:?}: {e}", self.name))
            .detail
    }

    /// Expand this ASG into its member instances with full coordinates.
    pub fn instances(&self) -> Vec<Instance> {
        self.instance_ids
            .iter()
            .map(|id| Instance {
                app: self.app.clone(),
                account: self.account.clone(),
                region: self.region.clone(),
                stack: self.stack_name(),
                cluster: self.cluster.clone(),
                asg: self.name.clone(),
                id: id.clone(),
                cloud_provider: self.cloud_provider.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_app() -> App {
        let mut clusters: ClusterMap = BTreeMap::new();
        clusters.insert(
            "abc-staging-a".into(),
            BTreeMap::from([(
                "us-east-1".into(),
                BTreeMap::from([(
                    "abc-staging-a-v003".into(),
                    vec!["i-11111111".into(), "i-22222222".into()],
                )]),
            )]),
        );
        clusters.insert(
            "abc-prod".into(),
            BTreeMap::from([
                (
                    "us-east-1".into(),
                    BTreeMap::from([("abc-prod-v017".into(), vec!["i-33333333".into()])]),
                ),
                (
                    "us-west-2".into(),
                    BTreeMap::from([("abc-prod-v017".into(), vec!["i-44444444".into()])]),
                ),
            ]),
        );

        let mut data: AppMap = BTreeMap::new();
        data.insert(
            "prod".into(),
            AccountInfo {
                cloud_provider: "aws".into(),
                clusters,
            },
        );
        App::new("abc", data)
    }

    #[test]
    fn test_tree_shape() {
        let app = sample_app();
        assert_eq!(app.name(), "abc");
        assert_eq!(app.accounts().len(), 1);
        assert_eq!(app.accounts()[0].clusters().len(), 2);
        assert_eq!(app.asgs().count(), 3);
    }

    #[test]
    fn test_region_and_stack_names() {
        let app = sample_app();
        let account = &app.accounts()[0];
        assert_eq!(account.region_names(), vec!["us-east-1", "us-west-2"]);
        assert_eq!(account.stack_names(), vec!["prod", "staging"]);
    }

    #[test]
    fn test_asg_coordinates() {
        let app = sample_app();
        let asg = app
            .asgs()
            .find(|asg| asg.name() == "abc-staging-a-v003")
            .unwrap();
        assert_eq!(asg.app_name(), "abc");
        assert_eq!(asg.account_name(), "prod");
        assert_eq!(asg.cluster_name(), "abc-staging-a");
        assert_eq!(asg.stack_name(), "staging");
        assert_eq!(asg.detail_name(), "a");
        assert_eq!(asg.cloud_provider(), "aws");
    }

    #[test]
    fn test_detail_without_push_number() {
        let mut data: AppMap = BTreeMap::new();
        data.insert(
            "prod".into(),
            AccountInfo {
                cloud_provider: "aws".into(),
                clusters: BTreeMap::from([(
                    "abc-staging-v005".into(),
                    BTreeMap::from([(
                        "us-east-1".into(),
                        BTreeMap::from([("abc-staging-v005".into(), vec!["i-1".into()])]),
                    )]),
                )]),
            },
        );
        let app = App::new("abc", data);
        let asg = app.asgs().next().unwrap();
        // ASG name equals cluster name: the v005 detail is not a push number
        assert_eq!(asg.detail_name(), "v005");
    }

    #[test]
    fn test_instances_carry_full_coordinates() {
        let app = sample_app();
        let asg = app
            .asgs()
            .find(|asg| asg.name() == "abc-staging-a-v003")
            .unwrap();
        let instances = asg.instances();
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].stack, "staging");
        assert_eq!(instances[0].asg, "abc-staging-a-v003");
        assert_eq!(instances[0].cloud_provider, "aws");
    }
}
