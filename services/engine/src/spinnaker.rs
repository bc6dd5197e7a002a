//! Spinnaker API client.
//!
//! Spinnaker plays three roles here: it is the deployment inventory,
//! the source of per-app chaos policy (stored as application attributes),
//! and the arm that actually terminates instances via a
//! `terminateInstances` task.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use havoc_deploy::{AccountInfo, App, AppMap, ClusterMap, DeployError, Deployment};
use havoc_model::{AppConfig, Exception, Grouping, Termination};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::config::SpinnakerConfig;
use crate::deps::{AppConfigGetter, ConfigGetError};
use crate::killer::{KillError, Terminator};

/// Client for the Spinnaker gate API.
#[derive(Clone)]
pub struct SpinnakerClient {
    endpoint: String,
    client: reqwest::Client,
    user: String,
}

#[derive(Deserialize)]
struct NamedItem {
    name: String,
}

#[derive(Deserialize)]
struct ServerGroup {
    name: String,
    region: String,
    #[serde(default)]
    disabled: bool,
    #[serde(default)]
    instances: Vec<NamedItem>,
}

#[derive(Deserialize)]
struct Credentials {
    #[serde(rename = "cloudProvider")]
    cloud_provider: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct AppDetails {
    #[serde(default)]
    attributes: AppAttributes,
    #[serde(default)]
    clusters: BTreeMap<String, Vec<NamedItem>>,
}

#[derive(Deserialize, Default)]
struct AppAttributes {
    #[serde(rename = "chaosMonkey")]
    chaos_policy: Option<ChaosPolicy>,
}

/// Per-app chaos policy as stored in Spinnaker application attributes.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChaosPolicy {
    enabled: bool,
    regions_are_independent: bool,
    mean_time_between_kills_in_work_days: u32,
    min_time_between_kills_in_work_days: u32,
    grouping: Grouping,
    #[serde(default)]
    exceptions: Vec<Exception>,
    #[serde(default)]
    whitelist: Option<Vec<Exception>>,
}

impl From<ChaosPolicy> for AppConfig {
    fn from(policy: ChaosPolicy) -> Self {
        AppConfig {
            enabled: policy.enabled,
            regions_are_independent: policy.regions_are_independent,
            mean_time_between_kills_in_work_days: policy.mean_time_between_kills_in_work_days,
            min_time_between_kills_in_work_days: policy.min_time_between_kills_in_work_days,
            grouping: policy.grouping,
            exceptions: policy.exceptions,
            whitelist: policy.whitelist,
        }
    }
}

impl SpinnakerClient {
    /// Build a client from the engine's Spinnaker settings.
    pub fn new(cfg: &SpinnakerConfig) -> Result<Self, DeployError> {
        if cfg.endpoint.is_empty() {
            return Err(DeployError::Provider(
                "no spinnaker endpoint configured".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DeployError::Provider(e.to_string()))?;
        Ok(Self {
            endpoint: cfg.endpoint.trim_end_matches('/').to_string(),
            client,
            user: cfg.user.clone(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, DeployError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DeployError::Provider(format!("http get failed at {url}: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DeployError::Provider(format!(
                "unexpected response code ({status}) from {url}"
            )));
        }
        resp.json()
            .await
            .map_err(|e| DeployError::Provider(format!("failed to parse json from {url}: {e}")))
    }

    async fn app_details(&self, app: &str) -> Result<AppDetails, DeployError> {
        self.get_json(&format!("{}/applications/{app}", self.endpoint))
            .await
    }

    /// Account-name → cluster-names map for an app.
    async fn clusters(&self, app: &str) -> Result<BTreeMap<String, Vec<String>>, DeployError> {
        self.get_json(&format!("{}/applications/{app}/clusters", self.endpoint))
            .await
    }

    /// All server groups of one cluster, including disabled ones.
    async fn server_groups(
        &self,
        app: &str,
        account: &str,
        cluster: &str,
    ) -> Result<Vec<ServerGroup>, DeployError> {
        self.get_json(&format!(
            "{}/applications/{app}/clusters/{account}/{cluster}/serverGroups",
            self.endpoint
        ))
        .await
    }
}

#[async_trait]
impl Deployment for SpinnakerClient {
    async fn get_app(&self, name: &str) -> Result<App, DeployError> {
        let mut data = AppMap::new();
        for (account, cluster_names) in self.clusters(name).await? {
            let cloud_provider = self.cloud_provider(&account).await?;
            let mut clusters = ClusterMap::new();

            for cluster_name in cluster_names {
                let groups = match self.server_groups(name, &account, &cluster_name).await {
                    Ok(groups) => groups,
                    Err(e) => {
                        warn!(
                            app = %name, account = %account, cluster = %cluster_name,
                            error = %e, "could not retrieve server groups"
                        );
                        continue;
                    }
                };

                let regions = clusters.entry(cluster_name).or_default();
                for group in groups {
                    // disabled ASGs take no traffic and are not fair game
                    if group.disabled {
                        warn!(app = %name, asg = %group.name, "skipping disabled server group");
                        continue;
                    }
                    regions.entry(group.region).or_default().insert(
                        group.name,
                        group.instances.into_iter().map(|i| i.name).collect(),
                    );
                }
            }

            data.insert(
                account,
                AccountInfo {
                    cloud_provider,
                    clusters,
                },
            );
        }
        Ok(App::new(name, data))
    }

    async fn app_names(&self) -> Result<Vec<String>, DeployError> {
        let apps: Vec<NamedItem> = self
            .get_json(&format!("{}/applications", self.endpoint))
            .await?;
        Ok(apps.into_iter().map(|app| app.name).collect())
    }

    async fn get_cluster_names(
        &self,
        app: &str,
        account: &str,
    ) -> Result<Vec<String>, DeployError> {
        let details = self.app_details(app).await?;
        Ok(details
            .clusters
            .get(account)
            .map(|clusters| clusters.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default())
    }

    async fn get_region_names(
        &self,
        app: &str,
        account: &str,
        cluster: &str,
    ) -> Result<Vec<String>, DeployError> {
        let groups = self.server_groups(app, account, cluster).await?;
        let mut regions: Vec<String> = groups.into_iter().map(|g| g.region).collect();
        regions.sort_unstable();
        regions.dedup();
        Ok(regions)
    }

    async fn get_instance_ids(
        &self,
        app: &str,
        account: &str,
        cloud_provider: &str,
        region: &str,
        cluster: &str,
    ) -> Result<(String, Vec<String>), DeployError> {
        let url = format!(
            "{}/applications/{app}/clusters/{account}/{cluster}/{cloud_provider}/{region}\
             /serverGroups/target/current_asg_dynamic?onlyEnabled=true",
            self.endpoint
        );
        let group: ServerGroup = self.get_json(&url).await?;
        Ok((
            group.name,
            group.instances.into_iter().map(|i| i.name).collect(),
        ))
    }

    async fn cloud_provider(&self, account: &str) -> Result<String, DeployError> {
        let url = format!("{}/credentials/{account}", self.endpoint);
        let creds: Credentials = self.get_json(&url).await?;
        if let Some(error) = creds.error {
            return Err(DeployError::Provider(error));
        }
        creds
            .cloud_provider
            .ok_or_else(|| DeployError::Provider(format!("no cloudProvider field from {url}")))
    }
}

#[async_trait]
impl AppConfigGetter for SpinnakerClient {
    async fn get(&self, app: &str) -> Result<AppConfig, ConfigGetError> {
        let details = self.app_details(app).await.map_err(|e| ConfigGetError {
            app: app.to_string(),
            message: e.to_string(),
        })?;
        let policy = details.attributes.chaos_policy.ok_or_else(|| ConfigGetError {
            app: app.to_string(),
            message: "app has no chaos policy attribute".to_string(),
        })?;
        Ok(policy.into())
    }
}

#[async_trait]
impl Terminator for SpinnakerClient {
    async fn execute(&self, term: &Termination) -> Result<(), KillError> {
        let instance = &term.instance;
        let url = format!("{}/applications/{}/tasks", self.endpoint, instance.app);
        let body = json!({
            "application": instance.app,
            "description": format!("Terminate instance {}", instance.id),
            "job": [{
                "type": "terminateInstances",
                "instanceIds": [instance.id],
                "credentials": instance.account,
                "cloudProvider": instance.cloud_provider,
                "region": instance.region,
                "serverGroupName": instance.asg,
                "user": self.user,
            }],
        });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| KillError(format!("task submission failed at {url}: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(KillError(format!(
                "unexpected response code ({status}) from {url}"
            )));
        }

        info!(instance_id = %instance.id, "termination task submitted");
        Ok(())
    }
}
