//! The read-only query interface over the deployment inventory.

use async_trait::async_trait;
use thiserror::Error;

use crate::tree::App;

/// Errors from the deployment inventory provider.
#[derive(Debug, Error)]
pub enum DeployError {
    /// The named app does not exist in the inventory.
    #[error("app not found: {0}")]
    AppNotFound(String),

    /// A name in the inventory does not follow the naming convention.
    #[error(transparent)]
    Name(#[from] havoc_model::NameError),

    /// The provider call itself failed (network, decode, upstream error).
    #[error("deployment provider error: {0}")]
    Provider(String),
}

/// Read-only queries over the deployment inventory.
///
/// Implementations must not cache across decisions: each call reflects the
/// inventory at query time.
#[async_trait]
pub trait Deployment: Send + Sync {
    /// Retrieve the full deployment tree for one app.
    async fn get_app(&self, name: &str) -> Result<App, DeployError>;

    /// The names of all apps known to the inventory.
    async fn app_names(&self) -> Result<Vec<String>, DeployError>;

    /// The cluster names for an app in one account.
    async fn get_cluster_names(&self, app: &str, account: &str)
        -> Result<Vec<String>, DeployError>;

    /// The regions a cluster runs in.
    async fn get_region_names(
        &self,
        app: &str,
        account: &str,
        cluster: &str,
    ) -> Result<Vec<String>, DeployError>;

    /// The active ASG of a cluster in one region, and its instance ids.
    async fn get_instance_ids(
        &self,
        app: &str,
        account: &str,
        cloud_provider: &str,
        region: &str,
        cluster: &str,
    ) -> Result<(String, Vec<String>), DeployError>;

    /// The cloud provider backing an account (e.g. "aws").
    async fn cloud_provider(&self, account: &str) -> Result<String, DeployError>;
}
