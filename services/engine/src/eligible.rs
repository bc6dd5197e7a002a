//! Selects the instances eligible for termination within a group.
//!
//! The pipeline walks the app's ASGs and filters:
//! - ASGs outside the target group
//! - ASGs not covered by the allow-list, when one is configured
//! - ASGs opted out by a policy exception
//! - canary clusters, which are synthetic and never fair game
//!
//! What survives is flattened into instances with full coordinates.

use havoc_deploy::App;
use havoc_model::{Exception, Instance, InstanceGroup};
use tracing::debug;

/// Cluster name suffixes used by canary analysis tooling. Instances in
/// these clusters are excluded regardless of policy.
const CANARY_SUFFIXES: [&str; 4] = ["-canary", "-baseline", "-citrus", "-citrusproxy"];

/// Returns the instances of `app` that fall within `group` and are not
/// excluded by the allow-list, `exceptions`, or canary naming.
///
/// `whitelist` is the deprecated allow-list; `None` passes everything
/// through. The orchestrator refuses to kill for apps that still use
/// one, so this stage only matters for read-only eligibility queries.
pub fn instances(
    group: &InstanceGroup,
    exceptions: &[Exception],
    whitelist: Option<&[Exception]>,
    app: &App,
) -> Vec<Instance> {
    app.asgs()
        .filter(|asg| group.contains(asg.account_name(), asg.region_name(), asg.cluster_name()))
        .filter(|asg| {
            let Some(allowed) = whitelist else {
                return true;
            };
            allowed.iter().any(|entry| {
                entry.matches(
                    asg.account_name(),
                    &asg.stack_name(),
                    &asg.detail_name(),
                    asg.region_name(),
                )
            })
        })
        .filter(|asg| {
            let excluded = exceptions.iter().any(|ex| {
                ex.matches(
                    asg.account_name(),
                    &asg.stack_name(),
                    &asg.detail_name(),
                    asg.region_name(),
                )
            });
            if excluded {
                debug!(asg = %asg.name(), "excluded by exception");
            }
            !excluded
        })
        .filter(|asg| !is_canary_cluster(asg.cluster_name()))
        .flat_map(|asg| asg.instances())
        .collect()
}

fn is_canary_cluster(cluster: &str) -> bool {
    CANARY_SUFFIXES
        .iter()
        .any(|suffix| cluster.ends_with(suffix))
}
