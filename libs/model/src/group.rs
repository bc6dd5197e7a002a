//! Instance groups: the unit of "one random termination per day".

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::naming;

/// A group of instances that the scheduler treats as one termination domain.
///
/// `region`, `stack`, and `cluster` are each either a concrete value or
/// `None`, meaning the group is cross-region, cross-stack, or cross-cluster.
/// Stack and cluster are mutually exclusive: a group may constrain by one of
/// them, never both.
///
/// Equality is structural: a cross-region group is never equal to a group
/// pinned to a region, even if only one region exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceGroup {
    pub app: String,
    pub account: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
}

impl InstanceGroup {
    /// Create an instance group. Empty strings mean "any".
    pub fn new(
        app: impl Into<String>,
        account: impl Into<String>,
        region: impl Into<String>,
        stack: impl Into<String>,
        cluster: impl Into<String>,
    ) -> Self {
        fn opt(s: String) -> Option<String> {
            if s.is_empty() {
                None
            } else {
                Some(s)
            }
        }

        Self {
            app: app.into(),
            account: account.into(),
            region: opt(region.into()),
            stack: opt(stack.into()),
            cluster: opt(cluster.into()),
        }
    }

    /// True if the group matches any region.
    pub fn any_region(&self) -> bool {
        self.region.is_none()
    }

    /// True if the group matches any stack.
    pub fn any_stack(&self) -> bool {
        self.stack.is_none()
    }

    /// True if the group matches any cluster.
    pub fn any_cluster(&self) -> bool {
        self.cluster.is_none()
    }

    /// Returns true if an ASG identified by (account, region, cluster name)
    /// falls within this group.
    ///
    /// The cluster name is decomposed with the `app-stack-detail` naming
    /// convention; a cluster name that fails to parse matches nothing.
    pub fn contains(&self, account: &str, region: &str, cluster: &str) -> bool {
        let names = match naming::parse(cluster) {
            Ok(names) => names,
            Err(_) => {
                tracing::warn!(cluster = %cluster, "could not parse cluster name");
                return false;
            }
        };

        names.app == self.app
            && account == self.account
            && self.region.as_deref().is_none_or(|r| r == region)
            && self.stack.as_deref().is_none_or(|s| s == names.stack)
            && self.cluster.as_deref().is_none_or(|c| c == cluster)
    }
}

impl fmt::Display for InstanceGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "app={} account={}", self.app, self.account)?;
        if let Some(region) = &self.region {
            write!(f, " region={region}")?;
        }
        if let Some(stack) = &self.stack {
            write!(f, " stack={stack}")?;
        }
        if let Some(cluster) = &self.cluster {
            write!(f, " cluster={cluster}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_fields_are_wildcards() {
        let group = InstanceGroup::new("abc", "prod", "", "", "");
        assert!(group.any_region());
        assert!(group.any_stack());
        assert!(group.any_cluster());
    }

    #[test]
    fn test_equality_treats_wildcard_as_distinct() {
        let pinned = InstanceGroup::new("abc", "prod", "us-east-1", "", "");
        let cross = InstanceGroup::new("abc", "prod", "", "", "");
        assert_ne!(pinned, cross);
        assert_eq!(pinned, pinned.clone());
    }

    #[test]
    fn test_contains_wildcards() {
        let group = InstanceGroup::new("abc", "prod", "", "", "");
        assert!(group.contains("prod", "us-east-1", "abc-staging-a"));
        assert!(group.contains("prod", "us-west-2", "abc"));
        assert!(!group.contains("test", "us-east-1", "abc-staging-a"));
        assert!(!group.contains("prod", "us-east-1", "def-staging-a"));
    }

    #[test]
    fn test_contains_pinned_stack() {
        let group = InstanceGroup::new("abc", "prod", "us-east-1", "staging", "");
        assert!(group.contains("prod", "us-east-1", "abc-staging-a"));
        assert!(!group.contains("prod", "us-east-1", "abc-prod-a"));
        assert!(!group.contains("prod", "us-west-2", "abc-staging-a"));
    }

    #[test]
    fn test_contains_pinned_cluster() {
        let group = InstanceGroup::new("abc", "prod", "", "", "abc-staging-a");
        assert!(group.contains("prod", "eu-west-1", "abc-staging-a"));
        assert!(!group.contains("prod", "eu-west-1", "abc-staging-b"));
    }

    #[test]
    fn test_contains_rejects_unparseable_cluster() {
        let group = InstanceGroup::new("abc", "prod", "", "", "");
        assert!(!group.contains("prod", "us-east-1", ""));
    }

    #[test]
    fn test_display() {
        let group = InstanceGroup::new("abc", "prod", "us-east-1", "staging", "");
        assert_eq!(group.to_string(), "app=abc account=prod region=us-east-1 stack=staging");
    }
}
