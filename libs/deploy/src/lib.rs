//! Deployment inventory model for havoc.
//!
//! This library describes how deployed instances are organized:
//! App → Account → Cluster → ASG → Instance, a read-only ownership
//! hierarchy pulled from the inventory provider for the duration of one
//! decision. It also holds the grouping model that divides an app's
//! deployment into termination domains.
//!
//! # Invariants
//!
//! - The tree is immutable once built; decisions never mutate it.
//! - An instance belongs to exactly one ASG, which belongs to exactly one
//!   (cluster, region) pair within one account.

pub mod grouping;
pub mod provider;
pub mod tree;

pub use grouping::eligible_instance_groups;
pub use provider::{DeployError, Deployment};
pub use tree::{Account, AccountInfo, App, AppMap, Asg, Cluster, ClusterMap};
