//! Domain types for the havoc termination decision engine.
//!
//! This library holds the vocabulary shared by the deployment model, the
//! scheduler, and the termination path:
//!
//! - **InstanceGroup**: the unit of "one random kill per day".
//! - **Exception**: opt-out rules with `"*"` wildcards.
//! - **AppConfig**: per-app termination policy.
//! - **Termination**: a concrete (instance, time, leashed) proposal.
//!
//! Everything here is plain data; the decision logic lives in
//! `havoc-deploy` and `havoc-engine`.

pub mod cal;
pub mod config;
pub mod exception;
pub mod group;
pub mod naming;
pub mod termination;

pub use config::{AppConfig, Grouping};
pub use exception::Exception;
pub use group::InstanceGroup;
pub use naming::{NameError, Names};
pub use termination::{Instance, MinTimeViolation, Termination};
