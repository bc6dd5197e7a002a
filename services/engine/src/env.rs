//! The environment havoc has been deployed to.
//!
//! The prod deployment is responsible for killing instances across
//! environments, including test. A test deployment must never do real
//! harm, which is why the orchestrator refuses to run unleashed when
//! `in_test` is true.

use serde::Deserialize;

/// Deployed environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnv {
    Prod,
    Test,
}

impl RuntimeEnv {
    /// True if havoc is running in a test environment.
    pub fn in_test(self) -> bool {
        self == RuntimeEnv::Test
    }
}
