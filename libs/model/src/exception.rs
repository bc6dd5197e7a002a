//! Opt-out rules that exclude instances from termination.

use serde::{Deserialize, Serialize};

/// Wildcard value that matches anything in an exception field.
pub const WILDCARD: &str = "*";

/// An opt-out rule. A field set to `"*"` matches any value; that is the
/// only wildcard.
///
/// For example, this opts out every cluster in the test account:
/// `Exception { account: "test", stack: "*", detail: "*", region: "*" }`.
///
/// The same shape also backs the deprecated allow-list ("whitelist")
/// feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exception {
    pub account: String,
    pub stack: String,
    pub detail: String,
    pub region: String,
}

impl Exception {
    /// Returns true if the exception matches the given ASG coordinates.
    pub fn matches(&self, account: &str, stack: &str, detail: &str, region: &str) -> bool {
        field_matches(&self.account, account)
            && field_matches(&self.stack, stack)
            && field_matches(&self.detail, detail)
            && field_matches(&self.region, region)
    }
}

fn field_matches(field: &str, value: &str) -> bool {
    field == WILDCARD || field == value
}
