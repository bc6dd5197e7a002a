//! Cluster and ASG naming convention.
//!
//! Cluster names follow the `app[-stack[-detail]]` convention; ASG names
//! additionally carry a `-vNNN` push number suffix. The stack and detail
//! components may be empty (`app--detail` is a valid name with an empty
//! stack).

use thiserror::Error;

/// Errors from parsing a cluster or ASG name.
#[derive(Debug, Error)]
pub enum NameError {
    /// The name is empty or has an empty app component.
    #[error("invalid cluster name: {0:?}")]
    Invalid(String),
}

/// The decomposed components of a cluster name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Names {
    pub app: String,
    pub stack: String,
    pub detail: String,
}

/// Parse a cluster name into its `app-stack-detail` components.
///
/// The detail component may itself contain dashes, so everything after the
/// second dash belongs to the detail.
pub fn parse(cluster: &str) -> Result<Names, NameError> {
    let mut parts = cluster.splitn(3, '-');

    let app = match parts.next() {
        Some(app) if !app.is_empty() => app.to_string(),
        _ => return Err(NameError::Invalid(cluster.to_string())),
    };
    let stack = parts.next().unwrap_or("").to_string();
    let detail = parts.next().unwrap_or("").to_string();

    Ok(Names { app, stack, detail })
}

/// Strip a trailing `-vNNN` push number from an ASG name, if present.
pub fn strip_push_number(asg: &str) -> &str {
    if let Some(idx) = asg.rfind("-v") {
        let digits = &asg[idx + 2..];
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return &asg[..idx];
        }
    }
    asg
}
