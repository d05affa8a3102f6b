use thiserror::Error;

use crate::request::RequestState;

/// Errors raised while building or validating core domain values.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An ingested issue is missing required fields.
    #[error("invalid issue: {0}")]
    InvalidIssue(String),

    /// An action's parameter map does not match the shape its name requires.
    #[error("invalid parameters for action {action}: {reason}")]
    InvalidParameters { action: String, reason: String },

    /// The policy document is inconsistent.
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    /// A remediation request attempted a non-monotonic state change.
    #[error("invalid request transition from {from} to {to}")]
    InvalidTransition {
        from: RequestState,
        to: RequestState,
    },
}
