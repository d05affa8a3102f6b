use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while driving remediation requests.
///
/// Policy non-admissions (dedup, rate limit, denied approvals) are outcomes,
/// not errors; they are reported through [`RemediationReport`](crate::RemediationReport).
#[derive(Debug, Error)]
pub enum EngineError {
    /// A domain rule was violated.
    #[error("core error: {0}")]
    Core(#[from] remedy_core::CoreError),

    /// The audit sink failed outside the remediation path (queries).
    #[error("audit error: {0}")]
    Audit(#[from] remedy_audit::AuditError),

    /// The engine was misconfigured (invalid policy, missing components).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No approval record exists for the request.
    #[error("approval not found: {0}")]
    ApprovalNotFound(Uuid),

    /// A decision other than approve/reject was submitted.
    #[error("invalid decision: {0}")]
    InvalidDecision(String),

    /// No tracked request has this id.
    #[error("request not found: {0}")]
    RequestNotFound(Uuid),

    /// The request is not in a state that allows a rollback.
    #[error("rollback not allowed: {0}")]
    RollbackNotAllowed(String),
}
