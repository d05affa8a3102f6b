use async_trait::async_trait;
use remedy_core::{ExecutionOutcome, Issue, RemediationAction};

use crate::error::DependencyError;

/// Performs the real side effect of a remediation action (scaling,
/// restarting, rolling back, toggling a breaker on a downstream API).
///
/// The engine never retries inside an executor; it wraps every call in the
/// dependency guard, so implementations should report transient failures with
/// a retryable [`DependencyError`] and return promptly.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Label used in logs.
    fn name(&self) -> &str;

    /// Run the action against the issue.
    async fn execute(
        &self,
        action: &RemediationAction,
        issue: &Issue,
    ) -> Result<ExecutionOutcome, DependencyError>;

    /// Undo a previously successful execution.
    async fn rollback(
        &self,
        action: &RemediationAction,
        _issue: &Issue,
        _previous: &ExecutionOutcome,
    ) -> Result<ExecutionOutcome, DependencyError> {
        Err(DependencyError::Unsupported(format!(
            "{} cannot roll back {}",
            self.name(),
            action.name
        )))
    }
}
