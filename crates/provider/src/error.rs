use std::time::Duration;

use thiserror::Error;

/// Failure reported by an executor or a notification channel.
///
/// The dependency guard retries and counts only the transient variants; see
/// [`is_retryable`](Self::is_retryable).
#[derive(Debug, Error)]
pub enum DependencyError {
    /// Nothing is registered to handle the action or channel.
    #[error("no dependency registered for {0}")]
    NotFound(String),

    /// The remediation ran and the target reported failure.
    #[error("remediation failed: {0}")]
    ExecutionFailed(String),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// The target could not be reached.
    #[error("unreachable: {0}")]
    Connection(String),

    #[error("misconfigured: {0}")]
    Configuration(String),

    /// The target asked us to back off.
    #[error("throttled by dependency")]
    RateLimited,

    #[error("bad payload: {0}")]
    Serialization(String),

    /// E.g. rollback on an executor that cannot undo its work.
    #[error("not supported: {0}")]
    Unsupported(String),
}

impl DependencyError {
    /// Transient failures: timeouts, unreachable targets, and throttling.
    /// Everything else fails the call immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Connection(_) | Self::RateLimited
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_failures_retry() {
        let transient = [
            DependencyError::Timeout(Duration::from_secs(5)),
            DependencyError::Connection("connection refused".into()),
            DependencyError::RateLimited,
        ];
        assert!(transient.iter().all(DependencyError::is_retryable));

        let permanent = [
            DependencyError::NotFound("restart_pod".into()),
            DependencyError::ExecutionFailed("deployment not found".into()),
            DependencyError::Configuration("missing url".into()),
            DependencyError::Serialization("eof".into()),
            DependencyError::Unsupported("rollback".into()),
        ];
        assert!(!permanent.iter().any(DependencyError::is_retryable));
    }

    #[test]
    fn messages_name_the_target() {
        assert_eq!(
            DependencyError::NotFound("restart_pod".into()).to_string(),
            "no dependency registered for restart_pod"
        );
        assert_eq!(
            DependencyError::Timeout(Duration::from_millis(500)).to_string(),
            "no response within 500ms"
        );
    }
}
