use std::time::Duration;

use remedy_provider::DependencyError;
use thiserror::Error;

/// Errors raised while talking to a webhook endpoint.
///
/// Converted into [`DependencyError`] at the trait boundary so the
/// dependency guard can tell transient failures from permanent ones.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("HMAC signing error: {0}")]
    SigningError(String),

    /// The channel has no URL to post to.
    #[error("missing webhook url for {0}")]
    MissingUrl(String),
}

impl From<WebhookError> for DependencyError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::Http(e) => DependencyError::Connection(e.to_string()),
            WebhookError::Timeout(after) => DependencyError::Timeout(after),
            WebhookError::UnexpectedStatus { status, body } => {
                if status == 429 {
                    DependencyError::RateLimited
                } else if (500..600).contains(&status) {
                    DependencyError::Connection(format!("HTTP {status}: {body}"))
                } else {
                    DependencyError::ExecutionFailed(format!("HTTP {status}: {body}"))
                }
            }
            WebhookError::InvalidPayload(msg) => DependencyError::Serialization(msg),
            WebhookError::SigningError(msg) => DependencyError::Configuration(msg),
            WebhookError::MissingUrl(target) => {
                DependencyError::Configuration(format!("missing webhook url for {target}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16) -> DependencyError {
        WebhookError::UnexpectedStatus {
            status,
            body: "body".into(),
        }
        .into()
    }

    #[test]
    fn too_many_requests_is_retryable() {
        let err = status(429);
        assert!(matches!(err, DependencyError::RateLimited));
        assert!(err.is_retryable());
    }

    #[test]
    fn server_errors_are_retryable() {
        let err = status(503);
        assert!(matches!(err, DependencyError::Connection(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn client_errors_are_permanent() {
        let err = status(400);
        assert!(matches!(err, DependencyError::ExecutionFailed(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn timeout_keeps_duration() {
        let err: DependencyError = WebhookError::Timeout(Duration::from_secs(3)).into();
        assert!(matches!(err, DependencyError::Timeout(d) if d == Duration::from_secs(3)));
    }

    #[test]
    fn configuration_problems_are_permanent() {
        let err: DependencyError = WebhookError::MissingUrl("ops-slack".into()).into();
        assert!(!err.is_retryable());
        let err: DependencyError = WebhookError::SigningError("bad key".into()).into();
        assert!(matches!(err, DependencyError::Configuration(_)));
    }

    #[test]
    fn display() {
        let err = WebhookError::UnexpectedStatus {
            status: 502,
            body: "bad gateway".into(),
        };
        assert_eq!(err.to_string(), "unexpected status 502: bad gateway");
        assert_eq!(
            WebhookError::MissingUrl("pager".into()).to_string(),
            "missing webhook url for pager"
        );
    }
}
