use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::action::ActionConfig;
use crate::channel::NotificationChannel;
use crate::error::CoreError;

/// The policy document: dedup, rate limiting, resilience settings,
/// remediation actions, and notification channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    #[serde(default = "default_dedupe_window")]
    pub dedupe_window_seconds: u64,
    /// Tokens per bucket per interval, for the global and per-action buckets.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,
    #[serde(default = "default_rate_limit_interval")]
    pub rate_limit_interval_seconds: u64,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,
    /// Approval deadline used when no channel is configured.
    #[serde(default = "default_approval_timeout")]
    pub approval_timeout_seconds: u64,
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
    #[serde(default)]
    pub channels: Vec<NotificationChannel>,
}

fn default_dedupe_window() -> u64 {
    300
}

fn default_rate_limit() -> u32 {
    10
}

fn default_rate_limit_interval() -> u64 {
    60
}

fn default_approval_timeout() -> u64 {
    1800
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            dedupe_window_seconds: default_dedupe_window(),
            rate_limit: default_rate_limit(),
            rate_limit_interval_seconds: default_rate_limit_interval(),
            retry: RetrySettings::default(),
            circuit_breaker: CircuitBreakerSettings::default(),
            approval_timeout_seconds: default_approval_timeout(),
            actions: Vec::new(),
            channels: Vec::new(),
        }
    }
}

impl PolicyConfig {
    /// Check the scalar settings. Actions and channels are validated when
    /// the catalog is built.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.rate_limit == 0 {
            return Err(CoreError::InvalidPolicy("rate_limit must be >= 1".into()));
        }
        if self.rate_limit_interval_seconds == 0 {
            return Err(CoreError::InvalidPolicy(
                "rate_limit_interval_seconds must be >= 1".into(),
            ));
        }
        if self.approval_timeout_seconds == 0 {
            return Err(CoreError::InvalidPolicy(
                "approval_timeout_seconds must be >= 1".into(),
            ));
        }
        if self.retry.attempt_timeout_ms == 0 {
            return Err(CoreError::InvalidPolicy(
                "retry.attempt_timeout_ms must be >= 1".into(),
            ));
        }
        if self.circuit_breaker.threshold == 0 {
            return Err(CoreError::InvalidPolicy(
                "circuit_breaker.threshold must be >= 1".into(),
            ));
        }
        for (context, o) in &self.circuit_breaker.contexts {
            if o.threshold == Some(0) {
                return Err(CoreError::InvalidPolicy(format!(
                    "circuit_breaker.contexts.{context}.threshold must be >= 1"
                )));
            }
        }
        Ok(())
    }
}

/// Retry budget applied by the dependency guard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay; attempt `n` waits `n * retry_delay_ms`.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Upper bound on a single attempt before it counts as a timeout.
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_attempt_timeout_ms() -> u64 {
    30_000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
        }
    }
}

/// Circuit breaker defaults plus per-context overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CircuitBreakerSettings {
    #[serde(default = "default_threshold")]
    pub threshold: u32,
    #[serde(default = "default_reset_timeout")]
    pub reset_timeout_seconds: u64,
    #[serde(default)]
    pub contexts: HashMap<String, CircuitBreakerOverride>,
}

fn default_threshold() -> u32 {
    5
}

fn default_reset_timeout() -> u64 {
    60
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            reset_timeout_seconds: default_reset_timeout(),
            contexts: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CircuitBreakerOverride {
    #[serde(default)]
    pub threshold: Option<u32>,
    #[serde(default)]
    pub reset_timeout_seconds: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_empty_document() {
        let policy: PolicyConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(policy.dedupe_window_seconds, 300);
        assert_eq!(policy.rate_limit, 10);
        assert_eq!(policy.rate_limit_interval_seconds, 60);
        assert_eq!(policy.retry.max_retries, 3);
        assert_eq!(policy.retry.retry_delay_ms, 1000);
        assert_eq!(policy.retry.attempt_timeout_ms, 30_000);
        assert_eq!(policy.circuit_breaker.threshold, 5);
        assert_eq!(policy.circuit_breaker.reset_timeout_seconds, 60);
        assert!(policy.actions.is_empty());
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn zero_rate_limit_is_invalid() {
        let policy = PolicyConfig {
            rate_limit: 0,
            ..PolicyConfig::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn zero_override_threshold_is_invalid() {
        let mut policy = PolicyConfig::default();
        policy.circuit_breaker.contexts.insert(
            "k8s-api".into(),
            CircuitBreakerOverride {
                threshold: Some(0),
                reset_timeout_seconds: None,
            },
        );
        let err = policy.validate().unwrap_err();
        assert!(err.to_string().contains("k8s-api"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: Result<PolicyConfig, _> =
            serde_json::from_str(r#"{"dedupe_window": 10}"#);
        assert!(result.is_err());
    }
}
