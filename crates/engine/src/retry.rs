use std::time::Duration;

use remedy_core::RetrySettings;

/// Retry budget for guarded calls.
///
/// Attempt `n` (1-based) that fails with a retryable error is followed by a
/// pause of `retry_delay * n` before the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Upper bound on one attempt; an attempt that runs longer counts as a
    /// timeout failure.
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Total attempts a closed circuit allows for one call.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Pause after the failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
            attempt_timeout: Duration::from_millis(settings.attempt_timeout_ms),
        }
    }
}
