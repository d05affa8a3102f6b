use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use dashmap::DashMap;
use remedy_core::CircuitBreakerSettings;
use remedy_provider::DependencyError;
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::retry::RetryPolicy;

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation: calls flow through.
    Closed,
    /// The dependency is failing: calls are rejected immediately.
    Open,
    /// Recovery probe: one call is let through to test the dependency.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Thresholds for one circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Failed calls (after retries) before the circuit opens.
    pub threshold: u32,
    /// How long the circuit stays open before a probe is allowed.
    pub reset_timeout: Duration,
}

impl CircuitBreakerConfig {
    /// `reset_timeout = 0` is allowed (useful for testing).
    pub fn validate(&self) -> Result<(), String> {
        if self.threshold < 1 {
            return Err("threshold must be >= 1".into());
        }
        Ok(())
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            threshold: 5,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

struct CircuitData {
    state: CircuitState,
    failure_count: u32,
    opened_at: Option<Instant>,
    /// Only one probe may run while half-open.
    probe_in_flight: bool,
}

impl CircuitData {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            opened_at: None,
            probe_in_flight: false,
        }
    }
}

/// Admission decision for one guarded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permit {
    /// Circuit closed: the full retry budget applies.
    Closed,
    /// Circuit half-open: a single attempt decides the circuit's fate.
    Probe,
    /// Circuit open: do not call the dependency.
    Denied,
}

/// Circuit breaker for a single dependency context.
///
/// - `Closed` -> `Open` when the failure count reaches the threshold
/// - `Open` -> `HalfOpen` once the reset timeout has elapsed, checked lazily
///   on the next call
/// - `HalfOpen` -> `Closed` on a successful probe, `HalfOpen` -> `Open` on a
///   failed one
pub struct CircuitBreaker {
    context: String,
    config: CircuitBreakerConfig,
    data: RwLock<CircuitData>,
}

impl CircuitBreaker {
    fn new(context: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            context: context.into(),
            config,
            data: RwLock::new(CircuitData::new()),
        }
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn config(&self) -> CircuitBreakerConfig {
        self.config
    }

    /// Decide whether a call may proceed, moving `Open` to `HalfOpen` when
    /// the reset timeout has elapsed.
    pub fn try_acquire(&self) -> Permit {
        let mut data = self
            .data
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        match data.state {
            CircuitState::Closed => Permit::Closed,
            CircuitState::Open => {
                let elapsed = data
                    .opened_at
                    .is_none_or(|at| at.elapsed() >= self.config.reset_timeout);
                if !elapsed {
                    return Permit::Denied;
                }
                debug!(context = %self.context, "circuit breaker transitioning from open to half-open");
                data.state = CircuitState::HalfOpen;
                data.failure_count = 0;
                data.probe_in_flight = true;
                Permit::Probe
            }
            CircuitState::HalfOpen if data.probe_in_flight => Permit::Denied,
            CircuitState::HalfOpen => {
                data.probe_in_flight = true;
                Permit::Probe
            }
        }
    }

    /// Record a successful call. A successful probe closes the circuit.
    pub fn record_success(&self) {
        let mut data = self
            .data
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        match data.state {
            CircuitState::HalfOpen => {
                info!(context = %self.context, "circuit breaker closing after successful probe");
                data.state = CircuitState::Closed;
                data.failure_count = 0;
                data.opened_at = None;
                data.probe_in_flight = false;
            }
            CircuitState::Closed => data.failure_count = 0,
            // A call admitted before the circuit opened; the open period stands.
            CircuitState::Open => {}
        }
    }

    /// Record a call that failed after its whole budget.
    ///
    /// Returns `true` when this failure opened the circuit.
    pub fn record_failure(&self) -> bool {
        let mut data = self
            .data
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        match data.state {
            CircuitState::Closed => {
                data.failure_count = data.failure_count.saturating_add(1);
                if data.failure_count >= self.config.threshold {
                    warn!(
                        context = %self.context,
                        failures = data.failure_count,
                        reset_timeout_ms = self.config.reset_timeout.as_millis() as u64,
                        "circuit breaker opened"
                    );
                    data.state = CircuitState::Open;
                    data.opened_at = Some(Instant::now());
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                warn!(context = %self.context, "probe failed, circuit breaker re-opened");
                data.state = CircuitState::Open;
                data.failure_count = data.failure_count.saturating_add(1);
                data.opened_at = Some(Instant::now());
                data.probe_in_flight = false;
                true
            }
            CircuitState::Open => false,
        }
    }

    /// Give the probe slot back without deciding the circuit's fate.
    pub fn release_probe(&self) {
        let mut data = self
            .data
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if data.state == CircuitState::HalfOpen {
            data.probe_in_flight = false;
        }
    }

    /// Close the circuit, zero the failure count, and drop any pending reset.
    pub fn reset(&self) {
        let mut data = self
            .data
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *data = CircuitData::new();
    }

    /// The recorded state, without applying the lazy reset check.
    pub fn state(&self) -> CircuitState {
        self.data
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .state
    }

    /// Read-only view for admin listing. An open circuit whose reset timeout
    /// has elapsed is reported as `half_open`.
    pub fn snapshot(&self) -> CircuitSnapshot {
        let data = self
            .data
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let open_for = data.opened_at.map(|at| at.elapsed());
        let state = match (data.state, open_for) {
            (CircuitState::Open, Some(elapsed)) if elapsed >= self.config.reset_timeout => {
                CircuitState::HalfOpen
            }
            (state, _) => state,
        };
        CircuitSnapshot {
            context: self.context.clone(),
            state,
            failure_count: data.failure_count,
            threshold: self.config.threshold,
            reset_timeout_ms: self.config.reset_timeout.as_millis() as u64,
            open_for_ms: open_for
                .filter(|_| data.state != CircuitState::Closed)
                .map(|d| d.as_millis() as u64),
        }
    }
}

/// Holds the half-open probe slot for one call. Dropping it without a
/// recorded result hands the slot back, so an abandoned probe never wedges
/// the circuit.
struct ProbeSlot<'a> {
    breaker: &'a CircuitBreaker,
    held: bool,
}

impl ProbeSlot<'_> {
    fn settle(&mut self) {
        self.held = false;
    }
}

impl Drop for ProbeSlot<'_> {
    fn drop(&mut self) {
        if self.held {
            self.breaker.release_probe();
        }
    }
}

/// Point-in-time view of one circuit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitSnapshot {
    pub context: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub threshold: u32,
    pub reset_timeout_ms: u64,
    /// Time since the circuit last opened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_for_ms: Option<u64>,
}

/// Errors surfaced by [`DependencyGuard::call`].
#[derive(Debug, Error)]
pub enum GuardError {
    /// The circuit is open; the dependency was not called (or retries stopped).
    #[error("circuit open for {context}")]
    CircuitOpen { context: String, attempts: u32 },

    /// This call's failure opened the circuit.
    #[error("circuit tripped for {context} after {attempts} attempt(s): {source}")]
    CircuitTripped {
        context: String,
        attempts: u32,
        #[source]
        source: DependencyError,
    },

    /// The retry budget was spent without success.
    #[error("retries exhausted for {context} after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        context: String,
        attempts: u32,
        #[source]
        source: DependencyError,
    },

    /// The dependency reported a non-retryable error.
    #[error("{context} rejected the call: {source}")]
    Rejected {
        context: String,
        attempts: u32,
        #[source]
        source: DependencyError,
    },
}

impl GuardError {
    /// Attempts that actually invoked the dependency.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::CircuitOpen { attempts, .. }
            | Self::CircuitTripped { attempts, .. }
            | Self::RetriesExhausted { attempts, .. }
            | Self::Rejected { attempts, .. } => *attempts,
        }
    }

    pub fn context(&self) -> &str {
        match self {
            Self::CircuitOpen { context, .. }
            | Self::CircuitTripped { context, .. }
            | Self::RetriesExhausted { context, .. }
            | Self::Rejected { context, .. } => context,
        }
    }

    /// Short machine-readable classification.
    pub fn code(&self) -> &'static str {
        match self {
            Self::CircuitOpen { .. } => "circuit_open",
            Self::CircuitTripped { .. } => "circuit_tripped",
            Self::RetriesExhausted { .. } => "retries_exhausted",
            Self::Rejected { .. } => "rejected",
        }
    }
}

/// A successful guarded call and the attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
}

/// Invoked for every raw dependency failure: `(context, attempt, error)`.
pub type ErrorObserver = Arc<dyn Fn(&str, u32, &DependencyError) + Send + Sync>;

/// Circuit breaker plus linear retry around calls to external dependencies.
///
/// Circuits are created on first use per context and live for the lifetime
/// of the guard.
pub struct DependencyGuard {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    default_config: CircuitBreakerConfig,
    overrides: HashMap<String, CircuitBreakerConfig>,
    retry: RetryPolicy,
    on_error: Option<ErrorObserver>,
}

impl DependencyGuard {
    pub fn new(default_config: CircuitBreakerConfig, retry: RetryPolicy) -> Self {
        Self {
            breakers: DashMap::new(),
            default_config,
            overrides: HashMap::new(),
            retry,
            on_error: None,
        }
    }

    /// Build from policy settings, applying per-context overrides.
    pub fn from_settings(settings: &CircuitBreakerSettings, retry: RetryPolicy) -> Self {
        let default_config = CircuitBreakerConfig {
            threshold: settings.threshold,
            reset_timeout: Duration::from_secs(settings.reset_timeout_seconds),
        };
        let mut guard = Self::new(default_config, retry);
        for (context, o) in &settings.contexts {
            guard = guard.with_override(
                context.clone(),
                CircuitBreakerConfig {
                    threshold: o.threshold.unwrap_or(default_config.threshold),
                    reset_timeout: o
                        .reset_timeout_seconds
                        .map_or(default_config.reset_timeout, Duration::from_secs),
                },
            );
        }
        guard
    }

    #[must_use]
    pub fn with_override(mut self, context: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        self.overrides.insert(context.into(), config);
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: ErrorObserver) -> Self {
        self.on_error = Some(observer);
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    fn breaker(&self, context: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(context) {
            return Arc::clone(existing.value());
        }
        let config = self
            .overrides
            .get(context)
            .copied()
            .unwrap_or(self.default_config);
        Arc::clone(
            self.breakers
                .entry(context.to_owned())
                .or_insert_with(|| Arc::new(CircuitBreaker::new(context, config)))
                .value(),
        )
    }

    fn observe(&self, context: &str, attempt: u32, error: &DependencyError) {
        if let Some(observer) = &self.on_error {
            observer(context, attempt, error);
        }
    }

    /// Run `operation` under the circuit for `context`.
    ///
    /// A closed circuit allows `1 + max_retries` attempts with linear backoff
    /// between them, stopping early if the circuit leaves `Closed`. A
    /// half-open circuit allows one probe attempt. Each attempt is bounded by
    /// the policy's attempt timeout. An exhausted budget counts as one
    /// failure against the circuit; non-retryable errors are not counted.
    pub async fn call<T, F, Fut>(
        &self,
        context: &str,
        mut operation: F,
    ) -> Result<Attempted<T>, GuardError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DependencyError>>,
    {
        let breaker = self.breaker(context);
        let permit = breaker.try_acquire();
        let max_attempts = match permit {
            Permit::Denied => {
                debug!(context, "circuit open, call rejected");
                return Err(GuardError::CircuitOpen {
                    context: context.to_owned(),
                    attempts: 0,
                });
            }
            Permit::Probe => 1,
            Permit::Closed => self.retry.max_attempts(),
        };
        let mut probe = ProbeSlot {
            breaker: &breaker,
            held: permit == Permit::Probe,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match tokio::time::timeout(self.retry.attempt_timeout, operation()).await
            {
                Ok(result) => result,
                Err(_) => Err(DependencyError::Timeout(self.retry.attempt_timeout)),
            };

            let error = match result {
                Ok(value) => {
                    breaker.record_success();
                    probe.settle();
                    return Ok(Attempted {
                        value,
                        attempts: attempt,
                    });
                }
                Err(error) => error,
            };

            self.observe(context, attempt, &error);

            // The probe slot goes back when `probe` drops.
            if !error.is_retryable() {
                return Err(GuardError::Rejected {
                    context: context.to_owned(),
                    attempts: attempt,
                    source: error,
                });
            }

            if attempt >= max_attempts {
                let tripped = breaker.record_failure();
                probe.settle();
                let context = context.to_owned();
                return Err(if tripped {
                    GuardError::CircuitTripped {
                        context,
                        attempts: attempt,
                        source: error,
                    }
                } else {
                    GuardError::RetriesExhausted {
                        context,
                        attempts: attempt,
                        source: error,
                    }
                });
            }

            if breaker.state() != CircuitState::Closed {
                return Err(GuardError::CircuitOpen {
                    context: context.to_owned(),
                    attempts: attempt,
                });
            }

            let delay = self.retry.delay_for(attempt);
            debug!(context, attempt, delay_ms = delay.as_millis() as u64, error = %error, "retrying");
            tokio::time::sleep(delay).await;

            if breaker.state() != CircuitState::Closed {
                return Err(GuardError::CircuitOpen {
                    context: context.to_owned(),
                    attempts: attempt,
                });
            }
        }
    }

    /// Manually close one circuit. Returns `false` for an unknown context.
    pub fn reset(&self, context: &str) -> bool {
        match self.breakers.get(context) {
            Some(breaker) => {
                breaker.reset();
                info!(context, "circuit breaker manually reset");
                true
            }
            None => false,
        }
    }

    /// Manually close every circuit.
    pub fn reset_all(&self) {
        for breaker in &self.breakers {
            breaker.reset();
        }
        info!(count = self.breakers.len(), "all circuit breakers manually reset");
    }

    /// Effective state for a context; unknown contexts are closed.
    pub fn state(&self, context: &str) -> CircuitState {
        self.breakers
            .get(context)
            .map_or(CircuitState::Closed, |b| b.snapshot().state)
    }

    /// Snapshots of every known circuit, sorted by context.
    pub fn snapshots(&self) -> Vec<CircuitSnapshot> {
        let mut snapshots: Vec<CircuitSnapshot> =
            self.breakers.iter().map(|b| b.snapshot()).collect();
        snapshots.sort_by(|a, b| a.context.cmp(&b.context));
        snapshots
    }
}
