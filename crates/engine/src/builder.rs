use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use remedy_audit::AuditSink;
use remedy_core::PolicyConfig;
use remedy_provider::{DependencyError, Executor, ExecutorRegistry, Notifier, NotifierRegistry};
use tracing::warn;

use crate::approval::ApprovalGate;
use crate::audit_log::AuditLog;
use crate::catalog::PolicyCatalog;
use crate::dedup::DedupWindow;
use crate::error::EngineError;
use crate::guard::{DependencyGuard, ErrorObserver};
use crate::metrics::EngineMetrics;
use crate::orchestrator::RemediationOrchestrator;
use crate::ratelimit::RateLimiter;
use crate::retry::RetryPolicy;

/// Fluent builder for a [`RemediationOrchestrator`].
///
/// An audit sink is required. The policy defaults to an empty catalog with
/// default windows, limits, and resilience settings.
pub struct OrchestratorBuilder {
    policy: PolicyConfig,
    audit: Option<Arc<dyn AuditSink>>,
    executors: ExecutorRegistry,
    notifiers: NotifierRegistry,
    error_observer: Option<ErrorObserver>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            policy: PolicyConfig::default(),
            audit: None,
            executors: ExecutorRegistry::new(),
            notifiers: NotifierRegistry::new(),
            error_observer: None,
        }
    }

    #[must_use]
    pub fn policy(mut self, policy: PolicyConfig) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Register the executor for an action name.
    #[must_use]
    pub fn executor(mut self, action: impl Into<String>, executor: Arc<dyn Executor>) -> Self {
        self.executors.register(action, executor);
        self
    }

    /// Executor for actions without a dedicated registration.
    #[must_use]
    pub fn fallback_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executors.set_fallback(executor);
        self
    }

    /// Register the notifier for a channel name.
    #[must_use]
    pub fn notifier(mut self, channel: impl Into<String>, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.register(channel, notifier);
        self
    }

    #[must_use]
    pub fn fallback_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.set_fallback(notifier);
        self
    }

    /// Additional observer for every raw dependency failure. Failures are
    /// always logged and counted.
    #[must_use]
    pub fn error_observer(mut self, observer: ErrorObserver) -> Self {
        self.error_observer = Some(observer);
        self
    }

    pub fn build(self) -> Result<RemediationOrchestrator, EngineError> {
        let audit = self
            .audit
            .ok_or_else(|| EngineError::Configuration("audit sink is required".into()))?;

        let catalog = PolicyCatalog::from_config(&self.policy)?;
        let metrics = Arc::new(EngineMetrics::default());

        let observer: ErrorObserver = {
            let metrics = Arc::clone(&metrics);
            let extra = self.error_observer;
            Arc::new(move |context: &str, attempt: u32, error: &DependencyError| {
                metrics.increment_dependency_failures();
                warn!(context, attempt, retryable = error.is_retryable(), error = %error, "dependency call failed");
                if let Some(extra) = &extra {
                    extra(context, attempt, error);
                }
            })
        };
        let guard = DependencyGuard::from_settings(
            &self.policy.circuit_breaker,
            RetryPolicy::from(&self.policy.retry),
        )
        .with_observer(observer);

        let mut rate_limiter = RateLimiter::new(
            self.policy.rate_limit,
            Duration::from_secs(self.policy.rate_limit_interval_seconds),
        );
        for action in catalog.actions() {
            if let Some(capacity) = action.rate_limit {
                rate_limiter = rate_limiter.with_action_capacity(&action.name, capacity);
            }
        }

        Ok(RemediationOrchestrator {
            dedup: DedupWindow::new(Duration::from_secs(self.policy.dedupe_window_seconds)),
            approvals: ApprovalGate::new(catalog.approval_timeout()),
            catalog: RwLock::new(Arc::new(catalog)),
            rate_limiter,
            guard,
            audit: AuditLog::new(audit),
            executors: self.executors,
            notifiers: self.notifiers,
            requests: DashMap::new(),
            metrics,
        })
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use remedy_audit_memory::MemoryAuditSink;
    use remedy_core::{ActionConfig, Severity};

    use super::*;

    #[test]
    fn audit_sink_is_required() {
        let err = OrchestratorBuilder::new().build().err().unwrap();
        assert!(err.to_string().contains("audit sink is required"));
    }

    #[test]
    fn invalid_policy_is_rejected() {
        let policy = PolicyConfig {
            rate_limit: 0,
            ..PolicyConfig::default()
        };
        let result = OrchestratorBuilder::new()
            .policy(policy)
            .audit(Arc::new(MemoryAuditSink::new()))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn builds_with_policy() {
        let mut policy = PolicyConfig::default();
        policy.actions.push(
            ActionConfig::new("restart_pod", Severity::Medium, ["crash_loop"]).rate_limit(2),
        );
        let orchestrator = OrchestratorBuilder::new()
            .policy(policy)
            .audit(Arc::new(MemoryAuditSink::new()))
            .build()
            .unwrap();
        assert_eq!(orchestrator.catalog().actions().len(), 1);
        assert!(orchestrator.requests().is_empty());
        assert_eq!(orchestrator.metrics().received, 0);
    }
}
