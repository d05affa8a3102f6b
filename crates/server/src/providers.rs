//! Wiring of executors, notifiers, policy, and audit into an orchestrator.

use std::sync::Arc;

use async_trait::async_trait;
use remedy_core::{Notification, NotificationChannel, PolicyConfig};
use remedy_engine::{OrchestratorBuilder, RemediationOrchestrator, load_policy};
use remedy_provider::{DependencyError, Executor, LogExecutor, LogNotifier, Notifier};
use remedy_webhook::{WebhookClient, WebhookExecutor, WebhookNotifier};
use tracing::{info, warn};

use crate::audit_factory::create_audit_sink;
use crate::config::{ExecutorTarget, RemedyConfig};
use crate::error::ServerError;

/// Routes each channel to the webhook or log notifier by its kind.
pub struct ChannelNotifier {
    webhook: WebhookNotifier,
    log: LogNotifier,
}

impl ChannelNotifier {
    pub fn new(webhook: WebhookNotifier) -> Self {
        Self {
            webhook,
            log: LogNotifier,
        }
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(
        &self,
        channel: &NotificationChannel,
        notification: &Notification,
    ) -> Result<(), DependencyError> {
        if channel.kind.uses_webhook() {
            self.webhook.notify(channel, notification).await
        } else {
            self.log.notify(channel, notification).await
        }
    }
}

/// Build the executor for one target.
pub fn build_executor(
    name: &str,
    target: &ExecutorTarget,
) -> Result<Arc<dyn Executor>, ServerError> {
    Ok(match target {
        ExecutorTarget::Log => Arc::new(LogExecutor::new(name)),
        ExecutorTarget::Webhook(config) => Arc::new(
            WebhookExecutor::new(name, config.clone())
                .map_err(|e| ServerError::Config(format!("executor {name}: {e}")))?,
        ),
    })
}

/// The policy named by `[policy] path`, or an empty one.
pub fn load_configured_policy(config: &RemedyConfig) -> Result<PolicyConfig, ServerError> {
    match &config.policy.path {
        Some(path) => {
            let policy = load_policy(path)?;
            info!(
                path = %path.display(),
                actions = policy.actions.len(),
                channels = policy.channels.len(),
                "policy loaded"
            );
            Ok(policy)
        }
        None => {
            warn!("no [policy] path configured, starting with an empty catalog");
            Ok(PolicyConfig::default())
        }
    }
}

/// Assemble the orchestrator described by `config`.
pub async fn build_orchestrator(
    config: &RemedyConfig,
) -> Result<RemediationOrchestrator, ServerError> {
    let policy = load_configured_policy(config)?;
    let audit = create_audit_sink(&config.audit).await?;
    info!(backend = ?config.audit.backend, "audit sink initialized");

    let notifications = WebhookClient::new(config.executors.notifications.clone())
        .map_err(|e| ServerError::Config(format!("notification client: {e}")))?;

    let mut builder = OrchestratorBuilder::new()
        .policy(policy)
        .audit(audit)
        .fallback_executor(build_executor("default", &config.executors.default)?)
        .fallback_notifier(Arc::new(ChannelNotifier::new(WebhookNotifier::new(
            notifications,
        ))));
    for (action, target) in &config.executors.actions {
        builder = builder.executor(action.clone(), build_executor(action, target)?);
    }

    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use remedy_core::{ChannelKind, Issue, Severity};
    use remedy_webhook::WebhookConfig;

    use super::*;

    #[tokio::test]
    async fn log_channels_never_need_a_url() {
        let notifier = ChannelNotifier::new(WebhookNotifier::new(
            WebhookClient::new(WebhookConfig::new("")).unwrap(),
        ));
        let channel = NotificationChannel::new("audit-log", ChannelKind::Log);
        let notification = Notification::OutcomeReport {
            request_id: None,
            action: "restart_pod".into(),
            action_severity: Severity::High,
            issue: Issue::new("svc-A/crash", "crash_loop", Severity::High),
            outcome: remedy_core::Outcome::Succeeded,
            detail: None,
        };
        notifier.notify(&channel, &notification).await.unwrap();

        let slack = NotificationChannel::new("ops-slack", ChannelKind::Slack);
        let err = notifier.notify(&slack, &notification).await.unwrap_err();
        assert!(matches!(err, DependencyError::Configuration(_)));
    }

    #[test]
    fn webhook_target_needs_url() {
        let err = build_executor("scale", &ExecutorTarget::Webhook(WebhookConfig::new("")))
            .err()
            .unwrap();
        assert!(err.to_string().contains("executor scale"));
        assert!(build_executor("scale", &ExecutorTarget::Log).is_ok());
    }

    #[tokio::test]
    async fn builds_from_defaults() {
        let orchestrator = build_orchestrator(&RemedyConfig::default()).await.unwrap();
        assert!(orchestrator.catalog().actions().is_empty());
    }

    #[tokio::test]
    async fn builds_with_policy_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.yaml");
        std::fs::write(
            &path,
            "actions:\n  - name: restart_pod\n    severity: low\n    applicable_categories: [crash_loop]\n",
        )
        .unwrap();
        let mut config = RemedyConfig::default();
        config.policy.path = Some(path);
        let orchestrator = build_orchestrator(&config).await.unwrap();
        assert_eq!(orchestrator.catalog().actions().len(), 1);
    }

    #[test]
    fn sample_deployment_files_are_valid() {
        let root = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../deploy");
        let config = RemedyConfig::load(&root.join("remedy.toml")).unwrap();
        assert!(matches!(
            config.executors.actions["scale_up_deployment"],
            ExecutorTarget::Webhook(_)
        ));

        let policy = load_policy(&root.join("policy.yaml")).unwrap();
        let catalog = remedy_engine::PolicyCatalog::from_config(&policy).unwrap();
        assert_eq!(catalog.actions().len(), 4);
        assert_eq!(catalog.channels().len(), 3);
    }
}
