use async_trait::async_trait;
use remedy_core::{ExecutionOutcome, Issue, Notification, NotificationChannel, RemediationAction};
use tracing::info;

use crate::error::DependencyError;
use crate::executor::Executor;
use crate::notifier::Notifier;

/// An executor that logs the action and reports success without performing
/// any external I/O.
///
/// Useful for local development, dry environments, and tests where no real
/// cluster is reachable.
pub struct LogExecutor {
    name: String,
}

impl LogExecutor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Executor for LogExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        action: &RemediationAction,
        issue: &Issue,
    ) -> Result<ExecutionOutcome, DependencyError> {
        info!(
            executor = %self.name,
            action = %action.name,
            kind = action.parameters.kind(),
            issue_id = %issue.id,
            signature = %issue.signature,
            "log executor ran remediation"
        );
        Ok(ExecutionOutcome::new(serde_json::json!({
            "executor": self.name,
            "logged": true,
        })))
    }

    async fn rollback(
        &self,
        action: &RemediationAction,
        issue: &Issue,
        _previous: &ExecutionOutcome,
    ) -> Result<ExecutionOutcome, DependencyError> {
        info!(
            executor = %self.name,
            action = %action.name,
            signature = %issue.signature,
            "log executor rolled back remediation"
        );
        Ok(ExecutionOutcome::new(serde_json::json!({
            "executor": self.name,
            "rolled_back": true,
        })))
    }
}

/// A notifier that writes notifications to the log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        channel: &NotificationChannel,
        notification: &Notification,
    ) -> Result<(), DependencyError> {
        info!(
            channel = %channel.name,
            kind = notification.kind(),
            recipients = ?channel.recipients,
            "{}",
            notification.summary()
        );
        Ok(())
    }
}
