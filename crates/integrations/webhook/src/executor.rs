use async_trait::async_trait;
use remedy_core::{ExecutionOutcome, Issue, RemediationAction};
use remedy_provider::{DependencyError, Executor};
use serde_json::json;
use tracing::instrument;

use crate::client::WebhookClient;
use crate::config::WebhookConfig;
use crate::error::WebhookError;

/// Hands the actual remediation to an HTTP automation endpoint.
///
/// `execute` posts `{"action", "issue"}` to the configured URL; `rollback`
/// posts `{"action", "issue", "previous"}` to `<url>/rollback`. The
/// response body becomes the execution details.
pub struct WebhookExecutor {
    name: String,
    client: WebhookClient,
}

impl WebhookExecutor {
    pub fn new(name: impl Into<String>, config: WebhookConfig) -> Result<Self, WebhookError> {
        let name = name.into();
        if config.url.trim().is_empty() {
            return Err(WebhookError::MissingUrl(name));
        }
        Ok(Self {
            name,
            client: WebhookClient::new(config)?,
        })
    }

    pub fn with_client(name: impl Into<String>, client: WebhookClient) -> Self {
        Self {
            name: name.into(),
            client,
        }
    }
}

#[async_trait]
impl Executor for WebhookExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip_all, fields(executor = %self.name, action = %action.name, signature = %issue.signature))]
    async fn execute(
        &self,
        action: &RemediationAction,
        issue: &Issue,
    ) -> Result<ExecutionOutcome, DependencyError> {
        let body = json!({ "action": action, "issue": issue });
        let details = self
            .client
            .post_json(&self.client.config().url, &body)
            .await?;
        Ok(ExecutionOutcome::new(details))
    }

    #[instrument(skip_all, fields(executor = %self.name, action = %action.name, signature = %issue.signature))]
    async fn rollback(
        &self,
        action: &RemediationAction,
        issue: &Issue,
        previous: &ExecutionOutcome,
    ) -> Result<ExecutionOutcome, DependencyError> {
        let body = json!({
            "action": action,
            "issue": issue,
            "previous": previous.details,
        });
        let details = self
            .client
            .post_json(&self.client.config().rollback_url(), &body)
            .await?;
        Ok(ExecutionOutcome::new(details))
    }
}
