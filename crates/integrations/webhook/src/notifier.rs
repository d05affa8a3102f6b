use async_trait::async_trait;
use remedy_core::{ChannelKind, Notification, NotificationChannel, Severity};
use remedy_provider::{DependencyError, Notifier};
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::client::WebhookClient;
use crate::error::WebhookError;

/// Delivers notifications to each channel's `webhook_url`.
///
/// Slack channels get a `{"text"}` message, `PagerDuty` channels an Events
/// v2 style trigger, and everything else the full notification envelope.
pub struct WebhookNotifier {
    client: WebhookClient,
}

impl WebhookNotifier {
    pub fn new(client: WebhookClient) -> Self {
        Self { client }
    }
}

fn pagerduty_severity(severity: Severity) -> &'static str {
    match severity {
        Severity::Low => "info",
        Severity::Medium => "warning",
        Severity::High => "error",
        Severity::Critical => "critical",
    }
}

/// Request body for `channel`.
pub fn render(channel: &NotificationChannel, notification: &Notification) -> Value {
    let (severity, issue) = match notification {
        Notification::ApprovalRequested {
            action_severity,
            issue,
            ..
        }
        | Notification::OutcomeReport {
            action_severity,
            issue,
            ..
        } => (*action_severity, issue),
    };

    match channel.kind {
        ChannelKind::Slack => json!({ "text": notification.summary() }),
        ChannelKind::PagerDuty => json!({
            "event_action": "trigger",
            "dedup_key": issue.signature,
            "payload": {
                "summary": notification.summary(),
                "severity": pagerduty_severity(severity),
                "source": issue.signature,
                "custom_details": notification,
            },
        }),
        ChannelKind::Email | ChannelKind::Webhook | ChannelKind::Log => json!({
            "channel": channel.name,
            "recipients": channel.recipients,
            "kind": notification.kind(),
            "summary": notification.summary(),
            "notification": notification,
        }),
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    #[instrument(skip_all, fields(channel = %channel.name, kind = notification.kind()))]
    async fn notify(
        &self,
        channel: &NotificationChannel,
        notification: &Notification,
    ) -> Result<(), DependencyError> {
        let url = channel
            .webhook_url
            .as_deref()
            .ok_or_else(|| WebhookError::MissingUrl(channel.name.clone()))?;
        self.client
            .post_json(url, &render(channel, notification))
            .await?;
        debug!("notification delivered");
        Ok(())
    }
}
