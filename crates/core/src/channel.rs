use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::severity::Severity;

/// Transport family of a notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Slack,
    #[serde(rename = "pagerduty")]
    PagerDuty,
    Email,
    Webhook,
    Log,
}

impl ChannelKind {
    /// Whether this kind of channel is reached through an HTTP webhook URL.
    pub fn uses_webhook(self) -> bool {
        matches!(self, Self::Slack | Self::PagerDuty | Self::Webhook)
    }
}

/// A configured notification target used for approval requests and
/// outcome reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationChannel {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ChannelKind,
    #[serde(default, skip_serializing)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub recipients: Vec<String>,
    /// How long an approval requested through this channel stays open.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Severities this channel is interested in. Empty means all.
    #[serde(default)]
    pub severity_filter: Vec<Severity>,
}

fn default_timeout_seconds() -> u64 {
    1800
}

fn default_enabled() -> bool {
    true
}

impl NotificationChannel {
    pub fn new(name: impl Into<String>, kind: ChannelKind) -> Self {
        Self {
            name: name.into(),
            kind,
            webhook_url: None,
            recipients: Vec::new(),
            timeout_seconds: default_timeout_seconds(),
            enabled: true,
            severity_filter: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_webhook_url(mut self, url: impl Into<String>) -> Self {
        self.webhook_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_severity_filter(mut self, severities: Vec<Severity>) -> Self {
        self.severity_filter = severities;
        self
    }

    #[must_use]
    pub fn with_recipients(mut self, recipients: Vec<String>) -> Self {
        self.recipients = recipients;
        self
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Whether the channel should receive notifications of this severity.
    pub fn accepts(&self, severity: Severity) -> bool {
        self.enabled && (self.severity_filter.is_empty() || self.severity_filter.contains(&severity))
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.trim().is_empty() {
            return Err(CoreError::InvalidPolicy(
                "channel name must not be empty".into(),
            ));
        }
        if self.timeout_seconds == 0 {
            return Err(CoreError::InvalidPolicy(format!(
                "channel {}: timeout_seconds must be >= 1",
                self.name
            )));
        }
        if self.kind.uses_webhook()
            && self
                .webhook_url
                .as_deref()
                .is_none_or(|url| url.trim().is_empty())
        {
            return Err(CoreError::InvalidPolicy(format!(
                "channel {}: webhook_url is required",
                self.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_accepts_everything() {
        let channel = NotificationChannel::new("ops", ChannelKind::Log);
        assert!(channel.accepts(Severity::Low));
        assert!(channel.accepts(Severity::Critical));
    }

    #[test]
    fn filter_limits_severities() {
        let channel = NotificationChannel::new("pager", ChannelKind::Log)
            .with_severity_filter(vec![Severity::Critical]);
        assert!(channel.accepts(Severity::Critical));
        assert!(!channel.accepts(Severity::High));
    }

    #[test]
    fn disabled_channel_accepts_nothing() {
        let channel = NotificationChannel::new("ops", ChannelKind::Log).disabled();
        assert!(!channel.accepts(Severity::Critical));
    }

    #[test]
    fn webhook_kinds_need_url() {
        let channel = NotificationChannel::new("slack", ChannelKind::Slack);
        assert!(channel.validate().is_err());
        let channel = channel.with_webhook_url("https://hooks.slack.test/T000");
        assert!(channel.validate().is_ok());
    }

    #[test]
    fn zero_timeout_rejected() {
        let channel = NotificationChannel::new("ops", ChannelKind::Email).with_timeout_seconds(0);
        assert!(channel.validate().is_err());
    }

    #[test]
    fn deserializes_with_defaults() {
        let channel: NotificationChannel = serde_json::from_value(serde_json::json!({
            "name": "oncall",
            "type": "pagerduty",
            "webhook_url": "https://events.pagerduty.test/v2/enqueue",
            "severity_filter": ["critical", "high"]
        }))
        .unwrap();
        assert_eq!(channel.kind, ChannelKind::PagerDuty);
        assert_eq!(channel.timeout_seconds, 1800);
        assert!(channel.enabled);
        assert_eq!(channel.severity_filter.len(), 2);
    }
}
