use std::collections::HashMap;

use remedy_webhook::WebhookConfig;
use serde::Deserialize;

/// Where an action's executor sends its work.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutorTarget {
    /// Log the remediation and report success.
    #[default]
    Log,
    /// POST the remediation to an automation endpoint.
    Webhook(WebhookConfig),
}

/// Executor registrations and the notification transport.
///
/// # Example
///
/// ```toml
/// [executors.default]
/// type = "log"
///
/// [executors.actions.scale_up_deployment]
/// type = "webhook"
/// url = "https://automation.example.com/scale"
/// timeout_secs = 20
///
/// [executors.notifications]
/// timeout_secs = 5
/// ```
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutorsConfig {
    /// Target for actions without their own entry.
    #[serde(default)]
    pub default: ExecutorTarget,
    /// Per-action targets keyed by action name.
    #[serde(default)]
    pub actions: HashMap<String, ExecutorTarget>,
    /// Timeout, headers, and auth for webhook-backed channels. The URL comes
    /// from each channel.
    #[serde(default = "default_notifications")]
    pub notifications: WebhookConfig,
}

impl Default for ExecutorsConfig {
    fn default() -> Self {
        Self {
            default: ExecutorTarget::default(),
            actions: HashMap::new(),
            notifications: default_notifications(),
        }
    }
}

fn default_notifications() -> WebhookConfig {
    WebhookConfig::new("")
}
