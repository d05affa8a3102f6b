use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use remedy_core::{Issue, NotificationChannel, PolicyConfig, RemediationAction, Severity};
use serde::Serialize;
use tracing::debug;

use crate::error::EngineError;

/// The validated table of remediation actions and notification channels.
///
/// Built once from a [`PolicyConfig`] and never mutated; a reload builds a
/// new catalog and swaps it in whole.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyCatalog {
    actions: Vec<RemediationAction>,
    channels: Vec<NotificationChannel>,
    #[serde(skip)]
    approval_timeout: Duration,
}

impl PolicyCatalog {
    /// Validate the policy's actions and channels and build the catalog.
    pub fn from_config(policy: &PolicyConfig) -> Result<Self, EngineError> {
        policy.validate()?;

        let mut names = HashSet::new();
        let mut actions = Vec::with_capacity(policy.actions.len());
        for config in &policy.actions {
            let action = RemediationAction::from_config(config.clone())?;
            if !names.insert(action.name.clone()) {
                return Err(EngineError::Configuration(format!(
                    "duplicate action name: {}",
                    action.name
                )));
            }
            actions.push(action);
        }

        let mut channel_names = HashSet::new();
        for channel in &policy.channels {
            channel.validate()?;
            if !channel_names.insert(channel.name.as_str()) {
                return Err(EngineError::Configuration(format!(
                    "duplicate channel name: {}",
                    channel.name
                )));
            }
        }

        Ok(Self {
            actions,
            channels: policy.channels.clone(),
            approval_timeout: Duration::from_secs(policy.approval_timeout_seconds),
        })
    }

    /// Enabled actions declared for the issue's category, highest severity
    /// first, declaration order among equals.
    pub fn match_actions(&self, issue: &Issue) -> Vec<RemediationAction> {
        let mut matched: Vec<RemediationAction> = self
            .actions
            .iter()
            .filter(|action| action.applies_to(&issue.category))
            .filter(|action| {
                if !action.enabled {
                    debug!(action = %action.name, category = %issue.category, "skipping disabled action");
                }
                action.enabled
            })
            .cloned()
            .collect();
        // sort_by is stable
        matched.sort_by(|a, b| b.severity.cmp(&a.severity));
        matched
    }

    pub fn action(&self, name: &str) -> Option<&RemediationAction> {
        self.actions.iter().find(|a| a.name == name)
    }

    pub fn actions(&self) -> &[RemediationAction] {
        &self.actions
    }

    pub fn channels(&self) -> &[NotificationChannel] {
        &self.channels
    }

    /// Enabled channels whose severity filter accepts `severity`.
    pub fn channels_for(&self, severity: Severity) -> Vec<NotificationChannel> {
        self.channels
            .iter()
            .filter(|c| c.accepts(severity))
            .cloned()
            .collect()
    }

    /// Approval deadline used when no channel is configured.
    pub fn approval_timeout(&self) -> Duration {
        self.approval_timeout
    }
}

/// Parse a TOML policy document.
pub fn parse_policy_toml(source: &str) -> Result<PolicyConfig, EngineError> {
    toml::from_str(source).map_err(|e| EngineError::Configuration(format!("invalid policy: {e}")))
}

/// Parse a YAML policy document.
pub fn parse_policy_yaml(source: &str) -> Result<PolicyConfig, EngineError> {
    serde_yaml_ng::from_str(source)
        .map_err(|e| EngineError::Configuration(format!("invalid policy: {e}")))
}

/// Read a policy document, choosing the format from the file extension
/// (`.yaml`/`.yml`, anything else is TOML).
pub fn load_policy(path: &Path) -> Result<PolicyConfig, EngineError> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| EngineError::Configuration(format!("{}: {e}", path.display())))?;
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
    if is_yaml {
        parse_policy_yaml(&source)
    } else {
        parse_policy_toml(&source)
    }
}

#[cfg(test)]
mod tests {
    use remedy_core::{ActionConfig, ActionParameters, ChannelKind};

    use super::*;

    const POLICY_YAML: &str = r#"
dedupe_window_seconds: 120
rate_limit: 5
actions:
  - name: scale_up_deployment
    description: Add replicas
    severity: medium
    applicable_categories: [high_cpu_usage, high_memory_usage]
    parameters:
      scale_factor: 2.0
  - name: restart_pod
    severity: medium
    applicable_categories: [high_memory_usage]
  - name: rollback_deployment
    severity: high
    applicable_categories: [error_rate_spike, high_memory_usage]
channels:
  - name: ops-slack
    type: slack
    webhook_url: https://hooks.example.com/ops
    timeout_seconds: 600
    severity_filter: [high, critical]
  - name: pager
    type: pagerduty
    webhook_url: https://events.example.com
    enabled: false
"#;

    fn catalog() -> PolicyCatalog {
        PolicyCatalog::from_config(&parse_policy_yaml(POLICY_YAML).unwrap()).unwrap()
    }

    #[test]
    fn match_orders_by_severity_then_declaration() {
        let issue = Issue::new("svc-A/mem", "high_memory_usage", Severity::Medium);
        let names: Vec<String> = catalog()
            .match_actions(&issue)
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(
            names,
            vec!["rollback_deployment", "scale_up_deployment", "restart_pod"]
        );
    }

    #[test]
    fn unknown_category_matches_nothing() {
        let issue = Issue::new("svc-A/disk", "disk_full", Severity::High);
        assert!(catalog().match_actions(&issue).is_empty());
    }

    #[test]
    fn disabled_actions_are_skipped() {
        let mut policy = PolicyConfig::default();
        policy.actions.push(
            ActionConfig::new("restart_pod", Severity::High, ["crash_loop"]).enabled(false),
        );
        policy
            .actions
            .push(ActionConfig::new("scale_up_deployment", Severity::Low, ["crash_loop"]));
        let catalog = PolicyCatalog::from_config(&policy).unwrap();
        let issue = Issue::new("s", "crash_loop", Severity::High);
        let matched = catalog.match_actions(&issue);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].name, "scale_up_deployment");
    }

    #[test]
    fn parameters_and_approval_defaults_are_resolved() {
        let catalog = catalog();
        let scale = catalog.action("scale_up_deployment").unwrap();
        assert!(!scale.requires_approval);
        assert!(matches!(
            &scale.parameters,
            ActionParameters::ScaleUpDeployment(p) if (p.scale_factor - 2.0).abs() < f64::EPSILON
        ));
        assert!(catalog.action("rollback_deployment").unwrap().requires_approval);
    }

    #[test]
    fn channels_for_applies_filter_and_enabled() {
        let catalog = catalog();
        assert_eq!(catalog.channels_for(Severity::High).len(), 1);
        assert!(catalog.channels_for(Severity::Medium).is_empty());
        assert_eq!(catalog.channels().len(), 2);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut policy = PolicyConfig::default();
        for _ in 0..2 {
            policy
                .actions
                .push(ActionConfig::new("restart_pod", Severity::Low, ["x"]));
        }
        let err = PolicyCatalog::from_config(&policy).unwrap_err();
        assert!(err.to_string().contains("duplicate action name"));

        let mut policy = PolicyConfig::default();
        policy.channels.push(NotificationChannel::new("ops", ChannelKind::Log));
        policy.channels.push(NotificationChannel::new("ops", ChannelKind::Email));
        assert!(PolicyCatalog::from_config(&policy).is_err());
    }

    #[test]
    fn invalid_parameters_fail_loading() {
        let mut policy = PolicyConfig::default();
        policy.actions.push(
            ActionConfig::new("scale_up_deployment", Severity::Low, ["x"])
                .parameters(serde_json::json!({"scale_factor": 0.5})),
        );
        assert!(PolicyCatalog::from_config(&policy).is_err());
    }

    #[test]
    fn toml_documents_parse() {
        let policy = parse_policy_toml(
            r#"
rate_limit = 2

[circuit_breaker]
threshold = 3

[[actions]]
name = "restart_pod"
severity = "low"
applicable_categories = ["crash_loop"]

[actions.parameters]
grace_period_seconds = 10
"#,
        )
        .unwrap();
        assert_eq!(policy.rate_limit, 2);
        assert_eq!(policy.circuit_breaker.threshold, 3);
        let catalog = PolicyCatalog::from_config(&policy).unwrap();
        assert_eq!(catalog.actions().len(), 1);
        assert_eq!(catalog.approval_timeout(), Duration::from_secs(1800));
    }

    #[test]
    fn load_picks_parser_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let dir = dir.path();
        let yaml = dir.join("policy.yml");
        std::fs::write(&yaml, POLICY_YAML).unwrap();
        assert_eq!(load_policy(&yaml).unwrap().dedupe_window_seconds, 120);

        let toml = dir.join("policy.toml");
        std::fs::write(&toml, "dedupe_window_seconds = 7\n").unwrap();
        assert_eq!(load_policy(&toml).unwrap().dedupe_window_seconds, 7);

        assert!(load_policy(&dir.join("missing.toml")).is_err());
    }
}
