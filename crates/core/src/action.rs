use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::severity::Severity;

/// One action entry in the policy document, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub severity: Severity,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Defaults to the severity rule when omitted.
    #[serde(default)]
    pub requires_approval: Option<bool>,
    #[serde(default)]
    pub applicable_categories: Vec<String>,
    #[serde(default)]
    pub parameters: Option<Value>,
    /// Per-action bucket capacity; falls back to the global rate limit.
    #[serde(default)]
    pub rate_limit: Option<u32>,
}

fn default_enabled() -> bool {
    true
}

impl ActionConfig {
    /// Start an enabled action entry applicable to the given categories.
    pub fn new<I, S>(name: impl Into<String>, severity: Severity, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            description: String::new(),
            severity,
            enabled: true,
            requires_approval: None,
            applicable_categories: categories.into_iter().map(Into::into).collect(),
            parameters: None,
            rate_limit: None,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn requires_approval(mut self, required: bool) -> Self {
        self.requires_approval = Some(required);
        self
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(parameters);
        self
    }

    #[must_use]
    pub fn rate_limit(mut self, limit: u32) -> Self {
        self.rate_limit = Some(limit);
        self
    }
}

/// Parameters for `scale_up_deployment`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScaleUpParameters {
    #[serde(default = "default_scale_factor")]
    pub scale_factor: f64,
    #[serde(default = "default_min_increment")]
    pub min_increment: u32,
    #[serde(default)]
    pub max_replicas: Option<u32>,
}

fn default_scale_factor() -> f64 {
    1.5
}

fn default_min_increment() -> u32 {
    1
}

/// Parameters for `restart_pod`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RestartPodParameters {
    #[serde(default = "default_grace_period")]
    pub grace_period_seconds: u64,
}

fn default_grace_period() -> u64 {
    30
}

/// Parameters for `rollback_deployment`. No revision means "previous".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RollbackParameters {
    #[serde(default)]
    pub to_revision: Option<u64>,
}

/// Parameters for `circuit_breaker`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CircuitBreakerParameters {
    pub api_url: String,
    #[serde(default = "default_breaker_timeout")]
    pub timeout_seconds: u64,
}

fn default_breaker_timeout() -> u64 {
    300
}

/// Typed action parameters, validated once when the catalog is loaded.
///
/// Well-known action names get a fixed shape; anything else keeps its
/// free-form object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionParameters {
    ScaleUpDeployment(ScaleUpParameters),
    RestartPod(RestartPodParameters),
    RollbackDeployment(RollbackParameters),
    CircuitBreaker(CircuitBreakerParameters),
    Custom(Map<String, Value>),
}

impl ActionParameters {
    /// Validate a raw parameter value against the shape expected for
    /// `action_name`. `None` and `null` are treated as an empty object.
    pub fn parse(action_name: &str, raw: Option<Value>) -> Result<Self, CoreError> {
        let invalid = |reason: String| CoreError::InvalidParameters {
            action: action_name.to_owned(),
            reason,
        };

        let map = match raw {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(invalid(format!("expected an object, got {other}")));
            }
        };

        match action_name {
            "scale_up_deployment" => {
                let params: ScaleUpParameters = serde_json::from_value(Value::Object(map))
                    .map_err(|e| invalid(e.to_string()))?;
                if !params.scale_factor.is_finite() || params.scale_factor <= 1.0 {
                    return Err(invalid("scale_factor must be greater than 1.0".into()));
                }
                if params.min_increment == 0 {
                    return Err(invalid("min_increment must be >= 1".into()));
                }
                if params.max_replicas == Some(0) {
                    return Err(invalid("max_replicas must be >= 1".into()));
                }
                Ok(Self::ScaleUpDeployment(params))
            }
            "restart_pod" => serde_json::from_value(Value::Object(map))
                .map(Self::RestartPod)
                .map_err(|e| invalid(e.to_string())),
            "rollback_deployment" => serde_json::from_value(Value::Object(map))
                .map(Self::RollbackDeployment)
                .map_err(|e| invalid(e.to_string())),
            "circuit_breaker" => {
                let params: CircuitBreakerParameters = serde_json::from_value(Value::Object(map))
                    .map_err(|e| invalid(e.to_string()))?;
                if params.api_url.trim().is_empty() {
                    return Err(invalid("api_url must not be empty".into()));
                }
                if params.timeout_seconds == 0 {
                    return Err(invalid("timeout_seconds must be >= 1".into()));
                }
                Ok(Self::CircuitBreaker(params))
            }
            _ => Ok(Self::Custom(map)),
        }
    }

    /// Short discriminator for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ScaleUpDeployment(_) => "scale_up_deployment",
            Self::RestartPod(_) => "restart_pod",
            Self::RollbackDeployment(_) => "rollback_deployment",
            Self::CircuitBreaker(_) => "circuit_breaker",
            Self::Custom(_) => "custom",
        }
    }
}

/// A named remediation operation with its applicability and risk metadata.
///
/// Read-only once loaded; a catalog reload swaps whole values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemediationAction {
    pub name: String,
    pub description: String,
    pub severity: Severity,
    pub enabled: bool,
    pub requires_approval: bool,
    pub applicable_categories: BTreeSet<String>,
    pub parameters: ActionParameters,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u32>,
}

impl RemediationAction {
    /// Validate a policy entry.
    pub fn from_config(config: ActionConfig) -> Result<Self, CoreError> {
        let name = config.name.trim().to_owned();
        if name.is_empty() {
            return Err(CoreError::InvalidPolicy("action name must not be empty".into()));
        }

        let applicable_categories: BTreeSet<String> = config
            .applicable_categories
            .into_iter()
            .map(|c| c.trim().to_owned())
            .filter(|c| !c.is_empty())
            .collect();
        if applicable_categories.is_empty() {
            return Err(CoreError::InvalidPolicy(format!(
                "action {name} must list at least one applicable category"
            )));
        }

        if config.rate_limit == Some(0) {
            return Err(CoreError::InvalidPolicy(format!(
                "action {name}: rate_limit must be >= 1"
            )));
        }

        let parameters = ActionParameters::parse(&name, config.parameters)?;

        Ok(Self {
            requires_approval: config
                .requires_approval
                .unwrap_or_else(|| config.severity.requires_approval_by_default()),
            name,
            description: config.description,
            severity: config.severity,
            enabled: config.enabled,
            applicable_categories,
            parameters,
            rate_limit: config.rate_limit,
        })
    }

    /// Whether the action is declared for the given issue category.
    pub fn applies_to(&self, category: &str) -> bool {
        self.applicable_categories.contains(category)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn approval_defaults_from_severity() {
        let medium = RemediationAction::from_config(ActionConfig::new(
            "scale_up_deployment",
            Severity::Medium,
            ["high_cpu_usage"],
        ))
        .unwrap();
        assert!(!medium.requires_approval);

        let high = RemediationAction::from_config(ActionConfig::new(
            "restart_pod",
            Severity::High,
            ["memory_leak"],
        ))
        .unwrap();
        assert!(high.requires_approval);

        let explicit = RemediationAction::from_config(
            ActionConfig::new("restart_pod", Severity::High, ["memory_leak"])
                .requires_approval(false),
        )
        .unwrap();
        assert!(!explicit.requires_approval);
    }

    #[test]
    fn scale_up_defaults_applied() {
        let params = ActionParameters::parse("scale_up_deployment", None).unwrap();
        assert_eq!(
            params,
            ActionParameters::ScaleUpDeployment(ScaleUpParameters {
                scale_factor: 1.5,
                min_increment: 1,
                max_replicas: None,
            })
        );
    }

    #[test]
    fn scale_up_rejects_shrinking_factor() {
        let err =
            ActionParameters::parse("scale_up_deployment", Some(json!({"scale_factor": 0.5})))
                .unwrap_err();
        assert!(matches!(err, CoreError::InvalidParameters { .. }));
    }

    #[test]
    fn known_shape_rejects_unknown_fields() {
        let err = ActionParameters::parse("restart_pod", Some(json!({"grace": 10}))).unwrap_err();
        assert!(err.to_string().contains("restart_pod"));
    }

    #[test]
    fn circuit_breaker_requires_api_url() {
        assert!(ActionParameters::parse("circuit_breaker", None).is_err());
        let params = ActionParameters::parse(
            "circuit_breaker",
            Some(json!({"api_url": "https://api.internal/payments"})),
        )
        .unwrap();
        let ActionParameters::CircuitBreaker(cb) = params else {
            panic!("expected circuit breaker parameters");
        };
        assert_eq!(cb.timeout_seconds, 300);
    }

    #[test]
    fn unknown_action_keeps_custom_map() {
        let params =
            ActionParameters::parse("flush_cache", Some(json!({"region": "eu-west-1"}))).unwrap();
        let ActionParameters::Custom(map) = params else {
            panic!("expected custom parameters");
        };
        assert_eq!(map["region"], "eu-west-1");
    }

    #[test]
    fn non_object_parameters_rejected() {
        assert!(ActionParameters::parse("flush_cache", Some(json!([1, 2]))).is_err());
    }

    #[test]
    fn action_needs_a_category() {
        let err = RemediationAction::from_config(ActionConfig::new(
            "restart_pod",
            Severity::Low,
            Vec::<String>::new(),
        ))
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidPolicy(_)));
    }

    #[test]
    fn zero_rate_limit_rejected() {
        let err = RemediationAction::from_config(
            ActionConfig::new("restart_pod", Severity::Low, ["memory_leak"]).rate_limit(0),
        )
        .unwrap_err();
        assert!(err.to_string().contains("rate_limit"));
    }

    #[test]
    fn parameters_serialize_with_kind_tag() {
        let params = ActionParameters::parse("rollback_deployment", None).unwrap();
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["kind"], "rollback_deployment");
    }
}
