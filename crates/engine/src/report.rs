use remedy_core::{ApprovalRecord, Outcome};
use serde::Serialize;
use uuid::Uuid;

use crate::guard::CircuitState;

/// Terminal result of handling one issue.
#[derive(Debug, Clone, Serialize)]
pub struct RemediationReport {
    /// Absent when no action applied.
    pub request_id: Option<Uuid>,
    pub issue_id: String,
    pub signature: String,
    pub action: Option<String>,
    pub outcome: Outcome,
    pub allowed: bool,
    /// Executor attempts, when execution was tried.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_state: Option<CircuitState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval: Option<ApprovalRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What handling an issue would do right now, computed without side effects.
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub issue_id: String,
    pub signature: String,
    /// Applicable actions in ranking order.
    pub matched: Vec<String>,
    /// The top-ranked action, the only one that would be attempted.
    pub selected: Option<String>,
    pub dedup_admits: bool,
    pub rate_limit_admits: bool,
    pub requires_approval: bool,
    pub approval_channels: Vec<String>,
    pub executor_registered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_state: Option<CircuitState>,
}
