use chrono::{DateTime, Utc};
use remedy_core::Outcome;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable record of one remediation decision and its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique identifier for this entry (UUID v7).
    pub id: String,
    /// Position in the sink, assigned on append.
    #[serde(default)]
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,

    // -- Subject --
    /// The remediation request, absent when no action applied.
    pub request_id: Option<Uuid>,
    pub issue_id: String,
    pub issue_signature: String,
    /// The chosen action, absent when no action applied.
    pub action: Option<String>,

    // -- Decision --
    /// Whether the action was permitted to run.
    pub allowed: bool,
    pub outcome: Outcome,
    /// `system`, `system:deadline`, or the approver's identity.
    pub actor: String,

    /// Attempts, breaker state, error text, approval information.
    #[serde(default)]
    pub details: serde_json::Value,
}

impl AuditEntry {
    /// Build an entry stamped with the current time. `allowed` follows the
    /// outcome.
    pub fn new(
        issue_id: impl Into<String>,
        issue_signature: impl Into<String>,
        outcome: Outcome,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            sequence: 0,
            timestamp: Utc::now(),
            request_id: None,
            issue_id: issue_id.into(),
            issue_signature: issue_signature.into(),
            action: None,
            allowed: outcome.allowed(),
            outcome,
            actor: actor.into(),
            details: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    #[must_use]
    pub fn with_request(mut self, request_id: Uuid) -> Self {
        self.request_id = Some(request_id);
        self
    }

    #[must_use]
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// Query parameters for searching audit entries.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AuditQuery {
    pub request_id: Option<Uuid>,
    pub issue_signature: Option<String>,
    pub action: Option<String>,
    pub outcome: Option<Outcome>,
    pub allowed: Option<bool>,
    /// Only entries recorded at or after this time.
    pub from: Option<DateTime<Utc>>,
    /// Only entries recorded at or before this time.
    pub to: Option<DateTime<Utc>>,
    /// Maximum number of entries to return (default 50, max 1000).
    pub limit: Option<u32>,
    /// Number of entries to skip for pagination.
    pub offset: Option<u32>,
}

impl AuditQuery {
    /// Return the effective limit, clamped to 1..=1000, defaulting to 50.
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(50).clamp(1, 1000)
    }

    /// Return the effective offset, defaulting to 0.
    pub fn effective_offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }

    /// Whether `entry` passes every filter. Pagination is not applied.
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        if self.request_id.is_some() && entry.request_id != self.request_id {
            return false;
        }
        if let Some(ref signature) = self.issue_signature
            && entry.issue_signature != *signature
        {
            return false;
        }
        if let Some(ref action) = self.action
            && entry.action.as_deref() != Some(action.as_str())
        {
            return false;
        }
        if self.outcome.is_some_and(|o| o != entry.outcome) {
            return false;
        }
        if self.allowed.is_some_and(|a| a != entry.allowed) {
            return false;
        }
        if self.from.is_some_and(|from| entry.timestamp < from) {
            return false;
        }
        if self.to.is_some_and(|to| entry.timestamp > to) {
            return false;
        }
        true
    }

    /// Filter, order by sequence, and paginate an iterator of entries.
    pub fn paginate(&self, entries: impl IntoIterator<Item = AuditEntry>) -> AuditPage {
        let limit = self.effective_limit();
        let offset = self.effective_offset();

        let mut matching: Vec<AuditEntry> =
            entries.into_iter().filter(|e| self.matches(e)).collect();
        matching.sort_by_key(|e| e.sequence);

        let total = matching.len() as u64;
        let entries = matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();

        AuditPage {
            entries,
            total,
            limit,
            offset,
        }
    }
}

/// A paginated page of audit entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditPage {
    pub entries: Vec<AuditEntry>,
    /// Total number of entries matching the query (before pagination).
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}
