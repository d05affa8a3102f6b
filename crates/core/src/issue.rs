use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::CoreError;
use crate::severity::Severity;

/// Metadata key under which the affected resource is kept.
pub const RESOURCE_KEY: &str = "resource";

/// A detected operational condition that may need remediation.
///
/// Issues are produced by external detectors and never mutated after
/// construction; the engine shares them behind `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Unique identifier of this occurrence.
    pub id: String,
    /// Stable hash of the issue type and the affected resource.
    pub signature: String,
    /// Issue category used to look up applicable actions (e.g. `high_cpu_usage`).
    pub category: String,
    /// Detected severity.
    pub severity: Severity,
    /// When the detector observed the issue.
    pub detected_at: DateTime<Utc>,
    /// Free-form detector metadata.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Issue {
    /// Create an issue with a generated id and the current time.
    pub fn new(
        signature: impl Into<String>,
        category: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            signature: signature.into(),
            category: category.into(),
            severity,
            detected_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Attach a metadata value.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// The affected resource, when the detector reported one.
    pub fn resource(&self) -> Option<&str> {
        self.metadata
            .get(RESOURCE_KEY)
            .and_then(serde_json::Value::as_str)
    }
}

/// An issue event as submitted by a detector.
///
/// Only `category` and `severity` are mandatory; the signature may be derived
/// from `resource`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueReport {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub resource: Option<String>,
    pub category: String,
    pub severity: Severity,
    #[serde(default)]
    pub detected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl IssueReport {
    /// Validate the report and turn it into an [`Issue`].
    pub fn into_issue(self) -> Result<Issue, CoreError> {
        let category = self.category.trim().to_owned();
        if category.is_empty() {
            return Err(CoreError::InvalidIssue("category must not be empty".into()));
        }

        let resource = self
            .resource
            .map(|r| r.trim().to_owned())
            .filter(|r| !r.is_empty());

        let signature = match self.signature.filter(|s| !s.trim().is_empty()) {
            Some(signature) => signature,
            None => {
                let Some(resource) = resource.as_deref() else {
                    return Err(CoreError::InvalidIssue(
                        "either signature or resource is required".into(),
                    ));
                };
                compute_signature(&category, resource)
            }
        };

        let mut metadata = self.metadata;
        if let Some(resource) = resource {
            metadata
                .entry(RESOURCE_KEY.to_owned())
                .or_insert(serde_json::Value::String(resource));
        }

        Ok(Issue {
            id: self
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| Uuid::now_v7().to_string()),
            signature,
            category,
            severity: self.severity,
            detected_at: self.detected_at.unwrap_or_else(Utc::now),
            metadata,
        })
    }
}

impl TryFrom<IssueReport> for Issue {
    type Error = CoreError;

    fn try_from(report: IssueReport) -> Result<Self, Self::Error> {
        report.into_issue()
    }
}

/// Compute the stable signature for an issue category on a resource.
///
/// Returns the hex SHA-256 of `category`, a NUL separator, and `resource`.
pub fn compute_signature(category: &str, resource: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(category.as_bytes());
    hasher.update([0u8]);
    hasher.update(resource.as_bytes());
    hex::encode(hasher.finalize())
}
