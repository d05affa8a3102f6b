use std::path::PathBuf;

use serde::Deserialize;

/// Audit sink backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditBackend {
    #[default]
    Memory,
    /// Append-only JSON lines file.
    File,
}

/// Configuration for the audit trail.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    #[serde(default)]
    pub backend: AuditBackend,
    /// File path, required by the `file` backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
}
