mod audit;
mod executors;
mod ingest;
mod maintenance;
mod policy;
mod server;
mod telemetry;


pub use audit::*;
pub use executors::*;
pub use ingest::*;
pub use maintenance::*;
pub use policy::*;
pub use server::*;
pub use telemetry::*;

use std::path::Path;

use serde::Deserialize;

use crate::error::ServerError;

/// Top-level configuration for the Remedy server, loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemedyConfig {
    /// HTTP server bind configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Where the remediation policy document lives.
    #[serde(default)]
    pub policy: PolicySource,
    /// Audit sink selection.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Issue ingestion queue and worker bounds.
    #[serde(default)]
    pub ingest: IngestConfig,
    /// Executor targets and notification transport.
    #[serde(default)]
    pub executors: ExecutorsConfig,
    /// Periodic cleanup of dedup entries, approvals, and requests.
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
    /// Log output.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl RemedyConfig {
    /// Parse a TOML document.
    pub fn parse(source: &str) -> Result<Self, ServerError> {
        toml::from_str(source).map_err(|e| ServerError::Config(format!("invalid config: {e}")))
    }

    /// Read `path`, or fall back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ServerError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let source = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::parse(&source)
    }
}
