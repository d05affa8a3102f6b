use std::sync::Arc;

use remedy_audit::AuditSink;
use remedy_audit_file::JsonlAuditSink;
use remedy_audit_memory::MemoryAuditSink;

use crate::config::{AuditBackend, AuditConfig};
use crate::error::ServerError;

/// Create an audit sink from the given configuration.
pub async fn create_audit_sink(config: &AuditConfig) -> Result<Arc<dyn AuditSink>, ServerError> {
    let sink: Arc<dyn AuditSink> = match config.backend {
        AuditBackend::Memory => Arc::new(MemoryAuditSink::new()),
        AuditBackend::File => {
            let path = config.path.as_deref().ok_or_else(|| {
                ServerError::Config("audit file backend requires [audit] path".into())
            })?;
            let sink = JsonlAuditSink::open(path)
                .await
                .map_err(|e| ServerError::Config(format!("audit file {}: {e}", path.display())))?;
            Arc::new(sink)
        }
    };
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use remedy_audit::{AuditEntry, AuditQuery};
    use remedy_core::Outcome;

    use super::*;

    #[tokio::test]
    async fn memory_is_the_default() {
        let sink = create_audit_sink(&AuditConfig::default()).await.unwrap();
        let page = sink.query(&AuditQuery::default()).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn file_backend_requires_a_path() {
        let config = AuditConfig {
            backend: AuditBackend::File,
            path: None,
        };
        let err = create_audit_sink(&config).await.err().unwrap();
        assert!(err.to_string().contains("requires [audit] path"));
    }

    #[tokio::test]
    async fn file_backend_appends() {
        let dir = tempfile::tempdir().unwrap();
        let config = AuditConfig {
            backend: AuditBackend::File,
            path: Some(dir.path().join("audit.jsonl")),
        };
        let sink = create_audit_sink(&config).await.unwrap();
        sink.append(AuditEntry::new(
            "issue-1",
            "svc-A/high_cpu",
            Outcome::NoApplicableAction,
            "system",
        ))
        .await
        .unwrap();
        assert!(dir.path().join("audit.jsonl").exists());
    }
}
