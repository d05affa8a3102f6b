use std::sync::Arc;

use remedy_audit::{AuditEntry, AuditPage, AuditQuery, AuditSink};
use tracing::{debug, error};

use crate::error::EngineError;

/// Append-only record of every decision and outcome.
///
/// Append failures are logged and swallowed so that a broken sink never
/// aborts a remediation.
#[derive(Clone)]
pub struct AuditLog {
    sink: Arc<dyn AuditSink>,
}

impl AuditLog {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    pub async fn record(&self, entry: AuditEntry) {
        let outcome = entry.outcome;
        let signature = entry.issue_signature.clone();
        match self.sink.append(entry).await {
            Ok(()) => debug!(%outcome, signature = %signature, "audit entry recorded"),
            Err(e) => error!(%outcome, signature = %signature, error = %e, "failed to record audit entry"),
        }
    }

    pub async fn query(&self, query: &AuditQuery) -> Result<AuditPage, EngineError> {
        Ok(self.sink.query(query).await?)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use remedy_audit::AuditError;
    use remedy_audit_memory::MemoryAuditSink;
    use remedy_core::Outcome;

    use super::*;

    struct BrokenSink;

    #[async_trait]
    impl AuditSink for BrokenSink {
        async fn append(&self, _entry: AuditEntry) -> Result<(), AuditError> {
            Err(AuditError::Unavailable("disk full".into()))
        }

        async fn query(&self, _query: &AuditQuery) -> Result<AuditPage, AuditError> {
            Err(AuditError::Unavailable("disk full".into()))
        }
    }

    #[tokio::test]
    async fn records_through_sink() {
        let sink = Arc::new(MemoryAuditSink::new());
        let log = AuditLog::new(sink.clone());
        log.record(AuditEntry::new("i", "sig", Outcome::Succeeded, "system"))
            .await;
        let page = log.query(&AuditQuery::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn append_failure_is_swallowed() {
        let log = AuditLog::new(Arc::new(BrokenSink));
        log.record(AuditEntry::new("i", "sig", Outcome::Failed, "system"))
            .await;
        assert!(matches!(
            log.query(&AuditQuery::default()).await,
            Err(EngineError::Audit(_))
        ));
    }
}
