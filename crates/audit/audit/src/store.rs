use async_trait::async_trait;

use crate::error::AuditError;
use crate::record::{AuditEntry, AuditPage, AuditQuery};

/// Append-only destination for audit entries.
///
/// Implementations must be `Send + Sync` to be shared across async tasks and
/// must make each `append` atomic; the engine relies on nothing else.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persist an entry. The sink assigns `sequence`.
    async fn append(&self, entry: AuditEntry) -> Result<(), AuditError>;

    /// Query entries with filters and pagination, oldest first.
    async fn query(&self, query: &AuditQuery) -> Result<AuditPage, AuditError>;
}
