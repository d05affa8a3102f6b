use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use remedy_audit::error::AuditError;
use remedy_audit::record::{AuditEntry, AuditPage, AuditQuery};
use remedy_audit::store::AuditSink;

/// In-memory audit sink using `DashMap`. Suitable for development and testing.
///
/// Entries are keyed by their sequence number, with a secondary index from
/// issue signature to sequence numbers.
pub struct MemoryAuditSink {
    /// Primary store: sequence -> `AuditEntry`.
    entries: DashMap<u64, AuditEntry>,
    /// Secondary index: issue signature -> sequences.
    signature_index: DashMap<String, Vec<u64>>,
    next_sequence: AtomicU64,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            signature_index: DashMap::new(),
            next_sequence: AtomicU64::new(1),
        }
    }

    /// All entries recorded for an issue signature, oldest first.
    pub fn entries_for_signature(&self, signature: &str) -> Vec<AuditEntry> {
        let Some(seqs) = self.signature_index.get(signature) else {
            return Vec::new();
        };
        let mut found: Vec<AuditEntry> = seqs
            .value()
            .iter()
            .filter_map(|seq| self.entries.get(seq).map(|e| e.value().clone()))
            .collect();
        found.sort_by_key(|e| e.sequence);
        found
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, mut entry: AuditEntry) -> Result<(), AuditError> {
        let seq = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        entry.sequence = seq;
        self.signature_index
            .entry(entry.issue_signature.clone())
            .or_default()
            .push(seq);
        self.entries.insert(seq, entry);
        Ok(())
    }

    async fn query(&self, query: &AuditQuery) -> Result<AuditPage, AuditError> {
        // Narrow through the index when the query pins a signature.
        let candidates: Vec<AuditEntry> = match query.issue_signature.as_deref() {
            Some(signature) => self.entries_for_signature(signature),
            None => self.entries.iter().map(|e| e.value().clone()).collect(),
        };
        Ok(query.paginate(candidates))
    }
}
