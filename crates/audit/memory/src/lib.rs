mod store;

pub use store::MemoryAuditSink;
