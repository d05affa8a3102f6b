mod store;

pub use store::JsonlAuditSink;
