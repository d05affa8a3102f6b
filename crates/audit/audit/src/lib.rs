pub mod error;
pub mod record;
pub mod store;

pub use error::AuditError;
pub use record::{AuditEntry, AuditPage, AuditQuery};
pub use store::AuditSink;
