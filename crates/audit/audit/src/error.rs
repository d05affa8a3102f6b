use std::path::PathBuf;

use thiserror::Error;

/// Failures reported by an [`AuditSink`](crate::AuditSink).
#[derive(Debug, Error)]
pub enum AuditError {
    /// The backing file could not be accessed.
    #[error("audit log {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot encode audit entry: {0}")]
    Encode(#[from] serde_json::Error),

    /// The sink is not accepting entries right now.
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

impl AuditError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
