use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

use remedy_audit::error::AuditError;
use remedy_audit::record::{AuditEntry, AuditPage, AuditQuery};
use remedy_audit::store::AuditSink;

struct Writer {
    file: File,
    next_sequence: u64,
}

/// Audit sink that appends one JSON object per line to a file.
///
/// Appends are serialized through a mutex and flushed before returning, so a
/// line is either fully written or absent. Queries scan the whole file.
pub struct JsonlAuditSink {
    path: PathBuf,
    writer: Mutex<Writer>,
}

impl JsonlAuditSink {
    /// Open (or create) the log at `path`, continuing the sequence of any
    /// entries already present.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AuditError::io(parent, e))?;
        }

        let last_sequence = read_entries(&path)
            .await?
            .iter()
            .map(|e| e.sequence)
            .max()
            .unwrap_or(0);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| AuditError::io(&path, e))?;

        Ok(Self {
            path,
            writer: Mutex::new(Writer {
                file,
                next_sequence: last_sequence + 1,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn read_entries(path: &Path) -> Result<Vec<AuditEntry>, AuditError> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(AuditError::io(path, e)),
    };

    let mut entries = Vec::new();
    for (number, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<AuditEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!(
                path = %path.display(),
                line = number + 1,
                error = %e,
                "skipping unreadable audit line"
            ),
        }
    }
    Ok(entries)
}

#[async_trait]
impl AuditSink for JsonlAuditSink {
    async fn append(&self, mut entry: AuditEntry) -> Result<(), AuditError> {
        let mut writer = self.writer.lock().await;
        entry.sequence = writer.next_sequence;

        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        writer
            .file
            .write_all(&line)
            .await
            .map_err(|e| AuditError::io(&self.path, e))?;
        writer
            .file
            .flush()
            .await
            .map_err(|e| AuditError::io(&self.path, e))?;

        writer.next_sequence += 1;
        Ok(())
    }

    async fn query(&self, query: &AuditQuery) -> Result<AuditPage, AuditError> {
        // Hold the writer so a half-written line is never observed.
        let _writer = self.writer.lock().await;
        let entries = read_entries(&self.path).await?;
        Ok(query.paginate(entries))
    }
}

#[cfg(test)]
mod tests {
    use remedy_audit::record::{AuditEntry, AuditQuery};
    use remedy_audit::store::AuditSink;
    use remedy_core::Outcome;

    use super::JsonlAuditSink;

    #[tokio::test]
    async fn appends_one_line_per_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = JsonlAuditSink::open(&path).await.unwrap();

        sink.append(AuditEntry::new("i1", "a", Outcome::Succeeded, "system"))
            .await
            .unwrap();
        sink.append(AuditEntry::new("i2", "b", Outcome::Deduplicated, "system"))
            .await
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);

        let page = sink.query(&AuditQuery::default()).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.entries[0].sequence, 1);
        assert_eq!(page.entries[1].outcome, Outcome::Deduplicated);
    }

    #[tokio::test]
    async fn reopening_continues_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("audit.jsonl");

        {
            let sink = JsonlAuditSink::open(&path).await.unwrap();
            sink.append(AuditEntry::new("i1", "a", Outcome::Succeeded, "system"))
                .await
                .unwrap();
        }

        let sink = JsonlAuditSink::open(&path).await.unwrap();
        sink.append(AuditEntry::new("i2", "a", Outcome::Failed, "system"))
            .await
            .unwrap();

        let q = AuditQuery {
            outcome: Some(Outcome::Failed),
            ..Default::default()
        };
        let page = sink.query(&q).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.entries[0].sequence, 2);
    }

    #[tokio::test]
    async fn unreadable_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        std::fs::write(&path, "not json\n").unwrap();

        let sink = JsonlAuditSink::open(&path).await.unwrap();
        sink.append(AuditEntry::new("i1", "a", Outcome::Succeeded, "system"))
            .await
            .unwrap();

        let page = sink.query(&AuditQuery::default()).await.unwrap();
        assert_eq!(page.total, 1);
    }
}
