use serde::Deserialize;

/// Bounds for the issue ingestion queue.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngestConfig {
    /// Issues buffered before `POST /v1/issues` answers 503.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Issues handled concurrently. Issues waiting on an approval hold a
    /// slot.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_max_concurrent() -> usize {
    64
}
