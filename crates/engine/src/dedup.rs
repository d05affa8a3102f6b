use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;

type DedupKey = (String, String);

#[derive(Debug, Clone, Copy)]
struct DedupEntry {
    last_admitted_at: Instant,
    /// A request for the pair has not reached a terminal state yet.
    live: bool,
}

/// Suppresses repeated remediation of the same `(signature, action)` pair.
///
/// A pair is admitted when it has never been seen, or when its last
/// admission is at least one window old and the request it produced has
/// finished. Check-and-record happens under the key's shard lock.
#[derive(Debug)]
pub struct DedupWindow {
    window: Duration,
    entries: DashMap<DedupKey, DedupEntry>,
}

impl DedupWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: DashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Admit the pair at `now` and mark it live, or refuse it.
    pub fn try_admit(&self, signature: &str, action: &str, now: Instant) -> bool {
        match self.entries.entry((signature.to_owned(), action.to_owned())) {
            Entry::Vacant(slot) => {
                slot.insert(DedupEntry {
                    last_admitted_at: now,
                    live: true,
                });
                true
            }
            Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();
                if entry.live || !self.expired(entry, now) {
                    return false;
                }
                entry.last_admitted_at = now;
                entry.live = true;
                true
            }
        }
    }

    /// Mark the pair's request as finished. The window keeps running from
    /// the last admission.
    pub fn release(&self, signature: &str, action: &str) {
        if let Some(mut entry) = self
            .entries
            .get_mut(&(signature.to_owned(), action.to_owned()))
        {
            entry.live = false;
        }
    }

    /// Whether [`try_admit`](Self::try_admit) would admit the pair, without
    /// recording anything.
    pub fn would_admit(&self, signature: &str, action: &str, now: Instant) -> bool {
        self.entries
            .get(&(signature.to_owned(), action.to_owned()))
            .is_none_or(|entry| !entry.live && self.expired(&entry, now))
    }

    /// Drop entries whose window has passed and whose request has finished.
    /// Returns the number removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.live || !self.expired(entry, now));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn expired(&self, entry: &DedupEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.last_admitted_at) >= self.window
    }
}
