//! Journal of the store's own writes, for self-write suppression.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tokio::time::Instant;

/// Hex-encoded SHA-256 of `bytes`.
#[must_use]
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// What a path looks like after a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// A file with this content hash.
    File(String),
    /// A directory.
    Dir,
    /// Nothing.
    Missing,
}

impl Observation {
    /// Observation of a file holding `bytes`.
    #[must_use]
    pub fn file(bytes: &[u8]) -> Self {
        Self::File(content_hash(bytes))
    }
}

#[derive(Debug)]
struct Entry {
    token: u64,
    path: PathBuf,
    observation: Observation,
    /// `None` while the write is in flight.
    settled_at: Option<Instant>,
}

/// Remembers what the store itself wrote so the watcher can skip the echo.
///
/// A notification is an echo only if the path's current state equals what
/// the store wrote. A concurrent external edit changes the content hash and
/// is therefore never suppressed.
#[derive(Debug)]
pub struct WriteJournal {
    settle_window: Duration,
    next_token: AtomicU64,
    entries: Mutex<Vec<Entry>>,
}

impl WriteJournal {
    /// Creates an empty journal.
    #[must_use]
    pub const fn new(settle_window: Duration) -> Self {
        Self {
            settle_window,
            next_token: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Records an intended write. Call before touching the disk.
    pub fn record(&self, path: &Path, observation: Observation) -> u64 {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().push(Entry {
            token,
            path: path.to_path_buf(),
            observation,
            settled_at: None,
        });
        token
    }

    /// Marks a recorded write as completed at `now`.
    pub fn settle(&self, token: u64, now: Instant) {
        if let Some(entry) = self.entries.lock().iter_mut().find(|e| e.token == token) {
            entry.settled_at = Some(now);
        }
    }

    /// Forgets a recorded write that failed.
    pub fn abandon(&self, token: u64) {
        self.entries.lock().retain(|e| e.token != token);
    }

    /// Checks whether `current` at `path` is the result of an own write.
    ///
    /// Matches an entry for exactly this path whose observation equals
    /// `current` and which is in flight or settled within the window; such an
    /// entry is consumed. A missing path also matches while an ancestor
    /// directory's recorded removal is live. Expired entries are pruned.
    pub fn is_own_write(&self, path: &Path, current: &Observation, now: Instant) -> bool {
        let mut entries = self.entries.lock();
        let window = self.settle_window;
        entries.retain(|e| {
            e.settled_at
                .is_none_or(|at| now.saturating_duration_since(at) <= window)
        });

        if let Some(position) = entries
            .iter()
            .position(|e| e.path == path && e.observation == *current)
        {
            entries.remove(position);
            return true;
        }

        *current == Observation::Missing
            && entries.iter().any(|e| {
                e.observation == Observation::Missing && path.starts_with(&e.path) && e.path != path
            })
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if no entries are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
