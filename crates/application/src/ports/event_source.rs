//! Filesystem event source port.

use std::path::{Path, PathBuf};

use crate::watcher::EventSink;

/// Error raised when a watch cannot be established.
#[derive(Debug, thiserror::Error)]
#[error("cannot watch {}: {reason}", path.display())]
pub struct WatchError {
    /// Root that was to be watched.
    pub path: PathBuf,
    /// Human-readable cause.
    pub reason: String,
}

impl WatchError {
    /// Creates a new watch error.
    #[must_use]
    pub fn new(path: &Path, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Source of raw filesystem change notifications.
///
/// Implementations push events for paths under `root` into `sink` without
/// blocking; an event that does not fit is dropped and triggers a rescan.
/// Watching stops when the returned guard is dropped.
pub trait EventSource: Send + Sync + 'static {
    /// Keeps the watch alive while held.
    type Guard: Send + 'static;

    /// Starts watching `root` recursively.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform watcher cannot be created.
    fn watch(&self, root: &Path, sink: EventSink) -> Result<Self::Guard, WatchError>;
}
