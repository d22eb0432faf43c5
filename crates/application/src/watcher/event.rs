//! Raw filesystem events.

use std::path::PathBuf;

/// What happened to a path, as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawEventKind {
    /// The path appeared (including rename targets).
    Created,
    /// The content changed.
    Modified,
    /// The path disappeared (including rename sources).
    Removed,
}

/// A single notification for an absolute path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawEvent {
    /// Absolute path of the affected entry.
    pub path: PathBuf,
    /// What happened.
    pub kind: RawEventKind,
}

impl RawEvent {
    /// Creates a new event.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, kind: RawEventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Shorthand for a `Created` event.
    #[must_use]
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self::new(path, RawEventKind::Created)
    }

    /// Shorthand for a `Modified` event.
    #[must_use]
    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self::new(path, RawEventKind::Modified)
    }

    /// Shorthand for a `Removed` event.
    #[must_use]
    pub fn removed(path: impl Into<PathBuf>) -> Self {
        Self::new(path, RawEventKind::Removed)
    }
}
