//! Per-path debouncing of raw events.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use tokio::time::Instant;

use super::event::{RawEvent, RawEventKind};

#[derive(Debug, Clone, Copy)]
struct Pending {
    kind: RawEventKind,
    last_seen: Instant,
}

/// Coalesces bursts of events per path.
///
/// A path becomes ready once no event for it has arrived for the whole
/// window. The last kind wins, except that a removal followed by a creation
/// (an editor's save-by-replace) collapses to a modification.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: HashMap<PathBuf, Pending>,
}

impl Debouncer {
    /// Creates a debouncer with the given quiet window.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    /// Records an event seen at `now`.
    pub fn push(&mut self, event: RawEvent, now: Instant) {
        self.pending
            .entry(event.path)
            .and_modify(|pending| {
                pending.kind = match (pending.kind, event.kind) {
                    (RawEventKind::Removed, RawEventKind::Created) => RawEventKind::Modified,
                    (_, latest) => latest,
                };
                pending.last_seen = now;
            })
            .or_insert(Pending {
                kind: event.kind,
                last_seen: now,
            });
    }

    /// Removes and returns every path whose window has elapsed, sorted by path.
    pub fn flush_ready(&mut self, now: Instant) -> Vec<RawEvent> {
        let window = self.window;
        let mut ready: Vec<RawEvent> = Vec::new();
        self.pending.retain(|path, pending| {
            if now.saturating_duration_since(pending.last_seen) >= window {
                ready.push(RawEvent::new(path.clone(), pending.kind));
                false
            } else {
                true
            }
        });
        ready.sort_by(|a, b| a.path.cmp(&b.path));
        ready
    }

    /// Earliest instant at which some path becomes ready.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending
            .values()
            .map(|pending| pending.last_seen + self.window)
            .min()
    }

    /// Number of paths waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
