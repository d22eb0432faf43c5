//! OS filesystem notifications through `notify`.

use std::path::{Path, PathBuf};

use courier_application::ports::{EventSource, WatchError};
use courier_application::watcher::{EventSink, RawEvent, RawEventKind};
use courier_domain::persistence::layout;
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

/// [`EventSource`] backed by the platform's recommended watcher
/// (inotify, FSEvents, `ReadDirectoryChangesW`).
#[derive(Debug, Clone, Default)]
pub struct NotifyEventSource {
    config: Config,
}

impl NotifyEventSource {
    /// Creates a source with the default `notify` configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source with a custom `notify` configuration.
    #[must_use]
    pub const fn with_config(config: Config) -> Self {
        Self { config }
    }
}

/// Keeps the platform watcher alive; dropping it stops the watch.
pub struct NotifyGuard {
    _watcher: RecommendedWatcher,
}

impl std::fmt::Debug for NotifyGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyGuard").finish_non_exhaustive()
    }
}

impl EventSource for NotifyEventSource {
    type Guard = NotifyGuard;

    fn watch(&self, root: &Path, sink: EventSink) -> Result<Self::Guard, WatchError> {
        let forwarder = Forwarder::new(root, sink);
        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| match result {
                Ok(event) => forwarder.forward(&event),
                Err(e) => warn!(error = %e, "Filesystem watcher error"),
            },
            self.config,
        )
        .map_err(|e| WatchError::new(root, e.to_string()))?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| WatchError::new(root, e.to_string()))?;

        info!(root = %root.display(), "Watching collection");
        Ok(NotifyGuard { _watcher: watcher })
    }
}

/// Filters and translates events, then pushes them without blocking. A full
/// channel drops the event and makes the worker rescan.
struct Forwarder {
    root: PathBuf,
    /// Some platforms report canonical paths (`/private/var/...` for
    /// `/var/...`); those are mapped back onto `root`.
    canonical_root: Option<PathBuf>,
    sink: EventSink,
}

impl Forwarder {
    fn new(root: &Path, sink: EventSink) -> Self {
        let canonical_root = std::fs::canonicalize(root)
            .ok()
            .filter(|canonical| canonical != root);
        Self {
            root: root.to_path_buf(),
            canonical_root,
            sink,
        }
    }

    fn forward(&self, event: &Event) {
        for raw in translate(event) {
            let Some((path, relative)) = self.rebase(&raw.path) else {
                continue;
            };
            if layout::is_ignored(&relative) {
                continue;
            }

            if !self.sink.send(RawEvent::new(path, raw.kind)) {
                debug!("Event channel closed");
                return;
            }
        }
    }

    /// Absolute path under `root` and the path relative to it.
    fn rebase(&self, path: &Path) -> Option<(PathBuf, PathBuf)> {
        if let Ok(relative) = path.strip_prefix(&self.root) {
            return Some((path.to_path_buf(), relative.to_path_buf()));
        }
        let relative = path.strip_prefix(self.canonical_root.as_ref()?).ok()?;
        Some((self.root.join(relative), relative.to_path_buf()))
    }
}

/// Maps one `notify` event to raw events. Access and metadata-only events
/// are dropped.
fn translate(event: &Event) -> Vec<RawEvent> {
    let each = |kind: RawEventKind| -> Vec<RawEvent> {
        event
            .paths
            .iter()
            .map(|path| RawEvent::new(path.clone(), kind))
            .collect()
    };

    match &event.kind {
        EventKind::Create(_) => each(RawEventKind::Created),
        EventKind::Remove(_) => each(RawEventKind::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
            [from, to, ..] => vec![RawEvent::removed(from.clone()), RawEvent::created(to.clone())],
            _ => each(RawEventKind::Modified),
        },
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => each(RawEventKind::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => each(RawEventKind::Created),
        EventKind::Modify(ModifyKind::Metadata(_)) | EventKind::Access(_) => Vec::new(),
        // The worker checks what is actually on disk.
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => each(RawEventKind::Modified),
    }
}
