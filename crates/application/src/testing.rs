//! In-memory test doubles for the ports.

#![allow(clippy::missing_panics_doc)]

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::ports::{DirEntry, EntryType, EventSource, FileStore, FileStoreError, WatchError};
use crate::watcher::{EventSink, RawEvent};

#[derive(Debug, Default)]
struct MemoryState {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
    fail_writes: bool,
    unlistable: BTreeSet<PathBuf>,
}

impl MemoryState {
    fn is_dir(&self, path: &Path) -> bool {
        self.dirs.contains(path)
            || self
                .files
                .keys()
                .chain(self.dirs.iter())
                .any(|p| p != path && p.starts_with(path))
    }

    fn entry_type(&self, path: &Path) -> Option<EntryType> {
        if self.files.contains_key(path) {
            Some(EntryType::File)
        } else if self.is_dir(path) {
            Some(EntryType::Dir)
        } else {
            None
        }
    }
}

/// A [`FileStore`] backed by a map. Clones share state, so a test can edit
/// "the disk" behind an index's back.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryFileStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a file directly, bypassing failure injection.
    pub fn put(&self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) {
        self.state
            .lock()
            .files
            .insert(path.as_ref().to_path_buf(), contents.as_ref().to_vec());
    }

    /// Current content of a file.
    #[must_use]
    pub fn get(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.state.lock().files.get(path.as_ref()).cloned()
    }

    /// Whether a file or directory exists.
    #[must_use]
    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.state.lock().entry_type(path.as_ref()).is_some()
    }

    /// Removes a file or directory tree directly.
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut state = self.state.lock();
        state.files.retain(|p, _| !p.starts_with(path));
        state.dirs.retain(|p| !p.starts_with(path));
    }

    /// Makes every mutating operation fail with a permission error.
    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    /// Makes `list_dir` of exactly `path` fail with a permission error.
    pub fn fail_list_dir(&self, path: impl AsRef<Path>, fail: bool) {
        let path = path.as_ref().to_path_buf();
        let mut state = self.state.lock();
        if fail {
            state.unlistable.insert(path);
        } else {
            state.unlistable.remove(&path);
        }
    }

    fn check_writable(&self, operation: &'static str, path: &Path) -> Result<(), FileStoreError> {
        if self.state.lock().fail_writes {
            return Err(FileStoreError::Io {
                operation,
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "writes disabled"),
            });
        }
        Ok(())
    }
}

impl FileStore for MemoryFileStore {
    async fn read(&self, path: &Path) -> Result<Vec<u8>, FileStoreError> {
        self.get(path)
            .ok_or_else(|| FileStoreError::NotFound(path.to_path_buf()))
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> Result<(), FileStoreError> {
        self.check_writable("write", path)?;
        let mut state = self.state.lock();
        if state.is_dir(path) {
            return Err(FileStoreError::Io {
                operation: "write",
                path: path.to_path_buf(),
                source: io::Error::other("is a directory"),
            });
        }
        state.files.insert(path.to_path_buf(), contents.to_vec());
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<(), FileStoreError> {
        self.check_writable("delete", path)?;
        self.state
            .lock()
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| FileStoreError::NotFound(path.to_path_buf()))
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), FileStoreError> {
        self.check_writable("create_dir_all", path)?;
        self.state.lock().dirs.insert(path.to_path_buf());
        Ok(())
    }

    async fn remove_dir_all(&self, path: &Path) -> Result<(), FileStoreError> {
        self.check_writable("remove_dir_all", path)?;
        if !self.state.lock().is_dir(path) {
            return Err(FileStoreError::NotFound(path.to_path_buf()));
        }
        self.remove(path);
        Ok(())
    }

    async fn list_dir(&self, path: &Path) -> Result<Vec<DirEntry>, FileStoreError> {
        let state = self.state.lock();
        if state.unlistable.contains(path) {
            return Err(FileStoreError::Io {
                operation: "list_dir",
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "listing disabled"),
            });
        }
        if !state.is_dir(path) {
            return Err(FileStoreError::NotFound(path.to_path_buf()));
        }

        let mut entries: BTreeMap<String, bool> = BTreeMap::new();
        let files = state.files.keys().map(|p| (p, false));
        let dirs = state.dirs.iter().map(|p| (p, true));
        for (candidate, is_dir) in files.chain(dirs) {
            let Ok(relative) = candidate.strip_prefix(path) else {
                continue;
            };
            let mut components = relative.components();
            let Some(first) = components.next() else {
                continue;
            };
            let name = first.as_os_str().to_string_lossy().into_owned();
            let nested = components.next().is_some();
            *entries.entry(name).or_default() |= is_dir || nested;
        }

        Ok(entries
            .into_iter()
            .map(|(name, is_dir)| DirEntry { name, is_dir })
            .collect())
    }

    async fn entry_type(&self, path: &Path) -> Result<Option<EntryType>, FileStoreError> {
        Ok(self.state.lock().entry_type(path))
    }
}

/// Guard returned by [`ManualEventSource::watch`].
#[derive(Debug)]
pub struct ManualGuard;

/// An [`EventSource`] driven by the test: events are injected with
/// [`Self::emit`] and a dead watcher is simulated with [`Self::disconnect`].
#[derive(Debug, Default)]
pub struct ManualEventSource {
    sink: Mutex<Option<EventSink>>,
    watches: AtomicUsize,
    fail_watch: AtomicBool,
}

impl ManualEventSource {
    /// Creates a source with no active watch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers an event to the current watch, as a platform watcher would:
    /// it is dropped if the channel is full. Returns false if no watch is
    /// active.
    pub fn emit(&self, event: RawEvent) -> bool {
        self.sink
            .lock()
            .as_ref()
            .is_some_and(|sink| sink.send(event))
    }

    /// Drops the sink, as if the platform watcher had died.
    pub fn disconnect(&self) {
        self.sink.lock().take();
    }

    /// Number of successful `watch` calls.
    #[must_use]
    pub fn watch_count(&self) -> usize {
        self.watches.load(Ordering::SeqCst)
    }

    /// Makes later `watch` calls fail.
    pub fn fail_watch(&self, fail: bool) {
        self.fail_watch.store(fail, Ordering::SeqCst);
    }
}

impl EventSource for ManualEventSource {
    type Guard = ManualGuard;

    fn watch(&self, root: &Path, sink: EventSink) -> Result<Self::Guard, WatchError> {
        if self.fail_watch.load(Ordering::SeqCst) {
            return Err(WatchError::new(root, "watching disabled"));
        }
        *self.sink.lock() = Some(sink);
        self.watches.fetch_add(1, Ordering::SeqCst);
        Ok(ManualGuard)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_list_dir_includes_implicit_directories() {
        let store = MemoryFileStore::new();
        store.put("/c/collection.yaml", "x");
        store.put("/c/users/list.request.yaml", "y");
        store.create_dir_all(Path::new("/c/empty")).await.unwrap();

        let names: Vec<(String, bool)> = store
            .list_dir(Path::new("/c"))
            .await
            .unwrap()
            .into_iter()
            .map(|e| (e.name, e.is_dir))
            .collect();
        assert_eq!(
            names,
            vec![
                ("collection.yaml".to_string(), false),
                ("empty".to_string(), true),
                ("users".to_string(), true),
            ]
        );
        assert_eq!(
            store.entry_type(Path::new("/c/users")).await.unwrap(),
            Some(EntryType::Dir)
        );
        assert!(store.list_dir(Path::new("/nope")).await.unwrap_err().is_not_found());
    }
}
