//! The single reconcile task of an open collection.

use std::sync::Arc;
use std::time::Duration;

use courier_domain::NodeId;
use courier_domain::persistence::{self, layout};
use tokio::sync::broadcast;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::StoreEvent;
use super::debounce::Debouncer;
use super::event::RawEvent;
use super::journal::{Observation, WriteJournal};
use super::sink::EventStream;
use crate::index::{Change, ChangeSet, CollectionIndex, relative_id, scan_subtree};
use crate::ports::{EntryType, FileStore};

/// Why a worker run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The cancellation token fired.
    Cancelled,
    /// Every event sender is gone; the event source died.
    ChannelClosed,
}

/// Receives raw events, debounces them, and folds the resulting file state
/// into the index.
pub struct ReconcileWorker<S> {
    index: Arc<CollectionIndex<S>>,
    journal: Arc<WriteJournal>,
    events: broadcast::Sender<StoreEvent>,
    debounce: Duration,
}

impl<S> Clone for ReconcileWorker<S> {
    fn clone(&self) -> Self {
        Self {
            index: Arc::clone(&self.index),
            journal: Arc::clone(&self.journal),
            events: self.events.clone(),
            debounce: self.debounce,
        }
    }
}

impl<S: FileStore> ReconcileWorker<S> {
    /// Creates a worker for `index`.
    #[must_use]
    pub const fn new(
        index: Arc<CollectionIndex<S>>,
        journal: Arc<WriteJournal>,
        events: broadcast::Sender<StoreEvent>,
        debounce: Duration,
    ) -> Self {
        Self {
            index,
            journal,
            events,
            debounce,
        }
    }

    /// The index this worker keeps up to date.
    #[must_use]
    pub const fn index(&self) -> &Arc<CollectionIndex<S>> {
        &self.index
    }

    /// Sender for change notifications.
    #[must_use]
    pub const fn events(&self) -> &broadcast::Sender<StoreEvent> {
        &self.events
    }

    /// Runs until cancelled or until the event channel closes.
    ///
    /// A batch that has started is always finished before cancellation is
    /// observed. If the channel overflowed, the whole collection is rescanned
    /// once no event has arrived for the debounce window.
    pub async fn run(self, stream: EventStream, cancel: CancellationToken) -> WorkerExit {
        let EventStream {
            mut receiver,
            overflow,
        } = stream;
        let mut debouncer = Debouncer::new(self.debounce);
        let mut rescan_at: Option<Instant> = None;

        loop {
            let deadline = match (debouncer.next_deadline(), rescan_at) {
                (Some(batch), Some(rescan)) => Some(batch.min(rescan)),
                (batch, rescan) => batch.or(rescan),
            };
            tokio::select! {
                biased;
                () = cancel.cancelled() => return WorkerExit::Cancelled,
                received = receiver.recv() => match received {
                    Some(event) => {
                        let now = Instant::now();
                        if rescan_at.is_some() {
                            rescan_at = Some(now + self.debounce);
                        }
                        debouncer.push(event, now);
                    }
                    None => return WorkerExit::ChannelClosed,
                },
                () = overflow.notified() => {
                    rescan_at = Some(Instant::now() + self.debounce);
                }
                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    let now = Instant::now();
                    let batch = debouncer.flush_ready(now);
                    if !batch.is_empty() {
                        self.apply_batch(batch).await;
                    }
                    if rescan_at.is_some_and(|at| at <= now) {
                        rescan_at = None;
                        self.rescan_dropped().await;
                    }
                }
            }
        }
    }

    /// Reads, filters and decodes a debounced batch, then reconciles it.
    ///
    /// Local mutations wait while a batch is in flight. Returns whether the
    /// index changed.
    pub async fn apply_batch(&self, batch: Vec<RawEvent>) -> bool {
        let _mutation = self.index.lock_mutations().await;
        let mut changes = ChangeSet::new();
        for event in batch {
            self.collect(&event, &mut changes).await;
        }
        if changes.is_empty() {
            return false;
        }

        let paths = changes.paths();
        let changed = self.index.reconcile(&changes);
        if changed {
            info!(
                collection = %self.index.root().display(),
                changes = paths.len(),
                "Reconciled external changes"
            );
            // No subscribers is fine.
            let _ = self.events.send(StoreEvent::Refreshed { paths });
        }
        changed
    }

    async fn rescan_dropped(&self) {
        warn!(
            collection = %self.index.root().display(),
            "Change events were dropped, rescanning collection"
        );
        if self.index.rescan().await {
            let _ = self.events.send(StoreEvent::Refreshed {
                paths: vec![NodeId::root()],
            });
        }
    }

    async fn collect(&self, event: &RawEvent, changes: &mut ChangeSet) {
        let root = self.index.root();
        let Some(id) = relative_id(root, &event.path) else {
            return;
        };
        let relative = id.to_relative_path();
        if id.is_root() || layout::is_ignored(&relative) {
            return;
        }

        let store = self.index.store().as_ref();
        let path = event.path.as_path();
        let now = Instant::now();

        let entry = match store.entry_type(path).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot stat changed path");
                changes.push(Change::Stale {
                    path: id,
                    reason: e.to_string(),
                });
                return;
            }
        };

        match entry {
            None => {
                if self.journal.is_own_write(path, &Observation::Missing, now) {
                    debug!(path = %path.display(), "Skipping own removal");
                    return;
                }
                changes.push(Change::Remove(id));
            }
            Some(EntryType::Dir) => {
                if self.journal.is_own_write(path, &Observation::Dir, now) {
                    debug!(path = %path.display(), "Skipping own directory");
                    return;
                }
                let (scanned, warnings) = scan_subtree(root, store, &id).await;
                for change in &scanned {
                    changes.push(change.clone());
                }
                for warning in warnings {
                    if let Some(file_id) = relative_id(root, &warning.path) {
                        changes.push(Change::Stale {
                            path: file_id,
                            reason: warning.reason,
                        });
                    }
                }
            }
            Some(EntryType::File) => {
                let Some(kind) = layout::classify(&relative) else {
                    return;
                };
                let bytes = match store.read(path).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Changed file could not be read");
                        changes.push(Change::Stale {
                            path: id,
                            reason: e.to_string(),
                        });
                        return;
                    }
                };
                if self
                    .journal
                    .is_own_write(path, &Observation::file(&bytes), now)
                {
                    debug!(path = %path.display(), "Skipping own write");
                    return;
                }
                match persistence::decode(kind.document_kind(), &bytes) {
                    Ok(document) => changes.push(Change::Upsert { path: id, document }),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Changed file is invalid");
                        changes.push(Change::Stale {
                            path: id,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::ports::{DirEntry, FileStoreError};
    use crate::testing::MemoryFileStore;
    use crate::watcher::event_channel;
    use courier_domain::{Document, SavedRequest};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::path::{Path, PathBuf};
    use tokio::sync::Notify;

    const ROOT: &str = "/c";

    fn event_for(root: &Path, relative: &str) -> RawEvent {
        RawEvent::modified(root.join(relative))
    }

    async fn worker(
        store: &MemoryFileStore,
    ) -> (
        ReconcileWorker<MemoryFileStore>,
        broadcast::Receiver<StoreEvent>,
    ) {
        store.put("/c/collection.yaml", "version: 1\nname: Demo\n");
        store.put(
            "/c/ping.request.yaml",
            "version: 1\nname: ping\nmethod: GET\nurl: https://a\n",
        );
        let index = Arc::new(
            CollectionIndex::load(ROOT, Arc::new(store.clone()))
                .await
                .unwrap(),
        );
        let (events, receiver) = broadcast::channel(16);
        let journal = Arc::new(WriteJournal::new(Duration::from_secs(2)));
        (
            ReconcileWorker::new(index, journal, events, Duration::from_millis(10)),
            receiver,
        )
    }

    fn id(raw: &str) -> NodeId {
        NodeId::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_external_edit_is_applied_and_broadcast() {
        let store = MemoryFileStore::new();
        let (worker, mut events) = worker(&store).await;

        store.put(
            "/c/ping.request.yaml",
            "version: 1\nname: ping\nmethod: POST\nurl: https://b\n",
        );
        assert!(worker.apply_batch(vec![event_for(Path::new(ROOT), "ping.request.yaml")]).await);

        let node = worker.index().find(&id("ping.request.yaml")).unwrap();
        assert_eq!(node.as_request().unwrap().url, "https://b");
        assert_eq!(
            events.try_recv().unwrap(),
            StoreEvent::Refreshed {
                paths: vec![id("ping.request.yaml")]
            }
        );
    }

    #[tokio::test]
    async fn test_invalid_edit_marks_stale() {
        let store = MemoryFileStore::new();
        let (worker, _events) = worker(&store).await;

        store.put("/c/ping.request.yaml", "version: 1\nname: ping\n");
        worker
            .apply_batch(vec![event_for(Path::new(ROOT), "ping.request.yaml")])
            .await;

        let stale = worker.index().stale_nodes();
        assert!(stale.contains_key(&id("ping.request.yaml")));
        // The last good version is kept.
        assert!(worker.index().find(&id("ping.request.yaml")).is_some());
    }

    #[tokio::test]
    async fn test_removed_file_is_removed() {
        let store = MemoryFileStore::new();
        let (worker, _events) = worker(&store).await;

        store.remove("/c/ping.request.yaml");
        worker
            .apply_batch(vec![RawEvent::removed("/c/ping.request.yaml")])
            .await;
        assert!(worker.index().find(&id("ping.request.yaml")).is_none());
    }

    #[tokio::test]
    async fn test_new_directory_is_scanned() {
        let store = MemoryFileStore::new();
        let (worker, _events) = worker(&store).await;

        store.put(
            "/c/admin/users/list.request.yaml",
            "version: 1\nname: list\nmethod: GET\nurl: https://a\n",
        );
        worker.apply_batch(vec![RawEvent::created("/c/admin")]).await;
        assert!(worker.index().find(&id("admin/users/list.request.yaml")).is_some());
    }

    #[tokio::test]
    async fn test_own_write_is_suppressed() {
        let store = MemoryFileStore::new();
        let (worker, mut events) = worker(&store).await;

        let bytes = b"version: 1\nname: ping\nmethod: PUT\nurl: https://own\n";
        let token = worker
            .journal
            .record(Path::new("/c/ping.request.yaml"), Observation::file(bytes));
        store.put("/c/ping.request.yaml", bytes.as_slice());
        worker.journal.settle(token, Instant::now());

        assert!(!worker.apply_batch(vec![event_for(Path::new(ROOT), "ping.request.yaml")]).await);
        assert!(events.try_recv().is_err());
        let node = worker.index().find(&id("ping.request.yaml")).unwrap();
        assert_eq!(node.as_request().unwrap().url, "https://a");
    }

    #[tokio::test]
    async fn test_ignored_paths_are_skipped() {
        let store = MemoryFileStore::new();
        let (worker, _events) = worker(&store).await;
        store.put("/c/.ping.request.yaml.123.tmp", "garbage");
        assert!(!worker
            .apply_batch(vec![event_for(Path::new(ROOT), ".ping.request.yaml.123.tmp")])
            .await);
        assert!(!worker.apply_batch(vec![RawEvent::modified("/elsewhere/x")]).await);
    }

    #[tokio::test]
    async fn test_run_debounces_and_stops_on_cancel() {
        let store = MemoryFileStore::new();
        let (worker, mut events) = worker(&store).await;
        let index = Arc::clone(worker.index());
        let (sink, stream) = event_channel(8);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(worker.run(stream, cancel.clone()));

        store.put(
            "/c/ping.request.yaml",
            "version: 1\nname: ping\nmethod: GET\nurl: https://c\n",
        );
        for _ in 0..3 {
            assert!(sink.send(RawEvent::modified("/c/ping.request.yaml")));
        }

        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, StoreEvent::Refreshed { .. }));
        assert_eq!(
            index.find(&id("ping.request.yaml")).unwrap().as_request().unwrap().url,
            "https://c"
        );

        cancel.cancel();
        assert_eq!(handle.await.unwrap(), WorkerExit::Cancelled);
    }

    #[tokio::test]
    async fn test_run_reports_closed_channel() {
        let store = MemoryFileStore::new();
        let (worker, _events) = worker(&store).await;
        let (sink, stream) = event_channel(1);
        drop(sink);
        assert_eq!(
            worker.run(stream, CancellationToken::new()).await,
            WorkerExit::ChannelClosed
        );
    }

    #[tokio::test]
    async fn test_overflow_triggers_rescan() {
        let store = MemoryFileStore::new();
        let (worker, mut events) = worker(&store).await;
        let index = Arc::clone(worker.index());
        let (sink, stream) = event_channel(1);

        for i in 0..5 {
            let path = format!("/c/burst{i}.request.yaml");
            store.put(
                &path,
                format!("version: 1\nname: burst{i}\nmethod: GET\nurl: https://b\n"),
            );
            assert!(sink.send(RawEvent::created(path)));
        }
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(worker.run(stream, cancel.clone()));

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut paths = Vec::new();
        while paths != vec![NodeId::root()] {
            match tokio::time::timeout_at(deadline, events.recv()).await {
                Ok(Ok(StoreEvent::Refreshed { paths: refreshed })) => paths = refreshed,
                other => panic!("no rescan broadcast: {other:?}"),
            }
        }
        for i in 0..5 {
            assert!(index.find(&id(&format!("burst{i}.request.yaml"))).is_some());
        }

        cancel.cancel();
        assert_eq!(handle.await.unwrap(), WorkerExit::Cancelled);
    }

    /// Parks reads of one path until released.
    struct GatedStore {
        inner: MemoryFileStore,
        gated: Mutex<Option<PathBuf>>,
        entered: Notify,
        release: Notify,
    }

    impl FileStore for GatedStore {
        async fn read(&self, path: &Path) -> Result<Vec<u8>, FileStoreError> {
            let parked = self.gated.lock().as_deref() == Some(path);
            if parked {
                self.entered.notify_one();
                self.release.notified().await;
            }
            self.inner.read(path).await
        }

        async fn write(&self, path: &Path, contents: &[u8]) -> Result<(), FileStoreError> {
            self.inner.write(path, contents).await
        }

        async fn delete(&self, path: &Path) -> Result<(), FileStoreError> {
            self.inner.delete(path).await
        }

        async fn create_dir_all(&self, path: &Path) -> Result<(), FileStoreError> {
            self.inner.create_dir_all(path).await
        }

        async fn remove_dir_all(&self, path: &Path) -> Result<(), FileStoreError> {
            self.inner.remove_dir_all(path).await
        }

        async fn list_dir(&self, path: &Path) -> Result<Vec<DirEntry>, FileStoreError> {
            self.inner.list_dir(path).await
        }

        async fn entry_type(&self, path: &Path) -> Result<Option<EntryType>, FileStoreError> {
            self.inner.entry_type(path).await
        }
    }

    #[tokio::test]
    async fn test_local_update_waits_for_batch_in_flight() {
        let inner = MemoryFileStore::new();
        inner.put("/c/collection.yaml", "version: 1\nname: Demo\n");
        inner.put(
            "/c/ping.request.yaml",
            "version: 1\nname: ping\nmethod: GET\nurl: https://v0\n",
        );
        inner.put(
            "/c/slow.request.yaml",
            "version: 1\nname: slow\nmethod: GET\nurl: https://slow\n",
        );
        let store = Arc::new(GatedStore {
            inner: inner.clone(),
            gated: Mutex::new(None),
            entered: Notify::new(),
            release: Notify::new(),
        });
        let index = Arc::new(CollectionIndex::load(ROOT, Arc::clone(&store)).await.unwrap());
        let (events, _receiver) = broadcast::channel(16);
        let journal = Arc::new(WriteJournal::new(Duration::from_secs(2)));
        let worker = ReconcileWorker::new(Arc::clone(&index), journal, events, Duration::ZERO);

        // An external edit is read, then the batch stalls on its next file.
        inner.put(
            "/c/ping.request.yaml",
            "version: 1\nname: ping\nmethod: GET\nurl: https://v1\n",
        );
        *store.gated.lock() = Some(PathBuf::from("/c/slow.request.yaml"));
        let batch = tokio::spawn({
            let worker = worker.clone();
            async move {
                worker
                    .apply_batch(vec![
                        RawEvent::modified("/c/ping.request.yaml"),
                        RawEvent::modified("/c/slow.request.yaml"),
                    ])
                    .await
            }
        });
        store.entered.notified().await;

        let mut update = tokio::spawn({
            let index = Arc::clone(&index);
            async move {
                index
                    .update(
                        &id("ping.request.yaml"),
                        Document::Request(SavedRequest::new("ping", "https://v2")),
                    )
                    .await
            }
        });
        assert!(
            tokio::time::timeout(Duration::from_millis(50), &mut update)
                .await
                .is_err()
        );

        store.release.notify_one();
        batch.await.unwrap();
        update.await.unwrap().unwrap();

        let node = index.find(&id("ping.request.yaml")).unwrap();
        assert_eq!(node.as_request().unwrap().url, "https://v2");
    }
}
