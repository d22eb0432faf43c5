//! Request store
//!
//! Entry point for the command layer. A [`RequestStore`] owns the file
//! store and event source; each opened collection gets its own
//! [`CollectionHandle`] with an independent index, write journal and
//! supervised watcher.

mod handle;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use chrono::Utc;
use courier_domain::persistence::{self, layout};
use courier_domain::{Document, DomainError, PersistenceCollection};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use handle::CollectionHandle;

pub use crate::watcher::StoreEvent;

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::index::CollectionIndex;
use crate::ports::{EventSource, FileStore};
use crate::watcher::{JournaledStore, ReconcileWorker, Supervisor, WatchSession, WriteJournal};

/// Creates and opens collections.
pub struct RequestStore<F, W> {
    files: Arc<F>,
    source: Arc<W>,
    config: StoreConfig,
}

impl<F: FileStore, W: EventSource> RequestStore<F, W> {
    /// Creates a store over `files`, watching through `source`.
    #[must_use]
    pub fn new(files: Arc<F>, source: W, config: StoreConfig) -> Self {
        Self {
            files,
            source: Arc::new(source),
            config,
        }
    }

    /// The configuration new handles are opened with.
    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The event source handles watch through.
    #[must_use]
    pub fn event_source(&self) -> &W {
        &self.source
    }

    /// Creates a new collection at `root` and opens it.
    ///
    /// Writes `collection.yaml` and an empty `environments/` directory.
    ///
    /// # Errors
    ///
    /// - `AlreadyExists` if `root` already holds a collection.
    /// - `Domain` for an empty name.
    /// - `Io` if the files cannot be written.
    pub async fn create_collection(
        &self,
        root: impl Into<PathBuf>,
        name: &str,
    ) -> StoreResult<CollectionHandle<F>> {
        let root = root.into();
        if name.trim().is_empty() {
            return Err(DomainError::EmptyField("name".to_string()).into());
        }

        let collection_path = root.join(layout::COLLECTION_FILE);
        if self.files.exists(&collection_path).await {
            return Err(StoreError::AlreadyExists(root.display().to_string()));
        }

        let document =
            Document::Collection(PersistenceCollection::new(name).with_created_at(Utc::now()));
        let bytes = persistence::encode(&document)
            .map_err(|e| StoreError::codec(&collection_path, e))?;
        self.files.create_dir_all(&root.join(layout::ENVIRONMENTS_DIR)).await?;
        self.files.write(&collection_path, &bytes).await?;
        info!(root = %root.display(), collection = name, "Collection created");

        self.open_collection(root).await
    }

    /// Opens the collection at `root` and starts watching it.
    ///
    /// The watch is established before the directory is scanned so no edit
    /// made during loading is missed.
    ///
    /// # Errors
    ///
    /// - `Watch` if the directory cannot be watched.
    /// - `NotFound`, `Decode`, `VersionUnsupported` or `Io` for
    ///   `collection.yaml`.
    pub async fn open_collection(
        &self,
        root: impl Into<PathBuf>,
    ) -> StoreResult<CollectionHandle<F>> {
        let root = root.into();
        let journal = Arc::new(WriteJournal::new(self.config.settle_window));
        let store = Arc::new(JournaledStore::new(
            Arc::clone(&self.files),
            Arc::clone(&journal),
        ));

        let session =
            WatchSession::start(self.source.as_ref(), &root, self.config.event_capacity)?;
        let index = Arc::new(CollectionIndex::load(root.clone(), store).await?);
        for warning in index.warnings() {
            warn!(
                path = %warning.path.display(),
                reason = %warning.reason,
                "Skipped while loading"
            );
        }

        let (events, _) = broadcast::channel(self.config.event_capacity);
        let worker = ReconcileWorker::new(
            Arc::clone(&index),
            journal,
            events.clone(),
            self.config.debounce,
        );
        let cancel = CancellationToken::new();
        let running = Arc::new(AtomicBool::new(true));
        let supervisor = Supervisor::new(
            worker,
            Arc::clone(&self.source),
            root,
            self.config.clone(),
            cancel.clone(),
            Arc::clone(&running),
        );
        let task = tokio::spawn(supervisor.run(session));

        Ok(CollectionHandle::new(index, events, cancel, running, task))
    }
}
