//! Handle to one open collection.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use courier_domain::persistence::layout::{self, ENVIRONMENTS_DIR};
use courier_domain::{
    Document, Environment, NodeId, PersistenceCollection, PersistenceFolder, ResolutionContext,
    ResolvedRequest, SavedRequest,
};
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::index::{CollectionIndex, LoadWarning, Node, NodeKind};
use crate::ports::FileStore;
use crate::variable_resolver::{ResolveError, VariableResolver, extract_variable_names};
use crate::watcher::{JournaledStore, StoreEvent};

/// An open collection: its index, its watcher, and the active environment.
///
/// Obtained from [`RequestStore::open_collection`](super::RequestStore::open_collection).
/// Dropping the handle stops the watcher; [`Self::close`] also waits for it.
pub struct CollectionHandle<F: FileStore> {
    index: Arc<CollectionIndex<JournaledStore<F>>>,
    events: broadcast::Sender<StoreEvent>,
    active_environment: RwLock<Option<NodeId>>,
    cancel: CancellationToken,
    running: Arc<AtomicBool>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl<F: FileStore> CollectionHandle<F> {
    pub(super) fn new(
        index: Arc<CollectionIndex<JournaledStore<F>>>,
        events: broadcast::Sender<StoreEvent>,
        cancel: CancellationToken,
        running: Arc<AtomicBool>,
        supervisor: JoinHandle<()>,
    ) -> Self {
        Self {
            index,
            events,
            active_environment: RwLock::new(None),
            cancel,
            running,
            supervisor: Mutex::new(Some(supervisor)),
        }
    }

    /// Collection root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.index.root()
    }

    /// The underlying index.
    #[must_use]
    pub const fn index(&self) -> &Arc<CollectionIndex<JournaledStore<F>>> {
        &self.index
    }

    /// Collection metadata.
    #[must_use]
    pub fn collection(&self) -> PersistenceCollection {
        self.index.collection()
    }

    /// Replaces the collection metadata and variables.
    ///
    /// # Errors
    ///
    /// Returns `Domain` for invalid input or `Io` if the write fails.
    pub async fn save_collection(&self, collection: PersistenceCollection) -> StoreResult<()> {
        self.index
            .update(&NodeId::root(), Document::Collection(collection))
            .await
    }

    // ---- requests and folders ----------------------------------------------

    /// Requests directly inside a folder (or the root), in sibling order.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `InvalidOperation` as [`Self::list_children`].
    pub fn list_requests(&self, folder_id: &NodeId) -> StoreResult<Vec<(NodeId, SavedRequest)>> {
        Ok(self
            .index
            .list_children(folder_id)?
            .into_iter()
            .filter_map(|node| match node.kind {
                NodeKind::Request(request) => Some((node.id, request)),
                _ => None,
            })
            .collect())
    }

    /// Folders and requests directly inside a folder, in sibling order.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id and `InvalidOperation` for a request.
    pub fn list_children(&self, folder_id: &NodeId) -> StoreResult<Vec<Node>> {
        self.index.list_children(folder_id)
    }

    /// Looks up a request.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `id` is not a request.
    pub fn get_request(&self, id: &NodeId) -> StoreResult<SavedRequest> {
        self.index
            .find(id)
            .and_then(|node| node.as_request().cloned())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// First request whose display name is `name`.
    #[must_use]
    pub fn find_request_by_name(&self, name: &str) -> Option<(NodeId, SavedRequest)> {
        self.index.find_request_by_name(name)
    }

    /// Creates a request under `parent_id`; the file name is derived from
    /// the request name.
    ///
    /// # Errors
    ///
    /// See [`CollectionIndex::insert`].
    pub async fn create_request(
        &self,
        parent_id: &NodeId,
        request: SavedRequest,
    ) -> StoreResult<NodeId> {
        self.index
            .insert(parent_id, Document::Request(request))
            .await
    }

    /// Overwrites an existing request. The file name does not change.
    ///
    /// # Errors
    ///
    /// See [`CollectionIndex::update`].
    pub async fn save_request(&self, id: &NodeId, request: SavedRequest) -> StoreResult<()> {
        self.index.update(id, Document::Request(request)).await
    }

    /// Deletes a request file.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `id` is not a request, or `Io`.
    pub async fn delete_request(&self, id: &NodeId) -> StoreResult<()> {
        match self.index.find(id) {
            Some(node) if node.as_request().is_some() => self.index.remove(id).await,
            Some(_) => Err(StoreError::InvalidOperation(format!(
                "{id} is not a request"
            ))),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    /// Creates a folder (directory plus `folder.yaml`) under `parent_id`.
    ///
    /// # Errors
    ///
    /// See [`CollectionIndex::insert`].
    pub async fn create_folder(&self, parent_id: &NodeId, name: &str) -> StoreResult<NodeId> {
        self.index
            .insert(parent_id, Document::Folder(PersistenceFolder::new(name)))
            .await
    }

    /// Deletes a folder and everything in it.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `id` is not a folder, or `Io`.
    pub async fn delete_folder(&self, id: &NodeId) -> StoreResult<()> {
        match self.index.find(id).map(|node| node.kind) {
            Some(NodeKind::Folder { .. }) => self.index.remove(id).await,
            Some(_) => Err(StoreError::InvalidOperation(format!("{id} is not a folder"))),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    // ---- environments --------------------------------------------------------

    /// All environments, in id order.
    #[must_use]
    pub fn list_environments(&self) -> Vec<(NodeId, Environment)> {
        self.index.environments()
    }

    /// Creates or overwrites `environments/<slug>.yaml` for `environment`.
    ///
    /// # Errors
    ///
    /// Returns `Domain` for an invalid name or duplicate keys, or `Io`.
    pub async fn save_environment(&self, environment: Environment) -> StoreResult<NodeId> {
        let id = NodeId::root()
            .join(ENVIRONMENTS_DIR)
            .join(&layout::environment_file_name(&environment.name)?);
        if self.index.environment(&id).is_some() {
            self.index
                .update(&id, Document::Environment(environment))
                .await?;
            Ok(id)
        } else {
            self.index
                .insert(&NodeId::root(), Document::Environment(environment))
                .await
        }
    }

    /// Deletes an environment file. Clears the active environment if it was
    /// this one.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `id` is not an environment, or `Io`.
    pub async fn delete_environment(&self, id: &NodeId) -> StoreResult<()> {
        if self.index.environment(id).is_none() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.index.remove(id).await?;
        let mut active = self.active_environment.write();
        if active.as_ref() == Some(id) {
            *active = None;
        }
        Ok(())
    }

    /// Selects the environment used for resolution, or none.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `id` is not an environment.
    pub fn set_active_environment(&self, id: Option<NodeId>) -> StoreResult<()> {
        if let Some(id) = &id
            && self.index.environment(id).is_none()
        {
            return Err(StoreError::NotFound(id.to_string()));
        }
        debug!(environment = ?id, "Active environment changed");
        *self.active_environment.write() = id;
        Ok(())
    }

    /// The active environment, if one is selected and still exists.
    #[must_use]
    pub fn active_environment(&self) -> Option<(NodeId, Environment)> {
        let id = self.active_environment.read().clone()?;
        self.index
            .environment(&id)
            .map(|environment| (id, environment))
    }

    // ---- resolution -----------------------------------------------------------

    /// Builds the scopes used for resolution: `overrides`, the active
    /// environment and the collection variables.
    #[must_use]
    pub fn resolution_context(&self, overrides: BTreeMap<String, String>) -> ResolutionContext {
        let mut context = ResolutionContext::new()
            .with_runtime(overrides)
            .with_collection(&self.index.collection().variables);
        if let Some((_, environment)) = self.active_environment() {
            context = context.with_environment(&environment);
        }
        context
    }

    /// Resolves every variable a request refers to.
    ///
    /// Names that no scope binds are left out of the map.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown request and `CircularReference` if
    /// a reference chain loops or nests too deep.
    pub fn resolve_variables(
        &self,
        request_id: &NodeId,
        overrides: BTreeMap<String, String>,
    ) -> StoreResult<BTreeMap<String, String>> {
        let request = self.get_request(request_id)?;
        let resolver = VariableResolver::new(self.resolution_context(overrides));

        let names = request
            .templates()
            .into_iter()
            .flat_map(extract_variable_names);

        let mut values = BTreeMap::new();
        for name in names {
            if values.contains_key(&name) {
                continue;
            }
            match resolver.resolve(&name) {
                Ok(resolved) => {
                    values.insert(name, resolved.value);
                }
                Err(ResolveError::Unresolved(_)) => debug!(%name, "Variable is not bound"),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(values)
    }

    /// Snapshot of a request with every template substituted, ready to hand
    /// to a protocol executor. Unbound placeholders stay literal.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown request and `CircularReference` if
    /// a reference chain loops or nests too deep.
    pub fn resolved_request(
        &self,
        request_id: &NodeId,
        overrides: BTreeMap<String, String>,
    ) -> StoreResult<ResolvedRequest> {
        let request = self.get_request(request_id)?;
        let resolver = VariableResolver::new(self.resolution_context(overrides));

        let mut failure = None;
        let resolved = ResolvedRequest::from_saved(&request, |template| {
            match resolver.resolve_template(template) {
                Ok(result) => result.resolved,
                Err(e) => {
                    failure.get_or_insert(e);
                    template.to_string()
                }
            }
        });

        match failure {
            Some(e) => Err(e.into()),
            None => Ok(resolved),
        }
    }

    // ---- status ---------------------------------------------------------------

    /// Entries skipped when the collection was opened.
    #[must_use]
    pub fn warnings(&self) -> Vec<LoadWarning> {
        self.index.warnings()
    }

    /// Files changed on disk that could not be applied.
    #[must_use]
    pub fn stale_nodes(&self) -> BTreeMap<NodeId, String> {
        self.index.stale_nodes()
    }

    /// Duplicate order keys and stale files, as readable messages.
    #[must_use]
    pub fn check_integrity(&self) -> Vec<String> {
        self.index.check_integrity()
    }

    /// Subscribes to change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Whether external edits are still being picked up.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.cancel.is_cancelled()
    }

    /// Stops the watcher and waits for any reconcile in progress.
    ///
    /// Calling it again is a no-op.
    pub async fn close(&self) {
        self.cancel.cancel();
        let supervisor = self.supervisor.lock().take();
        let Some(supervisor) = supervisor else {
            return;
        };
        if let Err(e) = supervisor.await {
            warn!(root = %self.root().display(), error = %e, "Watcher task failed");
        }
        self.running.store(false, Ordering::SeqCst);
        info!(root = %self.root().display(), "Collection closed");
    }
}

impl<F: FileStore> Drop for CollectionHandle<F> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
