//! Collection index
//!
//! The in-memory tree of one collection, kept consistent with its directory.
//!
//! Mutations follow one order: validate against the tree under a read lock,
//! encode, write through the [`FileStore`] with no lock held, then apply under
//! the write lock. Any failure before the last step leaves the tree untouched.
//!
//! Writers of the tree (local mutations, reconcile batches and rescans) are
//! serialized by one async lock, so a batch read from disk before a local
//! save can never be applied after it.

mod change;
mod load;
mod node;
mod tree;

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use courier_domain::persistence::layout::{self, ENVIRONMENTS_DIR, FOLDER_FILE};
use courier_domain::persistence::{self, OrderKey};
use courier_domain::{
    Document, DomainError, Environment, NodeId, PersistenceCollection, SavedRequest,
};
use parking_lot::RwLock;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

pub use change::{Change, ChangeSet};
pub use load::LoadWarning;
pub(crate) use load::scan_subtree;
pub use node::{Node, NodeKind};
pub use tree::{Tree, relative_id};

use crate::error::{StoreError, StoreResult};
use crate::ports::FileStore;

/// In-memory view of a collection directory.
pub struct CollectionIndex<S> {
    root: PathBuf,
    store: Arc<S>,
    tree: RwLock<Tree>,
    warnings: RwLock<Vec<LoadWarning>>,
    mutations: Mutex<()>,
}

enum RemoveTarget {
    File(PathBuf),
    Dir(PathBuf),
}

impl<S: FileStore> CollectionIndex<S> {
    /// Loads the collection at `root`.
    ///
    /// A missing or invalid `collection.yaml` is fatal. Every other file that
    /// fails to read or decode is left out and reported by [`Self::warnings`].
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `Decode`, `VersionUnsupported` or `Io` for the
    /// collection file.
    pub async fn load(root: impl Into<PathBuf>, store: Arc<S>) -> StoreResult<Self> {
        let root = root.into();
        let collection = load::read_collection(&root, store.as_ref()).await?;

        let mut tree = Tree::new(collection);
        let (changes, warnings) = scan_subtree(&root, store.as_ref(), &NodeId::root()).await;
        for change in &changes {
            tree.apply(change);
        }

        info!(
            collection = %tree.collection().name,
            root = %root.display(),
            nodes = tree.len(),
            warnings = warnings.len(),
            "Collection loaded"
        );

        Ok(Self {
            root,
            store,
            tree: RwLock::new(tree),
            warnings: RwLock::new(warnings),
            mutations: Mutex::new(()),
        })
    }

    /// Collection root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The file store this index writes through.
    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Absolute path of a node or file id.
    #[must_use]
    pub fn path_of(&self, id: &NodeId) -> PathBuf {
        self.root.join(id.to_relative_path())
    }

    // ---- queries -------------------------------------------------------

    /// Collection metadata.
    #[must_use]
    pub fn collection(&self) -> PersistenceCollection {
        self.tree.read().collection().clone()
    }

    /// Looks up a node.
    #[must_use]
    pub fn find(&self, id: &NodeId) -> Option<Node> {
        self.tree.read().node(id).cloned()
    }

    /// Direct children of a folder (or the root) in sibling order.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id and `InvalidOperation` for a request.
    pub fn list_children(&self, folder_id: &NodeId) -> StoreResult<Vec<Node>> {
        let tree = self.tree.read();
        let folder = tree
            .node(folder_id)
            .ok_or_else(|| StoreError::NotFound(folder_id.to_string()))?;
        if !folder.is_container() {
            return Err(StoreError::InvalidOperation(format!(
                "{folder_id} is not a folder"
            )));
        }
        Ok(tree
            .children(folder_id)
            .unwrap_or_default()
            .into_iter()
            .cloned()
            .collect())
    }

    /// Looks up an environment by id (`environments/<slug>.yaml`).
    #[must_use]
    pub fn environment(&self, id: &NodeId) -> Option<Environment> {
        self.tree.read().environment(id).cloned()
    }

    /// All environments, in id order.
    #[must_use]
    pub fn environments(&self) -> Vec<(NodeId, Environment)> {
        self.tree
            .read()
            .environments()
            .map(|(id, env)| (id.clone(), env.clone()))
            .collect()
    }

    /// Files that changed on disk but could not be applied.
    #[must_use]
    pub fn stale_nodes(&self) -> BTreeMap<NodeId, String> {
        self.tree.read().stale().clone()
    }

    /// Entries skipped by the initial load.
    #[must_use]
    pub fn warnings(&self) -> Vec<LoadWarning> {
        self.warnings.read().clone()
    }

    /// A copy of the whole tree, for equality checks.
    #[must_use]
    pub fn snapshot(&self) -> Tree {
        self.tree.read().clone()
    }

    /// First request (in id order) whose display name is `name`.
    #[must_use]
    pub fn find_request_by_name(&self, name: &str) -> Option<(NodeId, SavedRequest)> {
        self.tree
            .read()
            .requests()
            .into_iter()
            .find(|(_, request)| request.name == name)
            .map(|(id, request)| (id.clone(), request.clone()))
    }

    /// Human-readable consistency issues: duplicate sibling order keys and
    /// stale files.
    #[must_use]
    pub fn check_integrity(&self) -> Vec<String> {
        let tree = self.tree.read();
        let mut issues = Vec::new();

        for container in tree.containers() {
            let mut by_order: BTreeMap<OrderKey, Vec<&str>> = BTreeMap::new();
            for child in tree.children(&container.id).unwrap_or_default() {
                if let Some(order) = child.order() {
                    by_order.entry(order).or_default().push(child.id.file_name());
                }
            }
            for (order, names) in by_order.into_iter().filter(|(_, n)| n.len() > 1) {
                issues.push(format!(
                    "duplicate order {order} in {}: {}",
                    container.id,
                    names.join(", ")
                ));
            }
        }

        for (path, reason) in tree.stale() {
            issues.push(format!("stale {path}: {reason}"));
        }

        issues
    }

    // ---- mutations -----------------------------------------------------

    /// Waits until no other writer is between reading the disk and applying
    /// to the tree. Held by reconcile batches across read and apply.
    pub async fn lock_mutations(&self) -> MutexGuard<'_, ()> {
        self.mutations.lock().await
    }

    /// Creates a folder, request or environment under `parent`.
    ///
    /// The file name is derived from the display name. Requests and folders
    /// without an order key are placed after their ordered siblings.
    /// Environments always go to `environments/`; `parent` must be the root.
    ///
    /// # Errors
    ///
    /// - `NotFound` if `parent` does not exist.
    /// - `AlreadyExists` if the derived file or directory exists.
    /// - `InvalidOperation`/`Domain` for invalid input.
    /// - `Io` if the write fails; the tree is then unchanged.
    pub async fn insert(&self, parent: &NodeId, mut document: Document) -> StoreResult<NodeId> {
        let _mutation = self.mutations.lock().await;
        let (node_id, file_id) = {
            let tree = self.tree.read();
            let parent_node = tree
                .node(parent)
                .ok_or_else(|| StoreError::NotFound(parent.to_string()))?;
            if !parent_node.is_container() {
                return Err(StoreError::InvalidOperation(format!(
                    "{parent} is not a folder"
                )));
            }

            let (node_id, file_id) = match &document {
                Document::Request(request) => {
                    request.validate()?;
                    let id = parent.join(&layout::request_file_name(&request.name)?);
                    (id.clone(), id)
                }
                Document::Folder(folder) => {
                    let id = parent.join(&layout::folder_dir_name(&folder.name)?);
                    let file = id.join(FOLDER_FILE);
                    (id, file)
                }
                Document::Environment(environment) => {
                    if !parent.is_root() {
                        return Err(StoreError::InvalidOperation(
                            "environments live at the collection root".to_string(),
                        ));
                    }
                    environment.variables.validate()?;
                    let id = NodeId::root()
                        .join(ENVIRONMENTS_DIR)
                        .join(&layout::environment_file_name(&environment.name)?);
                    (id.clone(), id)
                }
                Document::Collection(_) => {
                    return Err(StoreError::InvalidOperation(
                        "a collection cannot be inserted into itself".to_string(),
                    ));
                }
            };

            if tree.node(&node_id).is_some() || tree.environment(&node_id).is_some() {
                return Err(StoreError::AlreadyExists(node_id.to_string()));
            }
            if document.order().is_none()
                && let Some(order) = tree.next_order(parent)
            {
                document.set_order(order);
            }
            (node_id, file_id)
        };

        // Untracked files (e.g. ones that failed to decode) are not overwritten.
        let target = self.path_of(&node_id);
        if self.store.exists(&target).await {
            return Err(StoreError::AlreadyExists(node_id.to_string()));
        }

        self.persist(&file_id, &document).await?;
        self.tree.write().apply(&Change::Upsert {
            path: file_id,
            document,
        });

        debug!(id = %node_id, "Inserted");
        Ok(node_id)
    }

    /// Replaces the content of an existing request, folder, environment or
    /// (with the root id) the collection metadata. The file keeps its name.
    ///
    /// # Errors
    ///
    /// - `NotFound` if `id` does not exist.
    /// - `InvalidOperation` if the document kind does not match the node.
    /// - `Io` if the write fails; the tree is then unchanged.
    pub async fn update(&self, id: &NodeId, document: Document) -> StoreResult<()> {
        let _mutation = self.mutations.lock().await;
        let file_id = {
            let tree = self.tree.read();
            let node = tree.node(id);
            match &document {
                Document::Request(request) => {
                    request.validate()?;
                    match node {
                        Some(n) if n.as_request().is_some() => id.clone(),
                        Some(_) => return Err(not_a(id, "request")),
                        None => return Err(StoreError::NotFound(id.to_string())),
                    }
                }
                Document::Folder(folder) => {
                    if folder.name.trim().is_empty() {
                        return Err(DomainError::EmptyField("name".to_string()).into());
                    }
                    match node {
                        Some(Node {
                            kind: NodeKind::Folder { .. },
                            ..
                        }) => id.join(FOLDER_FILE),
                        Some(_) => return Err(not_a(id, "folder")),
                        None => return Err(StoreError::NotFound(id.to_string())),
                    }
                }
                Document::Environment(environment) => {
                    environment.variables.validate()?;
                    if tree.environment(id).is_none() {
                        return Err(StoreError::NotFound(id.to_string()));
                    }
                    id.clone()
                }
                Document::Collection(collection) => {
                    if !id.is_root() {
                        return Err(not_a(id, "collection root"));
                    }
                    if collection.name.trim().is_empty() {
                        return Err(DomainError::EmptyField("name".to_string()).into());
                    }
                    collection.variables.validate()?;
                    NodeId::root().join(layout::COLLECTION_FILE)
                }
            }
        };

        self.persist(&file_id, &document).await?;
        self.tree.write().apply(&Change::Upsert {
            path: file_id,
            document,
        });

        debug!(%id, "Updated");
        Ok(())
    }

    /// Deletes a request, environment or folder (recursively).
    ///
    /// # Errors
    ///
    /// - `NotFound` if `id` does not exist.
    /// - `InvalidOperation` for the root.
    /// - `Io` if the deletion fails; the tree is then unchanged.
    pub async fn remove(&self, id: &NodeId) -> StoreResult<()> {
        let _mutation = self.mutations.lock().await;
        let target = {
            let tree = self.tree.read();
            if id.is_root() {
                return Err(StoreError::InvalidOperation(
                    "the collection root cannot be removed".to_string(),
                ));
            }
            if tree.environment(id).is_some() {
                RemoveTarget::File(self.path_of(id))
            } else {
                match tree.node(id).map(|n| &n.kind) {
                    Some(NodeKind::Request(_)) => RemoveTarget::File(self.path_of(id)),
                    Some(NodeKind::Folder { .. }) => RemoveTarget::Dir(self.path_of(id)),
                    Some(NodeKind::Root) | None => {
                        return Err(StoreError::NotFound(id.to_string()));
                    }
                }
            }
        };

        let result = match &target {
            RemoveTarget::File(path) => self.store.delete(path).await,
            RemoveTarget::Dir(path) => self.store.remove_dir_all(path).await,
        };
        match result {
            Ok(()) => {}
            // Already gone on disk; just sync the tree.
            Err(e) if e.is_not_found() => debug!(%id, "Removed entry was already missing"),
            Err(e) => return Err(e.into()),
        }

        self.tree.write().apply(&Change::Remove(id.clone()));
        debug!(%id, "Removed");
        Ok(())
    }

    /// Applies externally observed, already decoded changes.
    ///
    /// Idempotent. Returns whether the tree changed. Callers that read the
    /// changes from disk hold [`Self::lock_mutations`] while doing so.
    pub fn reconcile(&self, changes: &ChangeSet) -> bool {
        if changes.is_empty() {
            return false;
        }
        let mut tree = self.tree.write();
        let mut changed = false;
        for change in changes {
            changed |= tree.apply(change);
        }
        changed
    }

    /// Re-reads the whole directory and reconciles the tree with it.
    ///
    /// Used after the watcher was down or dropped events. Entries that
    /// disappeared are removed; files that no longer decode are marked stale.
    /// Nothing under a directory that could not be listed is removed.
    /// Returns whether the tree changed.
    pub async fn rescan(&self) -> bool {
        let _mutation = self.mutations.lock().await;
        let store = self.store.as_ref();
        let mut changes = ChangeSet::new();
        let collection_id = NodeId::root().join(layout::COLLECTION_FILE);
        match load::read_collection(&self.root, store).await {
            Ok(collection) => changes.push(Change::Upsert {
                path: collection_id,
                document: Document::Collection(collection),
            }),
            Err(e) => changes.push(Change::Stale {
                path: collection_id,
                reason: e.to_string(),
            }),
        }

        let (scanned, warnings) = scan_subtree(&self.root, store, &NodeId::root()).await;
        let seen: HashSet<NodeId> = scanned.paths().into_iter().collect();
        let mut unreadable = Vec::new();
        let mut stale = Vec::new();
        for warning in warnings {
            if let Some(id) = relative_id(&self.root, &warning.path) {
                unreadable.push(id.clone());
                stale.push(Change::Stale {
                    path: id,
                    reason: warning.reason,
                });
            }
        }

        let tracked = self.tree.read().tracked_paths();
        let (kept, gone): (Vec<NodeId>, Vec<NodeId>) = tracked
            .into_iter()
            .filter(|path| !seen.contains(path))
            .partition(|path| unreadable.iter().any(|dir| path.starts_with(dir)));
        if !kept.is_empty() {
            warn!(
                root = %self.root.display(),
                kept = kept.len(),
                "Keeping entries under unreadable paths"
            );
        }
        for path in gone {
            changes.push(Change::Remove(path));
        }
        for change in scanned.iter().cloned().chain(stale) {
            changes.push(change);
        }

        let changed = self.reconcile(&changes);
        debug!(root = %self.root.display(), changed, "Rescanned collection");
        changed
    }

    async fn persist(&self, file_id: &NodeId, document: &Document) -> StoreResult<()> {
        let path = self.path_of(file_id);
        let bytes = persistence::encode(document).map_err(|e| StoreError::codec(&path, e))?;
        self.store.write(&path, &bytes).await?;
        Ok(())
    }
}

fn not_a(id: &NodeId, what: &str) -> StoreError {
    StoreError::InvalidOperation(format!("{id} is not a {what}"))
}
