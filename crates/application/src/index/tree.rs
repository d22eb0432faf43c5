//! In-memory arena of the collection.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use courier_domain::persistence::layout::{self, ENVIRONMENTS_DIR, EntryKind, FOLDER_FILE};
use courier_domain::persistence::{OrderKey, PersistenceFolder};
use courier_domain::{Document, Environment, NodeId, PersistenceCollection, SavedRequest};

use super::change::Change;
use super::node::{Node, NodeKind};

/// The whole in-memory view of one collection.
///
/// Nodes live in a flat map keyed by id; parent/child links are ids. A node
/// exists if and only if it is reachable from the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    collection: PersistenceCollection,
    nodes: HashMap<NodeId, Node>,
    environments: BTreeMap<NodeId, Environment>,
    stale: BTreeMap<NodeId, String>,
}

impl Tree {
    /// Creates a tree holding only the root.
    #[must_use]
    pub fn new(collection: PersistenceCollection) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(NodeId::root(), Node::root());
        Self {
            collection,
            nodes,
            environments: BTreeMap::new(),
            stale: BTreeMap::new(),
        }
    }

    /// Collection metadata.
    #[must_use]
    pub const fn collection(&self) -> &PersistenceCollection {
        &self.collection
    }

    /// Looks up a folder, request or the root.
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Number of nodes, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false; the root is never removed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Children of a container in sibling order.
    #[must_use]
    pub fn children(&self, id: &NodeId) -> Option<Vec<&Node>> {
        let node = self.nodes.get(id)?;
        let mut children: Vec<&Node> = node
            .children
            .iter()
            .filter_map(|child| self.nodes.get(child))
            .collect();
        children.sort_by(|a, b| a.sibling_cmp(b));
        Some(children)
    }

    /// Every request in the tree, in id order.
    #[must_use]
    pub fn requests(&self) -> Vec<(&NodeId, &SavedRequest)> {
        let mut requests: Vec<_> = self
            .nodes
            .values()
            .filter_map(|node| node.as_request().map(|r| (&node.id, r)))
            .collect();
        requests.sort_by(|a, b| a.0.cmp(b.0));
        requests
    }

    /// Every container (root and folders), in id order.
    #[must_use]
    pub fn containers(&self) -> Vec<&Node> {
        let mut containers: Vec<&Node> =
            self.nodes.values().filter(|n| n.is_container()).collect();
        containers.sort_by(|a, b| a.id.cmp(&b.id));
        containers
    }

    /// Looks up an environment by its file id.
    #[must_use]
    pub fn environment(&self, id: &NodeId) -> Option<&Environment> {
        self.environments.get(id)
    }

    /// All environments, in id order.
    pub fn environments(&self) -> impl Iterator<Item = (&NodeId, &Environment)> {
        self.environments.iter()
    }

    /// Files that exist but could not be applied, with the reason.
    #[must_use]
    pub const fn stale(&self) -> &BTreeMap<NodeId, String> {
        &self.stale
    }

    /// Ids of every file and directory the tree was built from: folders,
    /// folder meta files, requests and environments. The root is excluded.
    #[must_use]
    pub fn tracked_paths(&self) -> Vec<NodeId> {
        let mut paths: Vec<NodeId> = self.environments.keys().cloned().collect();
        for node in self.nodes.values() {
            match &node.kind {
                NodeKind::Root => {}
                NodeKind::Folder { has_meta_file, .. } => {
                    if *has_meta_file {
                        paths.push(node.id.join(FOLDER_FILE));
                    }
                    paths.push(node.id.clone());
                }
                NodeKind::Request(_) => paths.push(node.id.clone()),
            }
        }
        paths.sort();
        paths
    }

    /// Order key for a new child of `parent`: one past the largest explicit
    /// key, or `None` if no sibling has one.
    #[must_use]
    pub fn next_order(&self, parent: &NodeId) -> Option<OrderKey> {
        self.nodes
            .get(parent)?
            .children
            .iter()
            .filter_map(|child| self.nodes.get(child).and_then(Node::order))
            .max()
            .map(|max| max.saturating_add(1))
    }

    /// Applies one change. Returns whether anything changed.
    ///
    /// Applying the same change twice is a no-op the second time.
    pub fn apply(&mut self, change: &Change) -> bool {
        match change {
            Change::Upsert { path, document } => self.upsert(path, document),
            Change::EnsureFolder(id) => self.ensure_folder(id),
            Change::Remove(path) => self.remove_path(path),
            Change::Stale { path, reason } => self.mark_stale(path, reason),
        }
    }

    fn upsert(&mut self, path: &NodeId, document: &Document) -> bool {
        let mut changed = self.stale.remove(path).is_some();

        changed |= match (layout::classify(&path.to_relative_path()), document) {
            (Some(EntryKind::Collection), Document::Collection(collection)) => {
                replace_if_different(&mut self.collection, collection)
            }
            (Some(EntryKind::Environment), Document::Environment(environment)) => {
                if self.environments.get(path) == Some(environment) {
                    false
                } else {
                    self.environments.insert(path.clone(), environment.clone());
                    true
                }
            }
            (Some(EntryKind::FolderMeta), Document::Folder(folder)) => path
                .parent()
                .is_some_and(|folder_id| self.set_folder_meta(&folder_id, Some(folder))),
            (Some(EntryKind::Request), Document::Request(request)) => {
                self.upsert_request(path, request)
            }
            _ => false,
        };

        changed
    }

    fn upsert_request(&mut self, id: &NodeId, request: &SavedRequest) -> bool {
        let Some(parent) = id.parent() else {
            return false;
        };
        let mut changed = self.ensure_folder(&parent);

        match self.nodes.get(id).map(|node| node.as_request().is_some()) {
            Some(true) => {
                if let Some(Node {
                    kind: NodeKind::Request(existing),
                    ..
                }) = self.nodes.get_mut(id)
                {
                    changed |= replace_if_different(existing, request);
                }
            }
            Some(false) => {
                // A directory was replaced by a file of the same name.
                self.remove_subtree(id);
                changed |= self.attach(Node::request(id.clone(), request.clone()));
            }
            None => {
                changed |= self.attach(Node::request(id.clone(), request.clone()));
            }
        }

        changed
    }

    fn set_folder_meta(&mut self, folder_id: &NodeId, meta: Option<&PersistenceFolder>) -> bool {
        let mut changed = self.ensure_folder(folder_id);

        if let Some(Node {
            kind: NodeKind::Folder {
                meta: current,
                has_meta_file,
            },
            ..
        }) = self.nodes.get_mut(folder_id)
        {
            let (next, from_file) = meta.map_or_else(
                || (PersistenceFolder::new(folder_id.file_name()), false),
                |m| (m.clone(), true),
            );
            changed |= replace_if_different(current, &next);
            changed |= replace_if_different(has_meta_file, &from_file);
        }

        changed
    }

    fn ensure_folder(&mut self, id: &NodeId) -> bool {
        if id.is_root() || id.to_relative_path().starts_with(ENVIRONMENTS_DIR) {
            return false;
        }

        let mut changed = false;
        for folder_id in id.ancestors().into_iter().chain(std::iter::once(id.clone())) {
            if folder_id.is_root() {
                continue;
            }
            match self.nodes.get(&folder_id).map(Node::is_container) {
                Some(true) => {}
                Some(false) => {
                    // A file was replaced by a directory of the same name.
                    self.remove_subtree(&folder_id);
                    changed |= self.attach(synthesized_folder(&folder_id));
                }
                None => {
                    changed |= self.attach(synthesized_folder(&folder_id));
                }
            }
        }
        changed
    }

    fn attach(&mut self, node: Node) -> bool {
        let Some(parent_id) = node.parent.clone() else {
            return false;
        };
        let Some(parent) = self.nodes.get_mut(&parent_id) else {
            return false;
        };
        parent.children.insert(node.id.clone());
        self.nodes.insert(node.id.clone(), node);
        true
    }

    fn remove_path(&mut self, path: &NodeId) -> bool {
        let relative = path.to_relative_path();
        if layout::classify(&relative) == Some(EntryKind::Collection) {
            return self.mark_stale(path, "collection.yaml was removed");
        }

        let mut changed = self.clear_stale_under(path);

        changed |= if layout::is_environments_dir(&relative) {
            let had_any = !self.environments.is_empty();
            self.environments.clear();
            had_any
        } else {
            match layout::classify(&relative) {
                Some(EntryKind::Environment) => self.environments.remove(path).is_some(),
                Some(EntryKind::FolderMeta) => path.parent().is_some_and(|folder_id| {
                    self.nodes.contains_key(&folder_id) && self.set_folder_meta(&folder_id, None)
                }),
                _ => self.remove_subtree(path),
            }
        };

        changed
    }

    fn remove_subtree(&mut self, id: &NodeId) -> bool {
        if id.is_root() {
            return false;
        }
        let Some(node) = self.nodes.remove(id) else {
            return false;
        };

        if let Some(parent) = node.parent.as_ref().and_then(|p| self.nodes.get_mut(p)) {
            parent.children.remove(id);
        }

        let mut pending: Vec<NodeId> = node.children.into_iter().collect();
        while let Some(child_id) = pending.pop() {
            if let Some(child) = self.nodes.remove(&child_id) {
                pending.extend(child.children);
            }
        }
        self.clear_stale_under(id);
        true
    }

    fn clear_stale_under(&mut self, id: &NodeId) -> bool {
        let before = self.stale.len();
        self.stale.retain(|path, _| !path.starts_with(id));
        self.stale.len() != before
    }

    fn mark_stale(&mut self, path: &NodeId, reason: &str) -> bool {
        let exists = match layout::classify(&path.to_relative_path()) {
            Some(EntryKind::Collection) => true,
            Some(EntryKind::Environment) => self.environments.contains_key(path),
            Some(EntryKind::FolderMeta) => path
                .parent()
                .is_some_and(|folder_id| self.nodes.contains_key(&folder_id)),
            Some(EntryKind::Request) => self.nodes.contains_key(path),
            None => false,
        };
        if !exists || self.stale.get(path).is_some_and(|r| r == reason) {
            return false;
        }
        self.stale.insert(path.clone(), reason.to_string());
        true
    }
}

fn synthesized_folder(id: &NodeId) -> Node {
    Node::folder(id.clone(), PersistenceFolder::new(id.file_name()), false)
}

fn replace_if_different<T: Clone + PartialEq>(current: &mut T, next: &T) -> bool {
    if current == next {
        false
    } else {
        current.clone_from(next);
        true
    }
}

/// Relative file id for a path under `root`, if it is one.
#[must_use]
pub fn relative_id(root: &Path, path: &Path) -> Option<NodeId> {
    let relative = path.strip_prefix(root).ok()?;
    NodeId::from_relative_path(relative).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn id(raw: &str) -> NodeId {
        NodeId::parse(raw).unwrap()
    }

    fn upsert_request(path: &str, name: &str, order: Option<OrderKey>) -> Change {
        let mut request = SavedRequest::new(name, "http://x");
        request.order = order;
        Change::Upsert {
            path: id(path),
            document: Document::Request(request),
        }
    }

    fn tree() -> Tree {
        Tree::new(PersistenceCollection::new("Demo"))
    }

    #[test]
    fn test_upsert_creates_missing_ancestors() {
        let mut tree = tree();
        assert!(tree.apply(&upsert_request("a/b/c.request.yaml", "C", None)));

        let a = tree.node(&id("a")).unwrap();
        assert!(a.is_container());
        assert_eq!(a.name(), "a");
        assert!(tree.node(&id("a/b")).unwrap().children.contains(&id("a/b/c.request.yaml")));
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_apply_twice_is_idempotent() {
        let changes = [
            upsert_request("users/list.request.yaml", "List", Some(1)),
            Change::EnsureFolder(id("empty")),
            Change::Upsert {
                path: id("users/folder.yaml"),
                document: Document::Folder(PersistenceFolder::new("Users").with_order(2)),
            },
            Change::Remove(id("gone.request.yaml")),
        ];

        let mut once = tree();
        for change in &changes {
            once.apply(change);
        }
        let mut twice = once.clone();
        for change in &changes {
            assert!(!twice.apply(change));
        }
        assert_eq!(once, twice);
    }

    #[test]
    fn test_children_sorted() {
        let mut tree = tree();
        tree.apply(&upsert_request("z.request.yaml", "Zeta", None));
        tree.apply(&upsert_request("b.request.yaml", "Beta", Some(2)));
        tree.apply(&upsert_request("a.request.yaml", "Alpha", Some(2)));
        tree.apply(&upsert_request("c.request.yaml", "Gamma", Some(-1)));
        tree.apply(&upsert_request("y.request.yaml", "Alpha", None));

        let names: Vec<&str> = tree
            .children(&NodeId::root())
            .unwrap()
            .iter()
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "c.request.yaml",
                "a.request.yaml",
                "b.request.yaml",
                "y.request.yaml",
                "z.request.yaml",
            ]
        );
    }

    #[test]
    fn test_remove_folder_removes_descendants() {
        let mut tree = tree();
        tree.apply(&upsert_request("a/b/c.request.yaml", "C", None));
        tree.apply(&upsert_request("a/d.request.yaml", "D", None));

        assert!(tree.apply(&Change::Remove(id("a"))));
        assert_eq!(tree.len(), 1);
        assert!(tree.children(&NodeId::root()).unwrap().is_empty());
    }

    #[test]
    fn test_folder_meta_removal_resets_to_directory_name() {
        let mut tree = tree();
        tree.apply(&Change::Upsert {
            path: id("auth/folder.yaml"),
            document: Document::Folder(PersistenceFolder::new("Authentication")),
        });
        assert_eq!(tree.node(&id("auth")).unwrap().name(), "Authentication");

        assert!(tree.apply(&Change::Remove(id("auth/folder.yaml"))));
        let folder = tree.node(&id("auth")).unwrap();
        assert_eq!(folder.name(), "auth");
        assert!(matches!(
            folder.kind,
            NodeKind::Folder {
                has_meta_file: false,
                ..
            }
        ));
    }

    #[test]
    fn test_stale_only_for_existing_nodes() {
        let mut tree = tree();
        let stale = Change::Stale {
            path: id("x.request.yaml"),
            reason: "bad".into(),
        };
        assert!(!tree.apply(&stale));
        assert!(tree.stale().is_empty());

        tree.apply(&upsert_request("x.request.yaml", "X", None));
        assert!(tree.apply(&stale));
        assert!(!tree.apply(&stale));
        assert_eq!(tree.stale().get(&id("x.request.yaml")).map(String::as_str), Some("bad"));

        // A later good version clears the mark.
        tree.apply(&upsert_request("x.request.yaml", "X2", None));
        assert!(tree.stale().is_empty());
    }

    #[test]
    fn test_environments() {
        let mut tree = tree();
        let dev = Change::Upsert {
            path: id("environments/dev.yaml"),
            document: Document::Environment(Environment::new("dev")),
        };
        assert!(tree.apply(&dev));
        assert!(tree.environment(&id("environments/dev.yaml")).is_some());
        assert!(tree.node(&id("environments")).is_none());

        assert!(tree.apply(&Change::Remove(id("environments"))));
        assert_eq!(tree.environments().count(), 0);
    }

    #[test]
    fn test_mismatched_document_ignored() {
        let mut tree = tree();
        let change = Change::Upsert {
            path: id("users/list.request.yaml"),
            document: Document::Folder(PersistenceFolder::new("oops")),
        };
        assert!(!tree.apply(&change));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_next_order() {
        let mut tree = tree();
        assert_eq!(tree.next_order(&NodeId::root()), None);
        tree.apply(&upsert_request("a.request.yaml", "A", Some(4)));
        tree.apply(&upsert_request("b.request.yaml", "B", None));
        assert_eq!(tree.next_order(&NodeId::root()), Some(5));
    }

    #[test]
    fn test_relative_id() {
        assert_eq!(
            relative_id(Path::new("/c"), Path::new("/c/users/x.request.yaml")),
            Some(id("users/x.request.yaml"))
        );
        assert_eq!(relative_id(Path::new("/c"), Path::new("/other/x")), None);
    }
}
