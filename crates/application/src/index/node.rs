//! Arena nodes of the collection tree.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use courier_domain::NodeId;
use courier_domain::persistence::{OrderKey, PersistenceFolder, SavedRequest};

/// What a node holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The collection root directory.
    Root,
    /// A directory.
    Folder {
        /// Metadata from `folder.yaml`, or synthesized from the directory name.
        meta: PersistenceFolder,
        /// Whether `folder.yaml` exists on disk.
        has_meta_file: bool,
    },
    /// A request file.
    Request(SavedRequest),
}

/// A folder or request in the tree. Parent and children are ids, never owners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Path-derived identifier.
    pub id: NodeId,
    /// Containing folder; `None` only for the root.
    pub parent: Option<NodeId>,
    /// Direct children (folders and requests).
    pub children: BTreeSet<NodeId>,
    /// Payload.
    pub kind: NodeKind,
}

impl Node {
    pub(crate) const fn root() -> Self {
        Self {
            id: NodeId::root(),
            parent: None,
            children: BTreeSet::new(),
            kind: NodeKind::Root,
        }
    }

    pub(crate) fn folder(id: NodeId, meta: PersistenceFolder, has_meta_file: bool) -> Self {
        Self {
            parent: id.parent(),
            id,
            children: BTreeSet::new(),
            kind: NodeKind::Folder {
                meta,
                has_meta_file,
            },
        }
    }

    pub(crate) fn request(id: NodeId, request: SavedRequest) -> Self {
        Self {
            parent: id.parent(),
            id,
            children: BTreeSet::new(),
            kind: NodeKind::Request(request),
        }
    }

    /// Display name. Empty for the root.
    #[must_use]
    pub fn name(&self) -> &str {
        match &self.kind {
            NodeKind::Root => "",
            NodeKind::Folder { meta, .. } => &meta.name,
            NodeKind::Request(request) => &request.name,
        }
    }

    /// Explicit sibling order key.
    #[must_use]
    pub const fn order(&self) -> Option<OrderKey> {
        match &self.kind {
            NodeKind::Root => None,
            NodeKind::Folder { meta, .. } => meta.order,
            NodeKind::Request(request) => request.order,
        }
    }

    /// True for the root and folders.
    #[must_use]
    pub const fn is_container(&self) -> bool {
        matches!(self.kind, NodeKind::Root | NodeKind::Folder { .. })
    }

    /// The request payload, if this is a request.
    #[must_use]
    pub const fn as_request(&self) -> Option<&SavedRequest> {
        match &self.kind {
            NodeKind::Request(request) => Some(request),
            _ => None,
        }
    }

    /// Sibling ordering: explicit keys first (ascending), then name, then
    /// file name. Never returns `Equal` for distinct ids.
    #[must_use]
    pub fn sibling_cmp(&self, other: &Self) -> Ordering {
        let key = |node: &Self| (node.order().is_none(), node.order().unwrap_or_default());
        key(self)
            .cmp(&key(other))
            .then_with(|| self.name().cmp(other.name()))
            .then_with(|| self.id.file_name().cmp(other.id.file_name()))
            .then_with(|| self.id.cmp(&other.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: &str, name: &str, order: Option<OrderKey>) -> Node {
        let mut saved = SavedRequest::new(name, "http://x");
        saved.order = order;
        Node::request(NodeId::parse(id).unwrap_or_default(), saved)
    }

    #[test]
    fn test_explicit_order_before_missing() {
        let ordered = request("b.request.yaml", "B", Some(5));
        let unordered = request("a.request.yaml", "A", None);
        assert_eq!(ordered.sibling_cmp(&unordered), Ordering::Less);
    }

    #[test]
    fn test_duplicate_order_tie_breaks_on_name_then_file() {
        let first = request("z.request.yaml", "Alpha", Some(1));
        let second = request("a.request.yaml", "Beta", Some(1));
        assert_eq!(first.sibling_cmp(&second), Ordering::Less);

        let same_name_a = request("a.request.yaml", "Same", Some(1));
        let same_name_b = request("b.request.yaml", "Same", Some(1));
        assert_eq!(same_name_a.sibling_cmp(&same_name_b), Ordering::Less);
    }

    #[test]
    fn test_parent_is_derived_from_id() {
        let node = request("users/list.request.yaml", "List", None);
        assert_eq!(node.parent, NodeId::parse("users").ok());
    }
}
