//! Decoded changes applied to the tree.

use courier_domain::{Document, NodeId};

/// One decoded change, keyed by the id of the file or directory it concerns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// A file was created or modified and decoded successfully.
    Upsert {
        /// Id of the file (`users/folder.yaml`, `environments/dev.yaml`, ...).
        path: NodeId,
        /// Decoded content.
        document: Document,
    },
    /// A directory exists and should be a folder.
    EnsureFolder(NodeId),
    /// A file or directory is gone.
    Remove(NodeId),
    /// A file exists but could not be read or decoded.
    Stale {
        /// Id of the file.
        path: NodeId,
        /// Why it could not be applied.
        reason: String,
    },
}

impl Change {
    /// Id of the file or directory the change concerns.
    #[must_use]
    pub const fn path(&self) -> &NodeId {
        match self {
            Self::Upsert { path, .. } | Self::Stale { path, .. } => path,
            Self::EnsureFolder(path) | Self::Remove(path) => path,
        }
    }
}

/// An ordered batch of changes, applied together under one write lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    /// Creates an empty change set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            changes: Vec::new(),
        }
    }

    /// Appends a change.
    pub fn push(&mut self, change: Change) {
        self.changes.push(change);
    }

    /// Iterates over the changes in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Change> {
        self.changes.iter()
    }

    /// Number of changes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Returns true if there are no changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Ids touched by this set, in order.
    #[must_use]
    pub fn paths(&self) -> Vec<NodeId> {
        self.changes.iter().map(|c| c.path().clone()).collect()
    }
}

impl FromIterator<Change> for ChangeSet {
    fn from_iter<T: IntoIterator<Item = Change>>(iter: T) -> Self {
        Self {
            changes: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a Change;
    type IntoIter = std::slice::Iter<'a, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}
