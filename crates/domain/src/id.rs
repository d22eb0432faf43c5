//! Stable node identifiers.
//!
//! A node is addressed by its path relative to the collection root, always
//! written with `/` separators regardless of platform. The collection root
//! itself is the empty identifier.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Identifier of a folder, request or environment inside a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Returns the identifier of the collection root.
    #[must_use]
    pub const fn root() -> Self {
        Self(String::new())
    }

    /// Parses an identifier such as `users/get-user.request.yaml`.
    ///
    /// # Errors
    ///
    /// Returns an error if a segment is empty, `.` or `..`, or contains a
    /// backslash.
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let trimmed = raw.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        for segment in trimmed.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
                return Err(DomainError::InvalidIdentifier(raw.to_string()));
            }
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Builds an identifier from a path relative to the collection root.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is absolute, climbs out of the root, or is
    /// not valid UTF-8.
    pub fn from_relative_path(path: &Path) -> DomainResult<Self> {
        let mut segments = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => {
                    let part = part.to_str().ok_or_else(|| {
                        DomainError::InvalidIdentifier(path.display().to_string())
                    })?;
                    segments.push(part);
                }
                Component::CurDir => {}
                _ => return Err(DomainError::InvalidIdentifier(path.display().to_string())),
            }
        }
        Ok(Self(segments.join("/")))
    }

    /// Returns true for the collection root.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Converts the identifier back to a relative path.
    #[must_use]
    pub fn to_relative_path(&self) -> PathBuf {
        self.segments().collect()
    }

    /// Iterates over the path segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Number of segments; zero for the root.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Returns the parent identifier, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(
            self.0
                .rsplit_once('/')
                .map_or_else(Self::root, |(parent, _)| Self(parent.to_string())),
        )
    }

    /// Returns the last segment (the file or directory name).
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit_once('/').map_or(self.0.as_str(), |(_, name)| name)
    }

    /// Appends a single segment.
    #[must_use]
    pub fn join(&self, segment: &str) -> Self {
        if self.is_root() {
            Self(segment.to_string())
        } else {
            Self(format!("{}/{segment}", self.0))
        }
    }

    /// Returns true if `self` is `other` or lies beneath it.
    #[must_use]
    pub fn starts_with(&self, other: &Self) -> bool {
        other.is_root()
            || self.0 == other.0
            || (self.0.starts_with(&other.0) && self.0.as_bytes().get(other.0.len()) == Some(&b'/'))
    }

    /// Returns all ancestors from the root down to the direct parent.
    #[must_use]
    pub fn ancestors(&self) -> Vec<Self> {
        let mut chain = Vec::new();
        let mut current = self.parent();
        while let Some(id) = current {
            current = id.parent();
            chain.push(id);
        }
        chain.reverse();
        chain
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "/")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_and_parent() {
        let id = NodeId::parse("users/admin/get.request.yaml").unwrap();
        assert_eq!(id.file_name(), "get.request.yaml");
        assert_eq!(id.parent().unwrap().as_str(), "users/admin");
        assert_eq!(id.depth(), 3);
        assert_eq!(NodeId::parse("users").unwrap().parent(), Some(NodeId::root()));
        assert_eq!(NodeId::root().parent(), None);
    }

    #[test]
    fn test_parse_rejects_traversal() {
        assert!(NodeId::parse("../etc/passwd").is_err());
        assert!(NodeId::parse("a//b").is_err());
        assert!(NodeId::parse("a\\b").is_err());
        assert!(NodeId::parse("/").unwrap().is_root());
    }

    #[test]
    fn test_from_relative_path() {
        let id = NodeId::from_relative_path(Path::new("users/list.request.yaml")).unwrap();
        assert_eq!(id.as_str(), "users/list.request.yaml");
        assert!(NodeId::from_relative_path(Path::new("../outside")).is_err());
        assert!(NodeId::from_relative_path(Path::new("/abs")).is_err());
    }

    #[test]
    fn test_starts_with() {
        let folder = NodeId::parse("users").unwrap();
        assert!(NodeId::parse("users/x.request.yaml").unwrap().starts_with(&folder));
        assert!(!NodeId::parse("users-old/x.request.yaml").unwrap().starts_with(&folder));
        assert!(folder.starts_with(&NodeId::root()));
    }

    #[test]
    fn test_ancestors() {
        let id = NodeId::parse("a/b/c").unwrap();
        let ancestors: Vec<String> = id.ancestors().iter().map(ToString::to_string).collect();
        assert_eq!(ancestors, vec!["/", "a", "a/b"]);
    }
}
