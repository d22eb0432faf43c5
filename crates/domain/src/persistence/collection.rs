//! Collection metadata type (collection.yaml).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::{CURRENT_SCHEMA_VERSION, is_default};
use crate::environment::{Variable, VariableSet};

/// Collection metadata stored in `collection.yaml` at the collection root.
///
/// A collection groups related requests and defines the lowest-precedence
/// variables shared by every request within.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PersistenceCollection {
    /// Schema version; always the first key on disk.
    pub version: u32,

    /// Human-readable collection name.
    pub name: String,

    /// Human-readable description of the collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Authorship and timestamps.
    #[serde(default, skip_serializing_if = "is_default")]
    pub metadata: CollectionMetadata,

    /// Collection-scoped variables, in file order.
    /// These have lower precedence than environment variables.
    #[serde(default, skip_serializing_if = "VariableSet::is_empty")]
    pub variables: VariableSet,
}

/// Descriptive metadata. Timestamps are written explicitly by callers, never
/// refreshed implicitly, so re-encoding an unchanged collection is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionMetadata {
    /// Who created the collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Last explicit update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl PersistenceCollection {
    /// Creates a new collection.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            version: CURRENT_SCHEMA_VERSION,
            name: name.into(),
            description: None,
            metadata: CollectionMetadata::default(),
            variables: VariableSet::new(),
        }
    }

    /// Sets the collection description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the author.
    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.metadata.author = Some(author.into());
        self
    }

    /// Stamps creation and update time.
    #[must_use]
    pub const fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.metadata.created_at = Some(at);
        self.metadata.updated_at = Some(at);
        self
    }

    /// Adds a variable to the collection.
    #[must_use]
    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.set(Variable::new(key, value));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_new() {
        let collection = PersistenceCollection::new("My API");
        assert_eq!(collection.name, "My API");
        assert_eq!(collection.version, CURRENT_SCHEMA_VERSION);
        assert!(collection.description.is_none());
        assert!(collection.variables.is_empty());
    }

    #[test]
    fn test_collection_with_builders() {
        let collection = PersistenceCollection::new("Test Collection")
            .with_description("A test collection")
            .with_author("Jane")
            .with_variable("base_url", "https://api.example.com");

        assert_eq!(
            collection.description,
            Some("A test collection".to_string())
        );
        assert_eq!(collection.metadata.author.as_deref(), Some("Jane"));
        assert_eq!(
            collection.variables.enabled_value("base_url"),
            Some("https://api.example.com")
        );
    }
}
