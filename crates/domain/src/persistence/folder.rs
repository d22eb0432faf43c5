//! Folder metadata type (folder.yaml).

use serde::{Deserialize, Serialize};

use super::common::{CURRENT_SCHEMA_VERSION, OrderKey};

/// Folder metadata stored in an optional `folder.yaml` within a folder
/// directory.
///
/// A directory without the file is still a folder; its metadata is then
/// synthesized from the directory name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PersistenceFolder {
    /// Schema version; always the first key on disk.
    pub version: u32,

    /// Human-readable folder name.
    pub name: String,

    /// Position among siblings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderKey>,

    /// Human-readable description of the folder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PersistenceFolder {
    /// Creates a new folder with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            version: CURRENT_SCHEMA_VERSION,
            name: name.into(),
            order: None,
            description: None,
        }
    }

    /// Sets the folder description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the explicit ordering key.
    #[must_use]
    pub const fn with_order(mut self, order: OrderKey) -> Self {
        self.order = Some(order);
        self
    }
}
