//! YAML document codec.
//!
//! Every on-disk file is a YAML mapping whose first key is `version`.
//! Decoding is fail-closed: a document is either fully valid or rejected with
//! a reason, never partially applied.

use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};
use thiserror::Error;

use super::collection::PersistenceCollection;
use super::common::{OrderKey, SUPPORTED_SCHEMA_VERSIONS};
use super::folder::PersistenceFolder;
use super::request::SavedRequest;
use crate::environment::Environment;

/// Errors produced while encoding or decoding documents.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The bytes are not a well-formed document of the expected kind.
    #[error("invalid document: {reason}")]
    Decode {
        /// Human-readable cause.
        reason: String,
    },

    /// The document declares a schema version this build cannot read.
    #[error("unsupported schema version {found} (supported: {supported:?})")]
    VersionUnsupported {
        /// Declared version.
        found: u64,
        /// Versions this build can read.
        supported: &'static [u32],
    },

    /// The document could not be serialized.
    #[error("failed to encode document: {0}")]
    Encode(String),
}

impl CodecError {
    fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }
}

/// Kind of document a file is expected to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// `collection.yaml`
    Collection,
    /// `folder.yaml`
    Folder,
    /// `*.request.yaml`
    Request,
    /// `environments/*.yaml`
    Environment,
}

/// A decoded on-disk document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Document {
    /// Collection metadata.
    Collection(PersistenceCollection),
    /// Folder metadata.
    Folder(PersistenceFolder),
    /// A saved request.
    Request(SavedRequest),
    /// A named environment.
    Environment(Environment),
}

impl Document {
    /// Returns the kind of this document.
    #[must_use]
    pub const fn kind(&self) -> DocumentKind {
        match self {
            Self::Collection(_) => DocumentKind::Collection,
            Self::Folder(_) => DocumentKind::Folder,
            Self::Request(_) => DocumentKind::Request,
            Self::Environment(_) => DocumentKind::Environment,
        }
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Collection(c) => &c.name,
            Self::Folder(f) => &f.name,
            Self::Request(r) => &r.name,
            Self::Environment(e) => &e.name,
        }
    }

    /// Returns the sibling ordering key, if the document has one.
    #[must_use]
    pub const fn order(&self) -> Option<OrderKey> {
        match self {
            Self::Folder(f) => f.order,
            Self::Request(r) => r.order,
            Self::Collection(_) | Self::Environment(_) => None,
        }
    }

    /// Sets the sibling ordering key on folders and requests.
    pub fn set_order(&mut self, order: OrderKey) {
        match self {
            Self::Folder(f) => f.order = Some(order),
            Self::Request(r) => r.order = Some(order),
            Self::Collection(_) | Self::Environment(_) => {}
        }
    }

    /// Returns the request, if this is one.
    #[must_use]
    pub const fn as_request(&self) -> Option<&SavedRequest> {
        match self {
            Self::Request(r) => Some(r),
            _ => None,
        }
    }
}

/// Encodes a document to YAML bytes.
///
/// Output is deterministic: keys follow struct field order and maps are
/// sorted, so encoding the same value twice yields identical bytes.
///
/// # Errors
/// Returns `CodecError::Encode` if serialization fails.
pub fn encode(document: &Document) -> Result<Vec<u8>, CodecError> {
    let text = match document {
        Document::Collection(c) => serde_yaml::to_string(c),
        Document::Folder(f) => serde_yaml::to_string(f),
        Document::Request(r) => serde_yaml::to_string(r),
        Document::Environment(e) => serde_yaml::to_string(e),
    }
    .map_err(|e| CodecError::Encode(e.to_string()))?;

    Ok(text.into_bytes())
}

/// Decodes YAML bytes into a document of the given kind.
///
/// # Errors
/// Returns `CodecError::VersionUnsupported` for unknown schema versions and
/// `CodecError::Decode` for anything else that is malformed.
pub fn decode(kind: DocumentKind, bytes: &[u8]) -> Result<Document, CodecError> {
    let value: Value = serde_yaml::from_slice(bytes)
        .map_err(|e| CodecError::decode(format!("malformed YAML: {e}")))?;

    let mapping = value
        .as_mapping()
        .ok_or_else(|| CodecError::decode("document is not a mapping"))?;

    check_version(mapping)?;
    require_string(mapping, "name")?;
    if kind == DocumentKind::Request {
        require_string(mapping, "method")?;
        require_string(mapping, "url")?;
    }

    match kind {
        DocumentKind::Collection => {
            let collection: PersistenceCollection = typed(value)?;
            require_non_empty(&collection.name, "name")?;
            collection
                .variables
                .validate()
                .map_err(|e| CodecError::decode(e.to_string()))?;
            Ok(Document::Collection(collection))
        }
        DocumentKind::Folder => {
            let folder: PersistenceFolder = typed(value)?;
            require_non_empty(&folder.name, "name")?;
            Ok(Document::Folder(folder))
        }
        DocumentKind::Request => {
            let request: SavedRequest = typed(value)?;
            request
                .validate()
                .map_err(|e| CodecError::decode(e.to_string()))?;
            Ok(Document::Request(request))
        }
        DocumentKind::Environment => {
            let environment: Environment = typed(value)?;
            require_non_empty(&environment.name, "name")?;
            environment
                .variables
                .validate()
                .map_err(|e| CodecError::decode(e.to_string()))?;
            Ok(Document::Environment(environment))
        }
    }
}

fn check_version(mapping: &Mapping) -> Result<(), CodecError> {
    let raw = mapping
        .get("version")
        .ok_or_else(|| CodecError::decode("missing field `version`"))?;

    let found = raw
        .as_u64()
        .ok_or_else(|| CodecError::decode("field `version` must be a non-negative integer"))?;

    let supported = u32::try_from(found).is_ok_and(|v| SUPPORTED_SCHEMA_VERSIONS.contains(&v));
    if supported {
        Ok(())
    } else {
        Err(CodecError::VersionUnsupported {
            found,
            supported: SUPPORTED_SCHEMA_VERSIONS,
        })
    }
}

fn require_string(mapping: &Mapping, field: &str) -> Result<(), CodecError> {
    match mapping.get(field) {
        None => Err(CodecError::decode(format!("missing field `{field}`"))),
        Some(Value::String(_)) => Ok(()),
        Some(_) => Err(CodecError::decode(format!("field `{field}` must be a string"))),
    }
}

fn require_non_empty(value: &str, field: &str) -> Result<(), CodecError> {
    if value.trim().is_empty() {
        Err(CodecError::decode(format!("field `{field}` must not be empty")))
    } else {
        Ok(())
    }
}

fn typed<T: DeserializeOwned>(value: Value) -> Result<T, CodecError> {
    serde_yaml::from_value(value).map_err(|e| CodecError::decode(e.to_string()))
}
