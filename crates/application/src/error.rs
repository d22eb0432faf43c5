//! Application error types

use std::path::{Path, PathBuf};

use courier_domain::{CodecError, DomainError};
use thiserror::Error;

use crate::ports::{FileStoreError, WatchError};
use crate::variable_resolver::ResolveError;

/// Errors surfaced by the collection store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced node, environment or file does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A file could not be decoded.
    #[error("failed to decode {}: {reason}", path.display())]
    Decode {
        /// File that failed.
        path: PathBuf,
        /// Human-readable cause.
        reason: String,
    },

    /// A file declares a schema version this build cannot read.
    #[error("{}: unsupported schema version {found}", path.display())]
    VersionUnsupported {
        /// File that failed.
        path: PathBuf,
        /// Declared version.
        found: u64,
    },

    /// An I/O operation failed.
    #[error("{operation} failed for {}: {source}", path.display())]
    Io {
        /// What was attempted (`read`, `write`, `rename`, ...).
        operation: &'static str,
        /// Path the operation targeted.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Variable references form a cycle or nest too deeply.
    #[error("circular variable reference: {}", chain.join(" -> "))]
    CircularReference {
        /// Names visited, in order, ending with the repeated one.
        chain: Vec<String>,
    },

    /// A variable could not be resolved in any scope.
    #[error("unresolved variable: {0}")]
    Unresolved(String),

    /// The target of a create operation already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The operation does not make sense for the target.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// The filesystem watcher could not be started.
    #[error("watcher error: {0}")]
    Watch(#[from] WatchError),

    /// A domain rule was violated.
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
}

impl StoreError {
    /// Attaches the file path to a codec error.
    #[must_use]
    pub fn codec(path: &Path, error: CodecError) -> Self {
        match error {
            CodecError::Decode { reason } => Self::Decode {
                path: path.to_path_buf(),
                reason,
            },
            CodecError::VersionUnsupported { found, .. } => Self::VersionUnsupported {
                path: path.to_path_buf(),
                found,
            },
            CodecError::Encode(reason) => {
                Self::InvalidOperation(format!("cannot encode {}: {reason}", path.display()))
            }
        }
    }
}

impl From<FileStoreError> for StoreError {
    fn from(error: FileStoreError) -> Self {
        match error {
            FileStoreError::NotFound(path) => Self::NotFound(path.display().to_string()),
            FileStoreError::Io {
                operation,
                path,
                source,
            } => Self::Io {
                operation,
                path,
                source,
            },
        }
    }
}

impl From<ResolveError> for StoreError {
    fn from(error: ResolveError) -> Self {
        match error {
            ResolveError::Unresolved(name) => Self::Unresolved(name),
            ResolveError::CircularReference { chain } | ResolveError::DepthExceeded { chain } => {
                Self::CircularReference { chain }
            }
        }
    }
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
