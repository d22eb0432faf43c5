//! File store abstraction port.

use std::future::Future;
use std::path::{Path, PathBuf};

/// Error type for file store operations.
#[derive(Debug, thiserror::Error)]
pub enum FileStoreError {
    /// The path does not exist.
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Any other I/O failure.
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
}

impl FileStoreError {
    /// Classifies an `io::Error`, mapping `NotFound` to its own variant.
    #[must_use]
    pub fn from_io(operation: &'static str, path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path.to_path_buf())
        } else {
            Self::Io {
                operation,
                path: path.to_path_buf(),
                source,
            }
        }
    }

    /// Returns true for the `NotFound` variant.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Kind of filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    /// Regular file.
    File,
    /// Directory.
    Dir,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// File name (UTF-8; other names are skipped by adapters).
    pub name: String,
    /// Whether the entry is a directory.
    pub is_dir: bool,
}

/// Byte-level file access used by the collection index.
///
/// Implementations must make `write` atomic: a reader sees either the old
/// content or the new content, never a mix. Nothing is cached.
pub trait FileStore: Send + Sync + 'static {
    /// Reads a file's contents as bytes.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the file does not exist.
    fn read(&self, path: &Path) -> impl Future<Output = Result<Vec<u8>, FileStoreError>> + Send;

    /// Atomically replaces (or creates) a file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written; the previous content
    /// is then left intact.
    fn write(
        &self,
        path: &Path,
        contents: &[u8],
    ) -> impl Future<Output = Result<(), FileStoreError>> + Send;

    /// Removes a file.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the file does not exist.
    fn delete(&self, path: &Path) -> impl Future<Output = Result<(), FileStoreError>> + Send;

    /// Creates a directory and all parents. Succeeds if it already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    fn create_dir_all(&self, path: &Path)
    -> impl Future<Output = Result<(), FileStoreError>> + Send;

    /// Removes a directory and everything below it.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the directory does not exist.
    fn remove_dir_all(&self, path: &Path)
    -> impl Future<Output = Result<(), FileStoreError>> + Send;

    /// Lists the entries of a directory, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the directory does not exist.
    fn list_dir(
        &self,
        path: &Path,
    ) -> impl Future<Output = Result<Vec<DirEntry>, FileStoreError>> + Send;

    /// Returns the entry type, or `None` if nothing exists at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be read for another reason.
    fn entry_type(
        &self,
        path: &Path,
    ) -> impl Future<Output = Result<Option<EntryType>, FileStoreError>> + Send;

    /// Checks if a path exists.
    fn exists(&self, path: &Path) -> impl Future<Output = bool> + Send {
        async move { matches!(self.entry_type(path).await, Ok(Some(_))) }
    }
}
