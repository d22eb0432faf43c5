//! Real file system implementation.

use std::io;
use std::path::{Path, PathBuf};

use courier_application::ports::{DirEntry, EntryType, FileStore, FileStoreError};
use courier_domain::persistence::layout::TEMP_SUFFIX;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

/// [`FileStore`] on top of `tokio::fs`.
///
/// `write` goes through a hidden sibling temp file (`.<name>.<uuid>.tmp`)
/// that is synced and then renamed over the target, so readers never see a
/// partially written file. Nothing is cached.
#[derive(Debug, Clone, Default)]
pub struct AtomicFileStore;

impl AtomicFileStore {
    /// Creates a new `AtomicFileStore`.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Temp file used while writing `target`.
    fn temp_path(target: &Path) -> Result<PathBuf, FileStoreError> {
        let invalid = || FileStoreError::Io {
            operation: "write",
            path: target.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
        };
        let parent = target.parent().ok_or_else(invalid)?;
        let name = target.file_name().ok_or_else(invalid)?.to_string_lossy();
        Ok(parent.join(format!(".{name}.{}{TEMP_SUFFIX}", Uuid::now_v7())))
    }
}

async fn write_synced(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(contents).await?;
    file.sync_all().await
}

impl FileStore for AtomicFileStore {
    async fn read(&self, path: &Path) -> Result<Vec<u8>, FileStoreError> {
        fs::read(path)
            .await
            .map_err(|e| FileStoreError::from_io("read", path, e))
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> Result<(), FileStoreError> {
        let temp = Self::temp_path(path)?;
        if let Some(parent) = temp.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| FileStoreError::from_io("create_dir_all", parent, e))?;
        }

        if let Err(e) = write_synced(&temp, contents).await {
            discard(&temp).await;
            return Err(FileStoreError::from_io("write", &temp, e));
        }
        if let Err(e) = fs::rename(&temp, path).await {
            discard(&temp).await;
            return Err(FileStoreError::from_io("rename", path, e));
        }

        debug!(path = %path.display(), bytes = contents.len(), "File written");
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<(), FileStoreError> {
        fs::remove_file(path)
            .await
            .map_err(|e| FileStoreError::from_io("delete", path, e))
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), FileStoreError> {
        fs::create_dir_all(path)
            .await
            .map_err(|e| FileStoreError::from_io("create_dir_all", path, e))
    }

    async fn remove_dir_all(&self, path: &Path) -> Result<(), FileStoreError> {
        fs::remove_dir_all(path)
            .await
            .map_err(|e| FileStoreError::from_io("remove_dir_all", path, e))
    }

    async fn list_dir(&self, path: &Path) -> Result<Vec<DirEntry>, FileStoreError> {
        let mut dir = fs::read_dir(path)
            .await
            .map_err(|e| FileStoreError::from_io("list_dir", path, e))?;

        let mut entries = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| FileStoreError::from_io("list_dir", path, e))?
        {
            let Ok(name) = entry.file_name().into_string() else {
                debug!(path = %entry.path().display(), "Skipping non UTF-8 name");
                continue;
            };
            // Follows symlinks; a dangling link is skipped.
            let Ok(metadata) = fs::metadata(entry.path()).await else {
                continue;
            };
            entries.push(DirEntry {
                name,
                is_dir: metadata.is_dir(),
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn entry_type(&self, path: &Path) -> Result<Option<EntryType>, FileStoreError> {
        match fs::metadata(path).await {
            Ok(metadata) if metadata.is_dir() => Ok(Some(EntryType::Dir)),
            Ok(_) => Ok(Some(EntryType::File)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FileStoreError::from_io("metadata", path, e)),
        }
    }
}

async fn discard(temp: &Path) {
    if let Err(e) = fs::remove_file(temp).await
        && e.kind() != io::ErrorKind::NotFound
    {
        warn!(path = %temp.display(), error = %e, "Could not remove temp file");
    }
}
