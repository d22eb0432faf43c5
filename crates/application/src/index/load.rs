//! Directory scanning: turns files on disk into a change set.

use std::fmt;
use std::path::{Path, PathBuf};

use courier_domain::persistence::layout::{self, ENVIRONMENTS_DIR, EntryKind};
use courier_domain::persistence::{self, DocumentKind};
use courier_domain::{Document, NodeId, PersistenceCollection};
use tracing::{debug, warn};

use super::change::{Change, ChangeSet};
use crate::error::{StoreError, StoreResult};
use crate::ports::FileStore;

/// A file or directory skipped while loading, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadWarning {
    /// Absolute path of the skipped entry.
    pub path: PathBuf,
    /// Why it was skipped.
    pub reason: String,
}

impl LoadWarning {
    /// Creates a new warning.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}

/// Reads and decodes `collection.yaml`. Failures here are fatal.
pub(crate) async fn read_collection<S: FileStore>(
    root: &Path,
    store: &S,
) -> StoreResult<PersistenceCollection> {
    let path = root.join(layout::COLLECTION_FILE);
    let bytes = store.read(&path).await?;
    match persistence::decode(DocumentKind::Collection, &bytes)
        .map_err(|e| StoreError::codec(&path, e))?
    {
        Document::Collection(collection) => Ok(collection),
        other => Err(StoreError::InvalidOperation(format!(
            "{} decoded as {:?}",
            path.display(),
            other.kind()
        ))),
    }
}

/// Reads and decodes one collection file.
///
/// `Ok(None)` means the file vanished between listing and reading.
async fn read_entry<S: FileStore>(
    store: &S,
    path: &Path,
    kind: EntryKind,
) -> Result<Option<Document>, String> {
    let bytes = match store.read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.is_not_found() => return Ok(None),
        Err(e) => return Err(e.to_string()),
    };
    persistence::decode(kind.document_kind(), &bytes)
        .map(Some)
        .map_err(|e| e.to_string())
}

/// Scans the directory `start` and everything below it.
///
/// Produces `EnsureFolder` for every directory and `Upsert` for every file
/// that decodes. Files that fail are reported as warnings and left out;
/// hidden entries and temp files are skipped silently.
pub(crate) async fn scan_subtree<S: FileStore>(
    root: &Path,
    store: &S,
    start: &NodeId,
) -> (ChangeSet, Vec<LoadWarning>) {
    let mut changes = ChangeSet::new();
    let mut warnings = Vec::new();
    let mut pending = vec![start.clone()];

    while let Some(dir_id) = pending.pop() {
        let dir_path = root.join(dir_id.to_relative_path());
        let entries = match store.list_dir(&dir_path).await {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() && dir_id != *start => continue,
            Err(e) => {
                warn!(path = %dir_path.display(), error = %e, "Cannot list directory");
                warnings.push(LoadWarning::new(&dir_path, e.to_string()));
                continue;
            }
        };

        let in_environments = dir_id.to_relative_path().starts_with(ENVIRONMENTS_DIR);
        if !dir_id.is_root() && !in_environments {
            changes.push(Change::EnsureFolder(dir_id.clone()));
        }

        for entry in entries {
            if entry.name.contains('\\') {
                warnings.push(LoadWarning::new(
                    dir_path.join(&entry.name),
                    "unsupported character in name",
                ));
                continue;
            }

            let id = dir_id.join(&entry.name);
            let relative = id.to_relative_path();
            if layout::is_ignored(&relative) {
                continue;
            }

            if entry.is_dir {
                // Nothing below environments/ nests.
                if !in_environments {
                    pending.push(id);
                }
                continue;
            }

            let Some(kind) = layout::classify(&relative) else {
                continue;
            };
            if kind == EntryKind::Collection {
                continue;
            }

            let path = root.join(&relative);
            match read_entry(store, &path, kind).await {
                Ok(Some(document)) => changes.push(Change::Upsert { path: id, document }),
                Ok(None) => debug!(path = %path.display(), "File vanished during scan"),
                Err(reason) => {
                    warn!(path = %path.display(), %reason, "Skipping unreadable file");
                    warnings.push(LoadWarning::new(path, reason));
                }
            }
        }
    }

    (changes, warnings)
}
