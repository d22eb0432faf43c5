//! File store decorator that journals every own mutation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::time::Instant;

use super::journal::{Observation, WriteJournal};
use crate::ports::{DirEntry, EntryType, FileStore, FileStoreError};

/// Wraps a [`FileStore`] and records each write, delete and directory
/// change in a [`WriteJournal`] before delegating. Directories created
/// implicitly by a write are recorded too.
#[derive(Debug)]
pub struct JournaledStore<F> {
    inner: Arc<F>,
    journal: Arc<WriteJournal>,
}

impl<F> Clone for JournaledStore<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            journal: Arc::clone(&self.journal),
        }
    }
}

impl<F: FileStore> JournaledStore<F> {
    /// Creates a journaling wrapper around `inner`.
    #[must_use]
    pub const fn new(inner: Arc<F>, journal: Arc<WriteJournal>) -> Self {
        Self { inner, journal }
    }

    /// The journal shared with the reconcile worker.
    #[must_use]
    pub const fn journal(&self) -> &Arc<WriteJournal> {
        &self.journal
    }

    /// The undecorated store, for reads that must not be journaled.
    #[must_use]
    pub const fn inner(&self) -> &Arc<F> {
        &self.inner
    }

    /// Records every ancestor of `path` that does not exist yet, nearest
    /// last.
    async fn record_missing_dirs(&self, path: &Path) -> Vec<u64> {
        let mut missing: Vec<PathBuf> = Vec::new();
        let mut current = path.parent();
        while let Some(dir) = current
            && matches!(self.inner.entry_type(dir).await, Ok(None))
        {
            missing.push(dir.to_path_buf());
            current = dir.parent();
        }
        missing
            .into_iter()
            .rev()
            .map(|dir| self.journal.record(&dir, Observation::Dir))
            .collect()
    }

    fn finish<T>(
        &self,
        tokens: &[u64],
        result: Result<T, FileStoreError>,
    ) -> Result<T, FileStoreError> {
        let now = Instant::now();
        for &token in tokens {
            match &result {
                Ok(_) => self.journal.settle(token, now),
                Err(_) => self.journal.abandon(token),
            }
        }
        result
    }
}

impl<F: FileStore> FileStore for JournaledStore<F> {
    async fn read(&self, path: &Path) -> Result<Vec<u8>, FileStoreError> {
        self.inner.read(path).await
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> Result<(), FileStoreError> {
        let mut tokens = self.record_missing_dirs(path).await;
        tokens.push(self.journal.record(path, Observation::file(contents)));
        let result = self.inner.write(path, contents).await;
        self.finish(&tokens, result)
    }

    async fn delete(&self, path: &Path) -> Result<(), FileStoreError> {
        let token = self.journal.record(path, Observation::Missing);
        let result = self.inner.delete(path).await;
        self.finish(&[token], result)
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), FileStoreError> {
        let mut tokens = self.record_missing_dirs(path).await;
        tokens.push(self.journal.record(path, Observation::Dir));
        let result = self.inner.create_dir_all(path).await;
        self.finish(&tokens, result)
    }

    async fn remove_dir_all(&self, path: &Path) -> Result<(), FileStoreError> {
        let token = self.journal.record(path, Observation::Missing);
        let result = self.inner.remove_dir_all(path).await;
        self.finish(&[token], result)
    }

    async fn list_dir(&self, path: &Path) -> Result<Vec<DirEntry>, FileStoreError> {
        self.inner.list_dir(path).await
    }

    async fn entry_type(&self, path: &Path) -> Result<Option<EntryType>, FileStoreError> {
        self.inner.entry_type(path).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::testing::MemoryFileStore;
    use std::time::Duration;

    fn journaled(store: &MemoryFileStore) -> JournaledStore<MemoryFileStore> {
        JournaledStore::new(
            Arc::new(store.clone()),
            Arc::new(WriteJournal::new(Duration::from_secs(2))),
        )
    }

    #[tokio::test]
    async fn test_write_is_journaled() {
        let store = MemoryFileStore::new();
        let journaled = journaled(&store);

        journaled.write(Path::new("/c/a.yaml"), b"hello").await.unwrap();

        assert!(journaled.journal().is_own_write(
            Path::new("/c/a.yaml"),
            &Observation::file(b"hello"),
            Instant::now()
        ));
    }

    #[tokio::test]
    async fn test_write_journals_created_parent_dirs() {
        let store = MemoryFileStore::new();
        store.put("/c/collection.yaml", "x");
        let journaled = journaled(&store);

        journaled
            .write(Path::new("/c/admin/users/a.yaml"), b"hello")
            .await
            .unwrap();

        let journal = journaled.journal();
        let now = Instant::now();
        assert!(journal.is_own_write(Path::new("/c/admin"), &Observation::Dir, now));
        assert!(journal.is_own_write(Path::new("/c/admin/users"), &Observation::Dir, now));
        assert!(!journal.is_own_write(Path::new("/c"), &Observation::Dir, now));
        assert!(journal.is_own_write(
            Path::new("/c/admin/users/a.yaml"),
            &Observation::file(b"hello"),
            now
        ));
    }

    #[tokio::test]
    async fn test_failed_write_is_not_journaled() {
        let store = MemoryFileStore::new();
        store.put("/c/collection.yaml", "x");
        store.fail_writes(true);
        let journaled = journaled(&store);

        assert!(journaled.write(Path::new("/c/new/a.yaml"), b"x").await.is_err());
        assert!(journaled.journal().is_empty());
    }
}
