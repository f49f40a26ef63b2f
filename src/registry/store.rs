//! Blob storage behind the model registry.

use crate::collaborators::write_atomically;
use crate::error::Result;
use fs4::fs_std::FileExt;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;

/// Key-value byte storage.
///
/// `put` must replace the value atomically: a concurrent `get` sees either
/// the old bytes or the new bytes, never a mix.
pub trait BlobStore: Send + Sync {
    /// Reads a blob; `None` if absent.
    ///
    /// # Errors
    ///
    /// Storage failures.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Writes a blob.
    ///
    /// # Errors
    ///
    /// Storage failures.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Runs `critical` while holding the exclusive writer lock for `scope`.
    ///
    /// The lock must exclude every writer sharing the underlying storage,
    /// including other store instances and other processes.
    ///
    /// # Errors
    ///
    /// Lock acquisition failures, or whatever `critical` returns.
    fn locked(&self, scope: &str, critical: &mut dyn FnMut() -> Result<()>) -> Result<()>;
}

/// Blobs as files under a root directory, written by rename.
///
/// Writers lock `<scope>/.lock` with an OS advisory lock, so registries in
/// different processes over the same directory serialize their saves.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Store rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Filesystem path of a key.
    #[must_use]
    pub fn path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl BlobStore for FsBlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match std::fs::read(self.path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        write_atomically(&self.path(key), bytes)
    }

    fn locked(&self, scope: &str, critical: &mut dyn FnMut() -> Result<()>) -> Result<()> {
        let dir = self.path(scope);
        std::fs::create_dir_all(&dir)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(dir.join(".lock"))?;
        FileExt::lock_exclusive(&file)?;
        let result = critical();
        // Closing the file releases the lock as well.
        if let Err(err) = FileExt::unlock(&file) {
            tracing::warn!(scope, error = %err, "releasing blob lock failed");
        }
        result
    }
}

/// Process-local blobs.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MemoryBlobStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn scope_lock(&self, scope: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(scope.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.read().get(key).cloned())
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.blobs.write().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn locked(&self, scope: &str, critical: &mut dyn FnMut() -> Result<()>) -> Result<()> {
        let lock = self.scope_lock(scope);
        let _guard = lock.lock();
        critical()
    }
}
