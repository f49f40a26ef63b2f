//! Versioned, checksummed model storage.
//!
//! Each save writes an immutable blob `<name>/<sha256>.bin` (bincode) and
//! then replaces the JSON index `<name>/index.json`. Blobs are named by
//! content, so a blob an index entry points at is never rewritten with
//! other bytes. The index is the commit point: a crash between the two
//! writes leaves the previous version current. The read-modify-write of
//! the index runs under the store's writer lock for `<name>`, which spans
//! registry instances and processes. Loads recompute the SHA-256 of the
//! blob and refuse to deserialize bytes that do not match the index.
//!
//! # Example
//!
//! ```
//! use sizewise::registry::{MemoryBlobStore, ModelMetadata, ModelRegistry};
//! use std::sync::Arc;
//!
//! let registry = ModelRegistry::new(Arc::new(MemoryBlobStore::new()));
//! let entry = registry
//!     .save("demo_model", &vec![1.0_f32, 2.0], ModelMetadata::new("demo"))
//!     .expect("saved");
//! assert_eq!(entry.version, 1);
//!
//! let (weights, _): (Vec<f32>, _) = registry.load("demo_model").expect("loaded");
//! assert_eq!(weights, vec![1.0, 2.0]);
//! ```

mod store;

pub use store::{BlobStore, FsBlobStore, MemoryBlobStore};

use crate::error::{Result, SizewiseError};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Descriptive metadata stored with a model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model family, e.g. `size_ensemble`
    pub model_type: String,
    /// Engine model version tag
    pub model_version: String,
    /// Training rows
    pub n_samples: usize,
    /// Named scalar metrics
    pub metrics: BTreeMap<String, f32>,
    /// Free-form fields
    pub custom: BTreeMap<String, String>,
}

impl ModelMetadata {
    /// Metadata for a model family.
    #[must_use]
    pub fn new(model_type: impl Into<String>) -> Self {
        Self {
            model_type: model_type.into(),
            ..Self::default()
        }
    }

    /// Set version tag.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = version.into();
        self
    }

    /// Set training row count.
    #[must_use]
    pub fn with_samples(mut self, n_samples: usize) -> Self {
        self.n_samples = n_samples;
        self
    }

    /// Add a metric.
    #[must_use]
    pub fn with_metric(mut self, key: impl Into<String>, value: f32) -> Self {
        self.metrics.insert(key.into(), value);
        self
    }

    /// Add custom metadata.
    #[must_use]
    pub fn with_custom(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }
}

/// One saved version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Registry name
    pub name: String,
    /// Version, starting at 1
    pub version: u32,
    /// Blob key
    pub location: String,
    /// Hex SHA-256 of the blob
    pub checksum: String,
    /// Blob size in bytes
    pub size_bytes: usize,
    /// Caller metadata
    pub metadata: ModelMetadata,
    /// Save time
    pub saved_at: DateTime<Utc>,
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn index_key(name: &str) -> String {
    format!("{name}/index.json")
}

fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(SizewiseError::InvalidInput(format!(
            "registry name {name:?} must be non-empty lowercase ascii, digits, '_' or '-'"
        )))
    }
}

/// Model registry over a [`BlobStore`].
///
/// Saves are serialized per name through the store's writer lock; loads
/// take no lock.
pub struct ModelRegistry {
    store: Arc<dyn BlobStore>,
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry").finish_non_exhaustive()
    }
}

impl ModelRegistry {
    /// Registry over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Every saved version of `name`, oldest first.
    ///
    /// # Errors
    ///
    /// Storage failures or an unreadable index.
    pub fn history(&self, name: &str) -> Result<Vec<RegistryEntry>> {
        validate_name(name)?;
        match self.store.get(&index_key(name))? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    /// Current version of `name`, if any.
    ///
    /// # Errors
    ///
    /// Same as [`ModelRegistry::history`].
    pub fn entry(&self, name: &str) -> Result<Option<RegistryEntry>> {
        Ok(self.history(name)?.pop())
    }

    /// Persists `model` as the next version of `name`.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for malformed names, serialization or storage
    /// failures. On error the previous version stays current.
    pub fn save<T: Serialize>(&self, name: &str, model: &T, metadata: ModelMetadata) -> Result<RegistryEntry> {
        validate_name(name)?;
        let bytes = bincode::serialize(model)?;
        let checksum = sha256_hex(&bytes);
        let location = format!("{name}/{checksum}.bin");

        let mut metadata = Some(metadata);
        let mut saved = None;
        self.store.locked(name, &mut || -> Result<()> {
            let mut history = self.history(name)?;
            let version = history.last().map_or(1, |e| e.version + 1);
            // Same content, same key: only (re)write when absent or damaged.
            let intact = self
                .store
                .get(&location)?
                .is_some_and(|existing| sha256_hex(&existing) == checksum);
            if !intact {
                self.store.put(&location, &bytes)?;
            }
            let entry = RegistryEntry {
                name: name.to_string(),
                version,
                location: location.clone(),
                checksum: checksum.clone(),
                size_bytes: bytes.len(),
                metadata: metadata.take().unwrap_or_default(),
                saved_at: Utc::now(),
            };
            history.push(entry.clone());
            self.store.put(&index_key(name), &serde_json::to_vec_pretty(&history)?)?;
            saved = Some(entry);
            Ok(())
        })?;

        let entry = saved.ok_or_else(|| SizewiseError::Serialization(format!("save of {name} did not commit")))?;
        tracing::info!(
            name,
            version = entry.version,
            checksum = %entry.checksum,
            size_bytes = entry.size_bytes,
            "model saved"
        );
        Ok(entry)
    }

    /// Loads the current version of `name`.
    ///
    /// # Errors
    ///
    /// `RegistryMiss` if nothing was saved under `name`; `IntegrityError` if
    /// the blob is missing or its checksum differs from the index.
    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Result<(T, RegistryEntry)> {
        let entry = self.entry(name)?.ok_or_else(|| SizewiseError::RegistryMiss {
            name: name.to_string(),
        })?;
        let bytes = self.store.get(&entry.location)?;
        let actual = bytes.as_deref().map_or_else(|| "missing".to_string(), sha256_hex);
        let bytes = match bytes {
            Some(bytes) if actual == entry.checksum => bytes,
            _ => {
                tracing::error!(
                    name,
                    version = entry.version,
                    expected = %entry.checksum,
                    actual = %actual,
                    "model checksum mismatch"
                );
                return Err(SizewiseError::IntegrityError {
                    name: name.to_string(),
                    expected: entry.checksum,
                    actual,
                });
            }
        };
        let model = bincode::deserialize(&bytes)?;
        tracing::debug!(name, version = entry.version, "model loaded");
        Ok((model, entry))
    }
}
