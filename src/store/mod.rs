//! Blob storage for datasets and trained artifacts
//!
//! Blobs are opaque byte strings addressed by a [`BlobHandle`]. The
//! in-memory store backs tests and library use; the filesystem store backs
//! the command line tool.

use crate::error::{SvrError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: std::env::var("BAYES_SVR_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
        }
    }
}

impl StoreConfig {
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }
}

/// Opaque reference to a stored blob
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobHandle(String);

impl BlobHandle {
    fn generate(name: &str) -> Self {
        let stem: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        BlobHandle(format!("{}-{}", stem, Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Put/get/delete of named byte blobs
pub trait BlobStore: Send + Sync {
    /// Store `bytes` and return a fresh handle; `name` is a hint only
    fn store(&self, name: &str, bytes: Vec<u8>) -> Result<BlobHandle>;

    fn load(&self, handle: &BlobHandle) -> Result<Vec<u8>>;

    /// Remove a blob. Removing an unknown handle is not an error.
    fn remove(&self, handle: &BlobHandle) -> Result<()>;
}

/// Serialize-then-store helper usable through `dyn BlobStore`
pub fn store_json<T: Serialize>(store: &dyn BlobStore, name: &str, value: &T) -> Result<BlobHandle> {
    store.store(name, serde_json::to_vec(value)?)
}

/// Load-then-deserialize helper usable through `dyn BlobStore`
pub fn load_json<T: for<'de> Deserialize<'de>>(store: &dyn BlobStore, handle: &BlobHandle) -> Result<T> {
    let bytes = store.load(handle)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<BlobHandle, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

impl BlobStore for MemoryBlobStore {
    fn store(&self, name: &str, bytes: Vec<u8>) -> Result<BlobHandle> {
        let handle = BlobHandle::generate(name);
        self.blobs.write().insert(handle.clone(), bytes);
        Ok(handle)
    }

    fn load(&self, handle: &BlobHandle) -> Result<Vec<u8>> {
        self.blobs
            .read()
            .get(handle)
            .cloned()
            .ok_or_else(|| SvrError::Storage(format!("blob not found: {}", handle)))
    }

    fn remove(&self, handle: &BlobHandle) -> Result<()> {
        self.blobs.write().remove(handle);
        Ok(())
    }
}

/// One file per blob under a directory
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Open the store, creating the directory if needed
    pub fn open(config: &StoreConfig) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;
        Ok(Self { root: config.data_dir.clone() })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, handle: &BlobHandle) -> Result<PathBuf> {
        let name = handle.as_str();
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(SvrError::Storage(format!("invalid blob handle: {}", name)));
        }
        Ok(self.root.join(name))
    }
}

impl BlobStore for FsBlobStore {
    fn store(&self, name: &str, bytes: Vec<u8>) -> Result<BlobHandle> {
        let handle = BlobHandle::generate(name);
        let path = self.path_of(&handle)?;
        fs::write(&path, bytes)?;
        debug!(path = %path.display(), "Blob written");
        Ok(handle)
    }

    fn load(&self, handle: &BlobHandle) -> Result<Vec<u8>> {
        let path = self.path_of(handle)?;
        fs::read(&path).map_err(|e| SvrError::Storage(format!("cannot read blob {}: {}", handle, e)))
    }

    fn remove(&self, handle: &BlobHandle) -> Result<()> {
        let path = self.path_of(handle)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryBlobStore::new();
        let h = store.store("data.csv", b"a,b\n1,2\n".to_vec()).unwrap();
        assert!(h.as_str().starts_with("data_csv-"));
        assert_eq!(store.load(&h).unwrap(), b"a,b\n1,2\n");

        store.remove(&h).unwrap();
        assert!(store.is_empty());
        assert!(matches!(store.load(&h), Err(SvrError::Storage(_))));
        // Second removal is a no-op
        store.remove(&h).unwrap();
    }

    #[test]
    fn test_handles_are_unique() {
        let store = MemoryBlobStore::new();
        let a = store.store("x", vec![1]).unwrap();
        let b = store.store("x", vec![2]).unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_fs_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::default().with_data_dir(dir.path().join("blobs"));
        let store = FsBlobStore::open(&config).unwrap();

        let h = store_json(&store, "model", &vec![1.0, 2.0]).unwrap();
        let back: Vec<f64> = load_json(&store, &h).unwrap();
        assert_eq!(back, vec![1.0, 2.0]);

        store.remove(&h).unwrap();
        assert!(store.load(&h).is_err());
        store.remove(&h).unwrap();
    }

    #[test]
    fn test_fs_rejects_path_handles() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(&StoreConfig::default().with_data_dir(dir.path())).unwrap();
        let bad: BlobHandle = serde_json::from_str("\"../escape\"").unwrap();
        assert!(store.load(&bad).is_err());
    }
}
