//! Object store for encoded proxies

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use super::{validate_name, StorageError};

/// Persists named blobs and returns a retrievable URI
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `name`, replacing any previous object
    fn put(&self, name: &str, bytes: &[u8]) -> Result<String, StorageError>;

    /// Fetch a stored object
    fn get(&self, name: &str) -> Result<Vec<u8>, StorageError>;
}

/// Objects as files under a root directory
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
    base_uri: Option<String>,
}

impl FsObjectStore {
    /// `base_uri` replaces the default `file://` URIs (e.g. a CDN prefix)
    pub fn new(root: impl Into<PathBuf>, base_uri: Option<String>) -> Self {
        Self {
            root: root.into(),
            base_uri,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn uri_for(&self, name: &str, path: &Path) -> String {
        match &self.base_uri {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), name),
            None => {
                let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
                format!("file://{}", absolute.display())
            }
        }
    }
}

impl ObjectStore for FsObjectStore {
    fn put(&self, name: &str, bytes: &[u8]) -> Result<String, StorageError> {
        validate_name(name)?;
        let path = self.root.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)?;
        debug!(name, bytes = bytes.len(), "Stored object");
        Ok(self.uri_for(name, &path))
    }

    fn get(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        validate_name(name)?;
        let path = self.root.join(name);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process object store
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored names, sorted
    pub fn names(&self) -> Vec<String> {
        let objects = self.objects.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = objects.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put(&self, name: &str, bytes: &[u8]) -> Result<String, StorageError> {
        validate_name(name)?;
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), bytes.to_vec());
        Ok(format!("memory://{}", name))
    }

    fn get(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_store_put_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path(), None);

        let uri = store.put("abc/128x85.jpg", b"jpeg bytes").unwrap();
        assert!(uri.starts_with("file://"));
        assert!(uri.ends_with("abc/128x85.jpg"));
        assert!(dir.path().join("abc/128x85.jpg").is_file());
        assert_eq!(store.get("abc/128x85.jpg").unwrap(), b"jpeg bytes");
    }

    #[test]
    fn test_fs_store_base_uri() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path(), Some("https://cdn.example/proxies/".to_string()));
        let uri = store.put("abc/1x1.png", b"png").unwrap();
        assert_eq!(uri, "https://cdn.example/proxies/abc/1x1.png");
    }

    #[test]
    fn test_fs_store_missing_and_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path(), None);
        assert!(matches!(store.get("nope.jpg"), Err(StorageError::NotFound(_))));
        assert!(matches!(
            store.put("../escape.jpg", b""),
            Err(StorageError::InvalidName(_))
        ));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryObjectStore::new();
        assert!(store.is_empty());
        assert_eq!(store.put("a/b.jpg", b"x").unwrap(), "memory://a/b.jpg");
        assert_eq!(store.get("a/b.jpg").unwrap(), b"x");
        assert_eq!(store.names(), vec!["a/b.jpg".to_string()]);
    }
}
