//! Storage collaborators: object store for proxies, search index for documents
//!
//! Both are narrow traits. The worker binary wires the filesystem/JSON-lines
//! implementations; tests use the in-memory ones.

pub mod object_store;
pub mod search_index;

pub use object_store::{FsObjectStore, MemoryObjectStore, ObjectStore};
pub use search_index::{JsonLinesIndex, MemoryIndex, SearchIndex};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Object names must be relative and must not climb out of the store
    #[error("Invalid object name: '{0}'")]
    InvalidName(String),

    #[error("Object not found: {0}")]
    NotFound(String),
}

/// Reject absolute names and any `..`/root component
pub(crate) fn validate_name(name: &str) -> Result<(), StorageError> {
    use std::path::Component;

    let escapes = std::path::Path::new(name)
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if name.is_empty() || escapes {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("ab12/128x85.jpg").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("/abs/a.jpg").is_err());
        assert!(validate_name("../a.jpg").is_err());
        assert!(validate_name("a/../../b.jpg").is_err());
    }
}
