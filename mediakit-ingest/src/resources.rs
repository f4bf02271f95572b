//! Process-scoped read-only model resources
//!
//! Classifier weights, cascade definitions and palettes are located under the
//! model-resource root and read once, during `Processor::init`. The loaded
//! bytes are shared through `Arc` and never mutated afterwards.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::InitError;

/// Handle to the model-resource root
#[derive(Debug, Clone)]
pub struct ModelResources {
    root: PathBuf,
}

/// Bytes of one resource file
#[derive(Debug, Clone)]
pub struct ResourceBlob {
    /// Name relative to the model root
    pub name: String,
    /// Resolved absolute location
    pub path: PathBuf,
    pub bytes: Arc<[u8]>,
}

impl ModelResources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        info!(root = %root.display(), "Model resource root");
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a resource name against the root
    ///
    /// Names must be relative and stay inside the root.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, InitError> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if name.trim().is_empty() || escapes {
            return Err(InitError::InvalidResource {
                name: name.to_string(),
                reason: "resource names must be relative to the model root".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }

    /// Read a required resource
    ///
    /// # Errors
    /// [`InitError::MissingResource`] if the file does not exist,
    /// [`InitError::Unreadable`] if it cannot be read.
    pub fn read(&self, name: &str) -> Result<ResourceBlob, InitError> {
        let path = self.resolve(name)?;
        if !path.is_file() {
            return Err(InitError::MissingResource(path));
        }
        let bytes = std::fs::read(&path).map_err(|source| InitError::Unreadable {
            path: path.clone(),
            source,
        })?;
        debug!(resource = name, bytes = bytes.len(), "Loaded model resource");

        Ok(ResourceBlob {
            name: name.to_string(),
            path,
            bytes: Arc::from(bytes),
        })
    }
}
