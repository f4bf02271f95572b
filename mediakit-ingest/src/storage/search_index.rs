//! Search index collaborator
//!
//! Receives terminal Asset Documents and serves previously indexed versions
//! back for change detection on the next run.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::StorageError;
use crate::document::AssetDocument;

pub trait SearchIndex: Send + Sync {
    fn index(&self, document: &AssetDocument) -> Result<(), StorageError>;

    /// Most recently indexed version of a document
    fn lookup(&self, id: &Uuid) -> Result<Option<serde_json::Value>, StorageError>;
}

/// Append-only JSON-lines file; the last line for an id wins
#[derive(Debug)]
pub struct JsonLinesIndex {
    path: PathBuf,
    entries: Mutex<HashMap<Uuid, serde_json::Value>>,
}

impl JsonLinesIndex {
    /// Open (or create on first write) the index file and load existing lines
    ///
    /// Lines that are not valid documents are skipped with a warning.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let mut entries = HashMap::new();

        if path.exists() {
            let reader = BufReader::new(std::fs::File::open(&path)?);
            for (line_no, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match parse_entry(&line) {
                    Some((id, value)) => {
                        entries.insert(id, value);
                    }
                    None => warn!(path = %path.display(), line = line_no + 1, "Skipping malformed index line"),
                }
            }
        }

        info!(path = %path.display(), documents = entries.len(), "Opened search index");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn parse_entry(line: &str) -> Option<(Uuid, serde_json::Value)> {
    let value: serde_json::Value = serde_json::from_str(line).ok()?;
    let id = value.get("id")?.as_str()?.parse().ok()?;
    Some((id, value))
}

impl SearchIndex for JsonLinesIndex {
    fn index(&self, document: &AssetDocument) -> Result<(), StorageError> {
        let value = document.to_json();
        let line = serde_json::to_string(&value)?;

        // Hold the lock across the append so lines never interleave
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        entries.insert(document.id(), value);

        debug!(id = %document.id(), "Indexed document");
        Ok(())
    }

    fn lookup(&self, id: &Uuid) -> Result<Option<serde_json::Value>, StorageError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned())
    }
}

/// In-process index
#[derive(Debug, Default)]
pub struct MemoryIndex {
    entries: Mutex<HashMap<Uuid, serde_json::Value>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every indexed document
    pub fn documents(&self) -> Vec<serde_json::Value> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

impl SearchIndex for MemoryIndex {
    fn index(&self, document: &AssetDocument) -> Result<(), StorageError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(document.id(), document.to_json());
        Ok(())
    }

    fn lookup(&self, id: &Uuid) -> Result<Option<serde_json::Value>, StorageError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned())
    }
}
