//! Ingest worker
//!
//! Pulls file paths from a [`TaskSource`] and runs one pipeline per document on
//! the blocking thread pool, bounded by a semaphore. Documents never share
//! mutable state; the pipeline and index are shared read-only through `Arc`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use walkdir::{DirEntry, WalkDir};

use super::pipeline::{DocumentOutcome, Pipeline};
use crate::document::AssetDocument;
use crate::storage::SearchIndex;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}

/// Supplies the files a worker should ingest
pub trait TaskSource: Send + Sync {
    fn paths(&self) -> Result<Vec<PathBuf>, ScanError>;
}

/// Recursive directory walk over one or more roots
///
/// Roots may be files, which are yielded as-is. Symlinks are not followed.
pub struct DirectoryScanner {
    roots: Vec<PathBuf>,
    ignore_patterns: Vec<String>,
    max_depth: Option<usize>,
}

impl DirectoryScanner {
    /// Scanner ignoring common system files (.DS_Store, Thumbs.db, VCS dirs)
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            ignore_patterns: vec![
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
                ".git".to_string(),
                ".svn".to_string(),
            ],
            max_depth: None,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    fn should_process_entry(&self, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();
        !self.ignore_patterns.iter().any(|p| name.contains(p.as_str()))
    }

    fn walk(&self, root: &Path, out: &mut Vec<PathBuf>) {
        let walker = WalkDir::new(root)
            .follow_links(false)
            .max_depth(self.max_depth.unwrap_or(usize::MAX))
            .into_iter()
            .filter_entry(|e| self.should_process_entry(e));

        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() => out.push(entry.into_path()),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Error accessing entry"),
            }
        }
    }
}

impl TaskSource for DirectoryScanner {
    fn paths(&self) -> Result<Vec<PathBuf>, ScanError> {
        let mut paths = Vec::new();
        for root in &self.roots {
            if !root.exists() {
                return Err(ScanError::PathNotFound(root.clone()));
            }
            if root.is_file() {
                paths.push(root.clone());
            } else {
                self.walk(root, &mut paths);
            }
        }

        let mut seen = HashSet::new();
        paths.retain(|p| seen.insert(p.clone()));
        debug!(roots = self.roots.len(), files = paths.len(), "Scan complete");
        Ok(paths)
    }
}

/// Counters for one worker run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    /// Documents handed to the pipeline
    pub tried: usize,
    /// Documents that completed and were indexed
    pub completed: usize,
    pub skipped: usize,
    /// Failed documents, index write failures and panics
    pub errors: usize,
    /// Soft failures across all documents
    pub warnings: usize,
}

enum TaskResult {
    Indexed,
    Skipped,
    Failed,
}

/// Drives a pipeline over many documents
pub struct Worker {
    pipeline: Arc<Pipeline>,
    index: Arc<dyn SearchIndex>,
    concurrency: usize,
}

impl Worker {
    pub fn new(pipeline: Arc<Pipeline>, index: Arc<dyn SearchIndex>, concurrency: usize) -> Self {
        Self {
            pipeline,
            index,
            concurrency: concurrency.max(1),
        }
    }

    /// Ingest everything `source` yields
    pub async fn run(&self, source: &dyn TaskSource) -> Result<WorkerSummary, ScanError> {
        let paths = source.paths()?;
        Ok(self.run_paths(paths).await)
    }

    /// Ingest `paths`; files the pipeline does not accept are ignored
    pub async fn run_paths(&self, paths: Vec<PathBuf>) -> WorkerSummary {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut summary = WorkerSummary::default();

        for path in paths {
            if !self.pipeline.accepts(&path) {
                debug!(path = %path.display(), "Unsupported extension, not ingested");
                continue;
            }
            summary.tried += 1;

            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let pipeline = Arc::clone(&self.pipeline);
            let index = Arc::clone(&self.index);
            tasks.spawn_blocking(move || {
                let result = ingest_one(&pipeline, index.as_ref(), &path);
                drop(permit);
                result
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((result, warnings)) => {
                    summary.warnings += warnings;
                    match result {
                        TaskResult::Indexed => summary.completed += 1,
                        TaskResult::Skipped => summary.skipped += 1,
                        TaskResult::Failed => summary.errors += 1,
                    }
                }
                Err(e) => {
                    error!(error = %e, "Document task panicked");
                    summary.errors += 1;
                }
            }
        }

        info!(
            tried = summary.tried,
            completed = summary.completed,
            skipped = summary.skipped,
            errors = summary.errors,
            warnings = summary.warnings,
            "Worker run finished"
        );
        summary
    }
}

/// Process and index one document; runs on a blocking thread
///
/// Returns the result together with the document's soft-failure count.
fn ingest_one(pipeline: &Pipeline, index: &dyn SearchIndex, path: &Path) -> (TaskResult, usize) {
    let mut document = AssetDocument::new(path);

    match index.lookup(&document.id()) {
        Ok(Some(previous)) => document.with_previous_version(&previous),
        Ok(None) => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Previous version lookup failed"),
    }

    let report = pipeline.run(&mut document);
    let result = match report.outcome {
        DocumentOutcome::Completed => match index.index(&document) {
            Ok(()) => TaskResult::Indexed,
            Err(e) => {
                error!(id = %report.document_id, path = %path.display(), error = %e, "Index write failed");
                TaskResult::Failed
            }
        },
        DocumentOutcome::Skipped { .. } => TaskResult::Skipped,
        DocumentOutcome::Failed { .. } => TaskResult::Failed,
    };
    (result, report.warnings)
}
