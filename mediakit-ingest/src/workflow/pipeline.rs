//! Pipeline executor
//!
//! Runs an ordered processor chain over one asset document.
//!
//! # Outcomes
//! - **Skip**: remaining processors are not run; the document is not indexed
//! - **Unrecoverable**: the document is marked failed and excluded from the index
//! - **Soft**: counted as a warning; later processors still run
//!
//! The decoded raster is released on every exit path, including panics inside
//! a processor.
//!
//! # Example
//! ```rust,ignore
//! let pipeline = PipelineBuilder::new()
//!     .add(SourceProcessor::default())
//!     .add(MetadataProcessor::default())
//!     .build(&resources)?;
//! let report = pipeline.run(&mut AssetDocument::new("photo.jpg"));
//! ```

use std::collections::BTreeSet;
use std::ops::{Deref, DerefMut};
use std::path::Path;

use mediakit_common::events::{EventBus, IngestEvent};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::dispatch;
use crate::document::AssetDocument;
use crate::error::{InitError, ProcessorError};
use crate::resources::ModelResources;
use crate::types::Processor;

/// How a document left the pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOutcome {
    /// Every applicable processor ran
    Completed,
    /// A processor asked for the document to be dropped
    Skipped { processor: String, reason: String },
    /// A processor hit an unrecoverable failure
    Failed { processor: String, cause: String },
}

impl DocumentOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, DocumentOutcome::Completed)
    }
}

/// Result of one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub document_id: Uuid,
    pub outcome: DocumentOutcome,
    /// Soft failures encountered
    pub warnings: usize,
    /// Processors whose `process` was invoked
    pub processors_run: Vec<String>,
}

/// Collects processors, then initializes them against the model resources
#[derive(Default)]
pub struct PipelineBuilder {
    processors: Vec<Box<dyn Processor>>,
    events: Option<EventBus>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a processor; execution order is insertion order
    pub fn add(self, processor: impl Processor + 'static) -> Self {
        self.add_boxed(Box::new(processor))
    }

    pub fn add_boxed(mut self, processor: Box<dyn Processor>) -> Self {
        self.processors.push(processor);
        self
    }

    /// Emit progress events on `bus`
    pub fn with_events(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Run every processor's `init` and freeze the chain
    ///
    /// # Errors
    /// The first [`InitError`]; a pipeline is never built with a processor
    /// that failed to acquire its resources.
    pub fn build(mut self, resources: &ModelResources) -> Result<Pipeline, InitError> {
        for processor in self.processors.iter_mut() {
            processor.init(resources)?;
            debug!(processor = processor.name(), "Processor initialized");
        }
        let extensions = dispatch::supported_extensions(self.processors.iter().map(|p| p.as_ref()));
        info!(
            processors = self.processors.len(),
            extensions = ?extensions,
            "Pipeline ready"
        );
        Ok(Pipeline {
            processors: self.processors,
            extensions,
            events: self.events,
        })
    }
}

/// Initialized processor chain, shared read-only across worker tasks
pub struct Pipeline {
    processors: Vec<Box<dyn Processor>>,
    extensions: Option<BTreeSet<String>>,
    events: Option<EventBus>,
}

/// Closes the document when dropped
struct CloseGuard<'a>(&'a mut AssetDocument);

impl Deref for CloseGuard<'_> {
    type Target = AssetDocument;

    fn deref(&self) -> &AssetDocument {
        self.0
    }
}

impl DerefMut for CloseGuard<'_> {
    fn deref_mut(&mut self) -> &mut AssetDocument {
        self.0
    }
}

impl Drop for CloseGuard<'_> {
    fn drop(&mut self) {
        self.0.close();
    }
}

impl Pipeline {
    pub fn processor_names(&self) -> Vec<&str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    /// Extensions this pipeline ingests; `None` accepts all
    pub fn supported_extensions(&self) -> Option<&BTreeSet<String>> {
        self.extensions.as_ref()
    }

    /// Whether a file should be ingested at all
    pub fn accepts(&self, path: &Path) -> bool {
        let Some(extensions) = &self.extensions else {
            return true;
        };
        path.extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .is_some_and(|e| extensions.contains(&e))
    }

    fn emit(&self, event: IngestEvent) {
        if let Some(bus) = &self.events {
            bus.emit_lossy(event);
        }
    }

    /// Run the chain over `document`
    ///
    /// Never fails: processor failures are folded into the report's outcome.
    pub fn run(&self, document: &mut AssetDocument) -> PipelineReport {
        let mut doc = CloseGuard(document);
        let document_id = doc.id();
        let path = doc.path().to_string_lossy().into_owned();

        debug!(id = %document_id, path = %path, "Document started");
        self.emit(IngestEvent::DocumentStarted {
            document_id,
            path: path.clone(),
            timestamp: chrono::Utc::now(),
        });

        let mut warnings = 0;
        let mut processors_run = Vec::new();

        for processor in &self.processors {
            if !dispatch::is_applicable(processor.as_ref(), &doc) {
                continue;
            }
            let name = processor.name().to_string();
            processors_run.push(name.clone());

            match processor.process(&mut doc) {
                Ok(()) => {
                    self.emit(IngestEvent::ProcessorCompleted {
                        document_id,
                        processor: name,
                        success: true,
                    });
                }
                Err(ProcessorError::Soft(cause)) => {
                    warn!(id = %document_id, path = %path, processor = %name, cause = %cause, "Processor soft failure");
                    warnings += 1;
                    self.emit(IngestEvent::ProcessorCompleted {
                        document_id,
                        processor: name,
                        success: false,
                    });
                }
                Err(ProcessorError::Skip(reason)) => {
                    debug!(id = %document_id, path = %path, processor = %name, reason = %reason, "Document skipped");
                    self.emit(IngestEvent::DocumentSkipped {
                        document_id,
                        path,
                        reason: reason.clone(),
                    });
                    return PipelineReport {
                        document_id,
                        outcome: DocumentOutcome::Skipped {
                            processor: name,
                            reason,
                        },
                        warnings,
                        processors_run,
                    };
                }
                Err(ProcessorError::Unrecoverable(cause)) => {
                    warn!(id = %document_id, path = %path, processor = %name, cause = %cause, "Document failed");
                    self.emit(IngestEvent::DocumentFailed {
                        document_id,
                        path,
                        processor: name.clone(),
                        message: cause.clone(),
                    });
                    return PipelineReport {
                        document_id,
                        outcome: DocumentOutcome::Failed {
                            processor: name,
                            cause,
                        },
                        warnings,
                        processors_run,
                    };
                }
            }
        }

        debug!(id = %document_id, path = %path, warnings, "Document completed");
        self.emit(IngestEvent::DocumentCompleted {
            document_id,
            path,
            warnings,
            timestamp: chrono::Utc::now(),
        });
        PipelineReport {
            document_id,
            outcome: DocumentOutcome::Completed,
            warnings,
            processors_run,
        }
    }
}
