//! Error types for mediakit-ingest
//!
//! Processor outcomes are split into three severities: a benign skip, an
//! unrecoverable document failure, and a soft failure that lets the chain
//! continue. Resource problems at startup are a separate type so they can never
//! be downgraded into per-document failures.

use std::path::PathBuf;
use thiserror::Error;

use crate::document::DocumentError;

/// Failure raised by a processor while handling one document
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// Benign: stop processing this document, do not index it, surface nothing
    #[error("Skipping document: {0}")]
    Skip(String),

    /// Required decode/parse failure: the document is marked errored
    #[error("Unrecoverable: {0}")]
    Unrecoverable(String),

    /// Optional enrichment could not produce a value; the chain continues
    #[error("Soft failure: {0}")]
    Soft(String),
}

impl ProcessorError {
    /// Benign skip of the current document
    pub fn skip(reason: impl Into<String>) -> Self {
        ProcessorError::Skip(reason.into())
    }

    /// Document-level failure
    pub fn unrecoverable(cause: impl Into<String>) -> Self {
        ProcessorError::Unrecoverable(cause.into())
    }

    /// Recoverable enrichment failure
    pub fn soft(cause: impl Into<String>) -> Self {
        ProcessorError::Soft(cause.into())
    }
}

/// A document model violation inside a processor is a bug in that processor's
/// output, not something a later processor can repair.
impl From<DocumentError> for ProcessorError {
    fn from(err: DocumentError) -> Self {
        ProcessorError::Unrecoverable(err.to_string())
    }
}

/// Resource-acquisition failure during `Processor::init`
///
/// Fatal to worker startup.
#[derive(Debug, Error)]
pub enum InitError {
    /// Required resource file does not exist
    #[error("Missing resource: {0}")]
    MissingResource(PathBuf),

    /// Resource exists but could not be read
    #[error("Unreadable resource {path}: {source}")]
    Unreadable {
        /// Resource path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Resource content was rejected by its consumer
    #[error("Invalid resource {name}: {reason}")]
    InvalidResource {
        /// Resource name relative to the model root
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// Processor configuration rejected at startup
    #[error("Invalid processor configuration for {processor}: {reason}")]
    Config {
        /// Processor name
        processor: String,
        /// What is wrong
        reason: String,
    },
}
