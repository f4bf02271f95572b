//! Core Types and Trait Definitions for mediakit-ingest
//!
//! Defines the `Processor` trait every pipeline stage implements and the coarse
//! `MediaKind` supertype used to gate processor applicability.

use serde::{Deserialize, Serialize};

use crate::document::AssetDocument;
use crate::error::{InitError, ProcessorError};
use crate::resources::ModelResources;

// ============================================================================
// Media kinds
// ============================================================================

/// Coarse media-kind classification (supertype)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Raster or camera-raw images
    Image,
    /// Video containers
    Video,
    /// Audio files
    Audio,
    /// Office documents, PDFs, plain text
    Document,
    /// Anything else
    Other,
}

impl MediaKind {
    /// Supertype from a MIME type (`image/jpeg` → Image)
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.trim().to_ascii_lowercase();
        match mime.split('/').next().unwrap_or("") {
            "image" => MediaKind::Image,
            "video" => MediaKind::Video,
            "audio" => MediaKind::Audio,
            "text" => MediaKind::Document,
            "application" if is_document_subtype(&mime) => MediaKind::Document,
            _ => MediaKind::Other,
        }
    }

    /// Supertype guessed from a file extension (case-insensitive)
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "gif" | "bmp" | "tif" | "tiff" | "webp" | "heic" | "cr2"
            | "nef" | "dng" | "arw" => MediaKind::Image,
            "mp4" | "mov" | "avi" | "mkv" | "webm" | "m4v" | "mpg" | "mpeg" => MediaKind::Video,
            "mp3" | "flac" | "wav" | "ogg" | "m4a" | "aac" | "opus" => MediaKind::Audio,
            "pdf" | "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx" | "txt" | "rtf" | "odt"
            | "csv" => MediaKind::Document,
            _ => MediaKind::Other,
        }
    }

    /// Lowercase name as stored in `source.superType`
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Document => "document",
            MediaKind::Other => "other",
        }
    }

    /// Inverse of [`MediaKind::as_str`]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "image" => Some(MediaKind::Image),
            "video" => Some(MediaKind::Video),
            "audio" => Some(MediaKind::Audio),
            "document" => Some(MediaKind::Document),
            "other" => Some(MediaKind::Other),
            _ => None,
        }
    }
}

fn is_document_subtype(mime: &str) -> bool {
    mime == "application/pdf"
        || mime == "application/rtf"
        || mime == "application/msword"
        || mime.starts_with("application/vnd.openxmlformats-officedocument")
        || mime.starts_with("application/vnd.ms-")
        || mime.starts_with("application/vnd.oasis.opendocument")
}

// ============================================================================
// Processor trait
// ============================================================================

/// One pipeline stage reading and writing the Asset Document
///
/// Processors run sequentially, in declared order, on the worker thread that
/// owns the document. A processor may read attributes written by any earlier
/// processor in the same run, never by a later one.
///
/// # Lifecycle
/// 1. [`init`](Processor::init) is called once per worker process, before any
///    document is processed. Returning an error aborts worker startup.
/// 2. [`process`](Processor::process) is called once per applicable document.
///    It must be idempotent: check [`AssetDocument::is_changed`] and
///    [`AssetDocument::attr_exists`] before redoing work.
///
/// # Example
/// ```rust,ignore
/// use mediakit_ingest::types::Processor;
/// use mediakit_ingest::document::AssetDocument;
/// use mediakit_ingest::error::ProcessorError;
///
/// pub struct TitleProcessor;
///
/// impl Processor for TitleProcessor {
///     fn name(&self) -> &str { "title" }
///
///     fn process(&self, doc: &mut AssetDocument) -> Result<(), ProcessorError> {
///         if doc.attr_exists("user.title") && !doc.is_changed() {
///             return Ok(());
///         }
///         let title = doc.basename().to_string();
///         doc.set_attr("user.title", title)?;
///         Ok(())
///     }
/// }
/// ```
pub trait Processor: Send + Sync {
    /// Processor name for logging and event reporting
    fn name(&self) -> &str;

    /// File extensions (lowercase, no dot) this processor handles
    ///
    /// Empty means every extension.
    fn supported_extensions(&self) -> &[&'static str] {
        &[]
    }

    /// Media kinds this processor handles
    ///
    /// Empty means every kind.
    fn supported_kinds(&self) -> &[MediaKind] {
        &[]
    }

    /// One-time, process-wide initialization
    ///
    /// Load model weights, cascade definitions or palettes here. Any failure
    /// is fatal to worker startup.
    fn init(&mut self, _resources: &ModelResources) -> Result<(), InitError> {
        Ok(())
    }

    /// Process one document
    ///
    /// # Errors
    /// - [`ProcessorError::Skip`] aborts the remaining chain, document not indexed
    /// - [`ProcessorError::Unrecoverable`] aborts the document and marks it errored
    /// - [`ProcessorError::Soft`] is logged and the chain continues
    fn process(&self, document: &mut AssetDocument) -> Result<(), ProcessorError>;
}

// ============================================================================
// Tests
// ============================================================================
