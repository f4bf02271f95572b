//! Source extraction: the `source` and `links` namespaces
//!
//! Runs first in every pipeline. Records filesystem facts and the detected MIME
//! type, then applies the secondary-representation convention: files sharing a
//! basename in one directory belong together, and sidecar extensions (`.xmp`,
//! `.thm`, ...) are secondary when a primary sibling exists.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::document::{file_stamp, AssetDocument, LinkSchema, SourceSchema};
use crate::error::ProcessorError;
use crate::types::{MediaKind, Processor};

/// Extensions treated as secondary representations by default
pub fn default_sidecar_extensions() -> Vec<String> {
    ["xmp", "thm", "json"].iter().map(|s| s.to_string()).collect()
}

/// MIME type by extension, for files whose magic bytes are not recognized
pub fn mime_from_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "mp3" => "audio/mpeg",
        "flac" => "audio/flac",
        "wav" => "audio/wav",
        "pdf" => "application/pdf",
        "txt" | "csv" => "text/plain",
        "xmp" => "application/rdf+xml",
        "json" => "application/json",
        _ => return None,
    };
    Some(mime)
}

/// Populates `source` and discovers secondary representations
pub struct SourceProcessor {
    sidecar_extensions: Vec<String>,
}

impl Default for SourceProcessor {
    fn default() -> Self {
        Self::new(default_sidecar_extensions())
    }
}

impl SourceProcessor {
    pub fn new(sidecar_extensions: Vec<String>) -> Self {
        Self {
            sidecar_extensions: sidecar_extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    fn is_sidecar(&self, ext: &str) -> bool {
        self.sidecar_extensions.iter().any(|s| s == ext)
    }

    /// Other files in the same directory with the same basename
    fn siblings(&self, document: &AssetDocument) -> Vec<PathBuf> {
        let Some(dir) = document.directory() else {
            return Vec::new();
        };
        let basename = document.basename();
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Vec::new();
        };

        let mut siblings: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.as_path() != document.path())
            .filter(|p| p.file_stem().is_some_and(|s| s.to_string_lossy() == basename))
            .collect();
        siblings.sort();
        siblings
    }

    fn detect_mime(&self, path: &Path, ext: &str) -> Option<String> {
        match infer::get_from_path(path) {
            Ok(Some(kind)) => return Some(kind.mime_type().to_string()),
            Ok(None) => {}
            Err(e) => debug!(path = %path.display(), error = %e, "MIME sniffing failed"),
        }
        mime_from_extension(ext).map(str::to_string)
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

impl Processor for SourceProcessor {
    fn name(&self) -> &str {
        "source"
    }

    fn process(&self, document: &mut AssetDocument) -> Result<(), ProcessorError> {
        let path = document.path().to_path_buf();
        let meta = std::fs::metadata(&path).map_err(|e| {
            ProcessorError::unrecoverable(format!("Unable to stat {}: {}", path.display(), e))
        })?;
        let ext = document.extension();
        let siblings = self.siblings(document);

        if self.is_sidecar(&ext) {
            if let Some(primary) = siblings
                .iter()
                .find(|p| !self.is_sidecar(&extension_of(p)))
            {
                return Err(ProcessorError::skip(format!(
                    "{} is a secondary representation of {}",
                    path.display(),
                    primary.display()
                )));
            }
        }

        let (file_size, time_modified) = file_stamp(&meta);
        let mime_type = self.detect_mime(&path, &ext);
        let super_type = match &mime_type {
            Some(mime) if !mime.eq_ignore_ascii_case("application/octet-stream") => {
                MediaKind::from_mime(mime)
            }
            _ => MediaKind::from_extension(&ext),
        };

        let schema = SourceSchema {
            path: Some(path.to_string_lossy().into_owned()),
            directory: document
                .directory()
                .map(|d| d.to_string_lossy().into_owned()),
            filename: Some(document.filename()),
            basename: Some(document.basename()),
            extension: Some(ext.clone()),
            file_size: Some(file_size),
            time_modified,
            mime_type,
            super_type: Some(super_type.as_str().to_string()),
            date: None,
        };
        document.set_schema(schema)?;

        if !self.is_sidecar(&ext) {
            let secondary: Vec<String> = siblings
                .iter()
                .filter(|p| self.is_sidecar(&extension_of(p)))
                .map(|p| p.to_string_lossy().into_owned())
                .collect();
            if !secondary.is_empty() {
                debug!(path = %path.display(), count = secondary.len(), "Found secondary representations");
                document.set_schema(LinkSchema { secondary })?;
            }
        }
        Ok(())
    }
}
