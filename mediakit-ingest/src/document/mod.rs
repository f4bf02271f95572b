//! Asset Document: the mutable record for one source file
//!
//! Attributes live in namespaced maps addressed by dot-delimited paths
//! (`image.Exif.Make`, `source.fileSize`). The first segment is the namespace,
//! the rest are nested map keys created on demand. Keywords are kept apart in a
//! [`KeywordAccumulator`]. The decoded raster is cached on the document for
//! the length of one pipeline run and released by [`AssetDocument::close`].

pub mod keywords;
pub mod schema;
pub mod value;

pub use keywords::{Keyword, KeywordAccumulator, DEFAULT_KEYWORD_NAMESPACE};
pub use schema::{
    ImageSchema, LinkSchema, LocationSchema, Proxy, ProxySchema, Schema, SourceSchema,
    TypedSchema, UserSchema,
};
pub use value::AttrValue;

use chrono::{DateTime, Utc};
use image::DynamicImage;
use std::collections::BTreeMap;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::types::MediaKind;

/// Document model violations
#[derive(Debug, Error, PartialEq)]
pub enum DocumentError {
    /// Path is empty or has an empty segment (`a..b`)
    #[error("Invalid attribute path: '{0}'")]
    EmptyPath(String),

    /// A path segment resolves to a non-map value
    #[error("Cannot write '{0}': parent is not a map")]
    NotAContainer(String),

    /// Namespace content does not match its typed schema
    #[error("Schema '{namespace}' invalid: {reason}")]
    Schema {
        namespace: String,
        reason: String,
    },
}

/// Size and modification time (milliseconds since epoch) of a file
pub(crate) fn file_stamp(meta: &Metadata) -> (u64, Option<i64>) {
    let modified = meta
        .modified()
        .ok()
        .map(|t| DateTime::<Utc>::from(t).timestamp_millis());
    (meta.len(), modified)
}

/// Per-file attribute and keyword store
#[derive(Debug)]
pub struct AssetDocument {
    id: Uuid,
    path: PathBuf,
    attrs: BTreeMap<String, AttrValue>,
    keywords: KeywordAccumulator,
    changed: bool,
    update: bool,
    image: Option<DynamicImage>,
}

impl AssetDocument {
    /// Create a document for `path`
    ///
    /// Relative paths are made absolute against the current directory. The id
    /// is a name-based UUID of the absolute path, stable across runs.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        };
        let id = Uuid::new_v5(&Uuid::NAMESPACE_URL, absolute.to_string_lossy().as_bytes());

        Self {
            id,
            path: absolute,
            attrs: BTreeMap::new(),
            keywords: KeywordAccumulator::new(),
            changed: true,
            update: false,
            image: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lowercase extension without the dot, empty when there is none
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default()
    }

    /// File name without extension
    pub fn basename(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn directory(&self) -> Option<&Path> {
        self.path.parent()
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    pub fn attr_exists(&self, path: &str) -> bool {
        self.get_attr(path).is_some()
    }

    pub fn get_attr(&self, path: &str) -> Option<&AttrValue> {
        let mut segments = path.split('.');
        let mut current = self.attrs.get(segments.next()?)?;
        for segment in segments {
            current = current.as_map()?.get(segment)?;
        }
        Some(current)
    }

    pub fn get_i64(&self, path: &str) -> Option<i64> {
        self.get_attr(path).and_then(AttrValue::as_i64)
    }

    pub fn get_f64(&self, path: &str) -> Option<f64> {
        self.get_attr(path).and_then(AttrValue::as_f64)
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get_attr(path).and_then(AttrValue::as_str)
    }

    pub fn get_date(&self, path: &str) -> Option<DateTime<Utc>> {
        self.get_attr(path).and_then(AttrValue::as_date)
    }

    /// Write `value` at `path`, creating intermediate maps on demand
    ///
    /// # Errors
    /// - [`DocumentError::EmptyPath`] for an empty path or empty segment
    /// - [`DocumentError::NotAContainer`] when a parent segment holds a non-map
    pub fn set_attr(&mut self, path: &str, value: impl Into<AttrValue>) -> Result<(), DocumentError> {
        let mut segments: Vec<&str> = path.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(DocumentError::EmptyPath(path.to_string()));
        }
        let Some(leaf) = segments.pop() else {
            return Err(DocumentError::EmptyPath(path.to_string()));
        };

        let mut current = &mut self.attrs;
        for segment in segments {
            current = current
                .entry(segment.to_string())
                .or_insert_with(AttrValue::empty_map)
                .as_map_mut()
                .ok_or_else(|| DocumentError::NotAContainer(path.to_string()))?;
        }
        current.insert(leaf.to_string(), value.into());
        Ok(())
    }

    /// Merge a typed schema into its namespace
    pub fn set_schema(&mut self, schema: impl Into<Schema>) -> Result<(), DocumentError> {
        let schema = schema.into();
        let namespace = schema.namespace();
        let json = schema.to_json().map_err(|e| DocumentError::Schema {
            namespace: namespace.to_string(),
            reason: e.to_string(),
        })?;

        let AttrValue::Map(fields) = AttrValue::from_json(&json) else {
            return Err(DocumentError::Schema {
                namespace: namespace.to_string(),
                reason: "schema did not serialize to a map".to_string(),
            });
        };

        let target = self
            .attrs
            .entry(namespace.to_string())
            .or_insert_with(AttrValue::empty_map)
            .as_map_mut()
            .ok_or_else(|| DocumentError::NotAContainer(namespace.to_string()))?;
        target.extend(fields);
        Ok(())
    }

    /// Read a typed schema; `Ok(None)` when the namespace is absent
    pub fn get_schema<T: TypedSchema>(&self) -> Result<Option<T>, DocumentError> {
        let Some(value) = self.attrs.get(T::NAMESPACE) else {
            return Ok(None);
        };
        serde_json::from_value(value.to_json())
            .map(Some)
            .map_err(|e| DocumentError::Schema {
                namespace: T::NAMESPACE.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn attributes(&self) -> &BTreeMap<String, AttrValue> {
        &self.attrs
    }

    // ========================================================================
    // Keywords
    // ========================================================================

    /// Add keywords to the default namespace
    pub fn add_keywords<I, S>(&mut self, confidence: f64, suggest: bool, words: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.keywords
            .add(DEFAULT_KEYWORD_NAMESPACE, confidence, suggest, words);
    }

    pub fn add_keywords_to<I, S>(&mut self, namespace: &str, confidence: f64, suggest: bool, words: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.keywords.add(namespace, confidence, suggest, words);
    }

    pub fn keywords(&self) -> &KeywordAccumulator {
        &self.keywords
    }

    // ========================================================================
    // Change tracking
    // ========================================================================

    /// True when the source changed since it was last indexed (or never was)
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn set_changed(&mut self, changed: bool) {
        self.changed = changed;
    }

    /// True when a previously indexed version was merged in
    pub fn is_update(&self) -> bool {
        self.update
    }

    /// Merge a previously indexed version (as produced by [`to_json`](Self::to_json))
    ///
    /// Prior attributes and keywords are carried forward; attributes already
    /// set on this document win. The document counts as unchanged only when
    /// both the file size and the modification time recorded in the previous
    /// version match the file on disk.
    pub fn with_previous_version(&mut self, previous: &serde_json::Value) {
        if let Some(AttrValue::Map(prior)) = previous.get("attributes").map(AttrValue::from_json) {
            for (namespace, value) in prior {
                match self.attrs.get_mut(&namespace) {
                    None => {
                        self.attrs.insert(namespace, value);
                    }
                    Some(AttrValue::Map(current)) => {
                        if let AttrValue::Map(old) = value {
                            for (key, old_value) in old {
                                current.entry(key).or_insert(old_value);
                            }
                        }
                    }
                    Some(_) => {}
                }
            }
        }
        if let Some(keywords) = previous.get("keywords") {
            self.keywords.merge(&KeywordAccumulator::from_json(keywords));
        }

        let prior_size = previous
            .pointer("/attributes/source/fileSize")
            .and_then(serde_json::Value::as_u64);
        let prior_modified = previous
            .pointer("/attributes/source/timeModified")
            .and_then(serde_json::Value::as_i64);

        let unchanged = match std::fs::metadata(&self.path) {
            Ok(meta) => {
                let (size, modified) = file_stamp(&meta);
                prior_size == Some(size) && prior_modified.is_some() && prior_modified == modified
            }
            Err(_) => false,
        };

        self.update = true;
        self.changed = !unchanged;
        debug!(id = %self.id, changed = self.changed, "Merged previous version");
    }

    // ========================================================================
    // Media kind
    // ========================================================================

    /// Supertype from `source.superType`, falling back to the extension
    pub fn super_type(&self) -> MediaKind {
        self.get_str("source.superType")
            .and_then(MediaKind::parse)
            .unwrap_or_else(|| MediaKind::from_extension(&self.extension()))
    }

    pub fn is_super_type(&self, kind: MediaKind) -> bool {
        self.super_type() == kind
    }

    // ========================================================================
    // Raster
    // ========================================================================

    /// Decoded raster, decoding the source on first use
    pub fn load_image(&mut self) -> Result<&DynamicImage, image::ImageError> {
        let decoded = match self.image.take() {
            Some(image) => image,
            None => {
                debug!(path = %self.path.display(), "Decoding raster");
                image::io::Reader::open(&self.path)?
                    .with_guessed_format()?
                    .decode()?
            }
        };
        Ok(self.image.insert(decoded))
    }

    /// Raster if already decoded
    pub fn image(&self) -> Option<&DynamicImage> {
        self.image.as_ref()
    }

    pub fn set_image(&mut self, image: DynamicImage) {
        self.image = Some(image);
    }

    /// Release the decoded raster
    pub fn close(&mut self) {
        if self.image.take().is_some() {
            debug!(id = %self.id, "Released raster");
        }
    }

    /// Serialize id, path, attributes and keywords for the search index
    pub fn to_json(&self) -> serde_json::Value {
        let attributes = self
            .attrs
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::json!({
            "id": self.id.to_string(),
            "path": self.path.to_string_lossy(),
            "attributes": attributes,
            "keywords": self.keywords.to_json(),
        })
    }
}
