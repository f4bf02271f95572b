//! Metadata extractors
//!
//! - `source_extractor` fills the `source` namespace and links sidecars
//! - `exif_reader` reads embedded tags into a flat `RawTag` list
//! - `metadata_extractor` stores those tags and derives date, location,
//!   dimensions and rating

pub mod exif_reader;
pub mod metadata_extractor;
pub mod source_extractor;

pub use exif_reader::{MetadataError, RawTag, TagValue};
pub use metadata_extractor::{BestDateSelector, MetadataProcessor};
pub use source_extractor::SourceProcessor;
