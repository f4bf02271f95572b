//! mediakit-ingest library interface
//!
//! Media asset ingestion and enrichment: each file becomes an
//! [`AssetDocument`](document::AssetDocument) that an ordered chain of
//! [`Processor`](types::Processor)s fills with source facts, embedded
//! metadata, proxy renditions and detector labels before it is indexed.

pub mod config;
pub mod detection;
pub mod document;
pub mod error;
pub mod extractors;
pub mod proxy;
pub mod resources;
pub mod storage;
pub mod types;
pub mod workflow;

pub use crate::document::AssetDocument;
pub use crate::error::{InitError, ProcessorError};
pub use crate::resources::ModelResources;
pub use crate::types::{MediaKind, Processor};
