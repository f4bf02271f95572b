//! # mediakit Common Library
//!
//! Shared code for the mediakit ingest workers including:
//! - Error type shared across crates
//! - Configuration loading (TOML file, environment, model-resource root)
//! - Ingest event types (IngestEvent enum) and the EventBus

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
