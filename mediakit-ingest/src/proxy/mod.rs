//! Proxy (preview rendition) generation
//!
//! - `orientation` maps EXIF orientation codes to rotate/flip operations
//! - `generator` builds and stores the rendition cascade
//! - `tiny` derives the nine-color placeholder from the smallest rendition

pub mod generator;
pub mod orientation;
pub mod tiny;

pub use generator::{
    encode_proxy, generate_cascade, DerivedFrom, GeneratedProxy, ProxyFormat, ProxyProcessor,
    ProxySpec,
};
pub use orientation::{Flip, Orientation};
pub use tiny::tiny_proxy;
