//! Test helper utilities
//!
//! Shared utilities for mediakit-ingest integration tests

#![allow(dead_code)]

pub mod image_generator;
pub mod log_capture;

pub use image_generator::{write_gradient_jpeg, write_gradient_png, CountingStore};
pub use log_capture::LogCapture;
