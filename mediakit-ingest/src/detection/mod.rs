//! Cascade-classifier detection
//!
//! Object detectors of the Haar-cascade family return candidate regions but no
//! native confidence. `cascade` turns repeated passes at increasing strictness
//! into a bounded confidence; `enricher` wraps that in a pipeline processor.
//! The classifier itself is an external collaborator behind
//! [`ClassifierBackend`] and [`Detector`].

pub mod cascade;
pub mod enricher;

pub use cascade::{CascadeError, CascadeEstimator, CascadeLevel, CascadeResult};
pub use enricher::{CascadeEnricher, EnricherConfig};

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::InitError;
use crate::resources::ResourceBlob;

/// Detected axis-aligned region in pixel coordinates
///
/// `x`/`y` may be negative for detectors that report partially out-of-frame
/// boxes; consumers clamp to the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Corner coordinates clamped into a `frame_width`×`frame_height` frame
    ///
    /// Returns `(xmin, ymin, xmax, ymax)`.
    pub fn clamped(&self, frame_width: u32, frame_height: u32) -> (u32, u32, u32, u32) {
        let max_x = frame_width.saturating_sub(1) as i64;
        let max_y = frame_height.saturating_sub(1) as i64;
        let clamp_x = |v: i64| v.clamp(0, max_x) as u32;
        let clamp_y = |v: i64| v.clamp(0, max_y) as u32;

        let x = self.x as i64;
        let y = self.y as i64;
        (
            clamp_x(x),
            clamp_y(y),
            clamp_x(x + self.width as i64),
            clamp_y(y + self.height as i64),
        )
    }
}

/// Per-pass detector parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionParams {
    /// Image pyramid step; smaller is stricter
    pub scale_factor: f64,
    /// Overlapping hits required per detection; larger is stricter
    pub min_neighbors: u32,
    pub min_size: Option<(u32, u32)>,
    pub max_size: Option<(u32, u32)>,
}

#[derive(Debug, Error)]
#[error("Detector failed: {0}")]
pub struct DetectorError(pub String);

/// A loaded classifier
pub trait Detector: Send + Sync {
    fn detect(
        &self,
        image: &DynamicImage,
        params: &DetectionParams,
    ) -> Result<Vec<Region>, DetectorError>;
}

/// Builds detectors from cascade definition files
pub trait ClassifierBackend: Send + Sync {
    /// Parse a cascade definition; failure is fatal to worker startup
    fn load(&self, definition: &ResourceBlob) -> Result<Box<dyn Detector>, InitError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_clamped_to_frame() {
        let region = Region::new(-10, 5, 50, 200);
        assert_eq!(region.clamped(100, 100), (0, 5, 40, 99));

        let inside = Region::new(10, 10, 20, 20);
        assert_eq!(inside.clamped(100, 100), (10, 10, 30, 30));
    }
}
