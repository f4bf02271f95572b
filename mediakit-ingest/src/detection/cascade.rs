//! Cascade detector confidence estimation
//!
//! The detector is run once per level, loosest first. Each pass that finds at
//! least one region replaces the recorded regions and confidence; the first
//! empty pass stops the cascade, since a region that fails a level cannot pass
//! a stricter one. Afterwards, regions taller than `large_ratio` of the frame
//! add their relative height to the confidence (capped at 1.0) and mark the
//! result as a large object.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use super::Region;

/// Default relative height above which a region counts as large
pub const DEFAULT_LARGE_RATIO: f64 = 0.05;

#[derive(Debug, Error, PartialEq)]
pub enum CascadeError {
    #[error("Cascade has no levels")]
    Empty,

    #[error("Level {index} is not stricter than the previous level, or its confidence does not increase")]
    NotMonotonic { index: usize },

    #[error("Level {index} confidence {confidence} is outside (0, 1]")]
    ConfidenceOutOfRange { index: usize, confidence: f64 },
}

/// One strictness level and the confidence a hit at that level earns
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CascadeLevel {
    pub scale_factor: f64,
    pub min_neighbors: u32,
    pub confidence: f64,
}

impl CascadeLevel {
    pub fn new(scale_factor: f64, min_neighbors: u32, confidence: f64) -> Self {
        Self {
            scale_factor,
            min_neighbors,
            confidence,
        }
    }

    /// At least as strict as `prev` on both axes and stricter on one
    fn stricter_than(&self, prev: &CascadeLevel) -> bool {
        let not_looser =
            self.scale_factor <= prev.scale_factor && self.min_neighbors >= prev.min_neighbors;
        let strictly =
            self.scale_factor < prev.scale_factor || self.min_neighbors > prev.min_neighbors;
        not_looser && strictly
    }
}

/// Levels used by the logo detector
pub fn default_levels() -> Vec<CascadeLevel> {
    vec![
        CascadeLevel::new(1.0075, 20, 0.1),
        CascadeLevel::new(1.0075, 30, 0.2),
        CascadeLevel::new(1.005, 40, 0.3),
        CascadeLevel::new(1.005, 60, 0.5),
    ]
}

/// Outcome of one cascade run
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeResult {
    /// Final confidence in [0, 1]; 0 when nothing was detected
    pub confidence: f64,
    /// Regions from the strictest successful pass
    pub regions: Vec<Region>,
    /// Number of passes that found at least one region
    pub passes: usize,
    /// True when the size boost fired
    pub large: bool,
    /// Confidence after each successful pass, before the size boost
    pub trace: Vec<f64>,
}

impl CascadeResult {
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// Validated level list plus size-boost ratio
#[derive(Debug, Clone)]
pub struct CascadeEstimator {
    levels: Vec<CascadeLevel>,
    large_ratio: f64,
}

impl CascadeEstimator {
    /// Validate levels: non-empty, confidences in (0, 1] and strictly
    /// increasing, each level stricter than the one before
    pub fn new(levels: Vec<CascadeLevel>, large_ratio: f64) -> Result<Self, CascadeError> {
        if levels.is_empty() {
            return Err(CascadeError::Empty);
        }
        for (index, level) in levels.iter().enumerate() {
            if !(level.confidence > 0.0 && level.confidence <= 1.0) {
                return Err(CascadeError::ConfidenceOutOfRange {
                    index,
                    confidence: level.confidence,
                });
            }
            if index > 0 {
                let prev = &levels[index - 1];
                if !level.stricter_than(prev) || level.confidence <= prev.confidence {
                    return Err(CascadeError::NotMonotonic { index });
                }
            }
        }
        Ok(Self {
            levels,
            large_ratio,
        })
    }

    pub fn levels(&self) -> &[CascadeLevel] {
        &self.levels
    }

    pub fn large_ratio(&self) -> f64 {
        self.large_ratio
    }

    /// Run `detect` at each level and estimate confidence
    ///
    /// `frame_height` is the height of the image the regions refer to. A
    /// detector error aborts the run.
    pub fn estimate<E>(
        &self,
        frame_height: u32,
        mut detect: impl FnMut(&CascadeLevel) -> Result<Vec<Region>, E>,
    ) -> Result<CascadeResult, E> {
        let mut result = CascadeResult {
            confidence: 0.0,
            regions: Vec::new(),
            passes: 0,
            large: false,
            trace: Vec::new(),
        };

        for level in &self.levels {
            let regions = detect(level)?;
            trace!(
                scale_factor = level.scale_factor,
                min_neighbors = level.min_neighbors,
                hits = regions.len(),
                "Cascade pass"
            );
            if regions.is_empty() {
                break;
            }
            result.confidence = level.confidence;
            result.regions = regions;
            result.passes += 1;
            result.trace.push(level.confidence);
        }

        if frame_height > 0 {
            for region in &result.regions {
                let relative = region.height as f64 / frame_height as f64;
                if relative > self.large_ratio {
                    result.confidence = (result.confidence + relative).min(1.0);
                    result.large = true;
                }
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn small() -> Region {
        Region::new(10, 10, 20, 20)
    }

    /// Detector that finds `hits` regions at the first `passing` levels
    fn scripted(passing: usize, hits: Vec<Region>) -> impl FnMut(&CascadeLevel) -> Result<Vec<Region>, Infallible> {
        let mut calls = 0;
        move |_| {
            calls += 1;
            Ok(if calls <= passing { hits.clone() } else { Vec::new() })
        }
    }

    #[test]
    fn test_default_levels_validate() {
        let estimator = CascadeEstimator::new(default_levels(), DEFAULT_LARGE_RATIO).unwrap();
        assert_eq!(estimator.levels().len(), 4);
    }

    #[test]
    fn test_rejects_non_monotonic_levels() {
        assert_eq!(
            CascadeEstimator::new(Vec::new(), 0.05).unwrap_err(),
            CascadeError::Empty
        );

        let looser = vec![CascadeLevel::new(1.005, 40, 0.3), CascadeLevel::new(1.01, 60, 0.5)];
        assert_eq!(
            CascadeEstimator::new(looser, 0.05).unwrap_err(),
            CascadeError::NotMonotonic { index: 1 }
        );

        let flat_confidence = vec![CascadeLevel::new(1.01, 20, 0.3), CascadeLevel::new(1.01, 30, 0.3)];
        assert!(CascadeEstimator::new(flat_confidence, 0.05).is_err());

        let same_strictness = vec![CascadeLevel::new(1.01, 20, 0.3), CascadeLevel::new(1.01, 20, 0.4)];
        assert!(CascadeEstimator::new(same_strictness, 0.05).is_err());

        let out_of_range = vec![CascadeLevel::new(1.01, 20, 1.5)];
        assert!(matches!(
            CascadeEstimator::new(out_of_range, 0.05),
            Err(CascadeError::ConfidenceOutOfRange { .. })
        ));
    }

    #[test]
    fn test_halts_at_first_empty_pass() {
        let estimator = CascadeEstimator::new(default_levels(), DEFAULT_LARGE_RATIO).unwrap();
        let mut calls = 0;
        let result = estimator
            .estimate(1000, |level| {
                calls += 1;
                Ok::<_, Infallible>(if level.min_neighbors <= 30 {
                    vec![small()]
                } else {
                    Vec::new()
                })
            })
            .unwrap();

        assert_eq!(calls, 3);
        assert_eq!(result.passes, 2);
        assert_eq!(result.confidence, 0.2);
        assert!(!result.large);
    }

    #[test]
    fn test_confidence_non_decreasing_across_passes() {
        let estimator = CascadeEstimator::new(default_levels(), DEFAULT_LARGE_RATIO).unwrap();
        let result = estimator.estimate(1000, scripted(4, vec![small()])).unwrap();

        assert_eq!(result.trace, vec![0.1, 0.2, 0.3, 0.5]);
        assert!(result.trace.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn test_no_detection_is_zero_confidence() {
        let estimator = CascadeEstimator::new(default_levels(), DEFAULT_LARGE_RATIO).unwrap();
        let result = estimator.estimate(1000, scripted(0, vec![small()])).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.passes, 0);
    }

    #[test]
    fn test_large_region_boost_is_capped() {
        let estimator = CascadeEstimator::new(default_levels(), DEFAULT_LARGE_RATIO).unwrap();

        // 100 / 1000 = 0.1 relative height
        let result = estimator
            .estimate(1000, scripted(4, vec![Region::new(0, 0, 100, 100)]))
            .unwrap();
        assert!(result.large);
        assert!((result.confidence - 0.6).abs() < 1e-12);

        let huge = vec![Region::new(0, 0, 900, 900), Region::new(0, 0, 800, 800)];
        let result = estimator.estimate(1000, scripted(4, huge)).unwrap();
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_detector_error_propagates() {
        let estimator = CascadeEstimator::new(default_levels(), DEFAULT_LARGE_RATIO).unwrap();
        let err = estimator
            .estimate(100, |_| Err::<Vec<Region>, _>("backend crashed"))
            .unwrap_err();
        assert_eq!(err, "backend crashed");
    }
}
