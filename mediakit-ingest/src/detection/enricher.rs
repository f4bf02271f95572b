//! Cascade-classifier enrichment processor
//!
//! Loads a cascade definition at init, runs the confidence cascade over the
//! decoded raster (shared with the proxy processor through the document) and
//! folds the labels into the document.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::cascade::{default_levels, CascadeError, CascadeEstimator, CascadeLevel, DEFAULT_LARGE_RATIO};
use super::{ClassifierBackend, DetectionParams, Detector, Region};
use crate::document::{AssetDocument, AttrValue};
use crate::error::{InitError, ProcessorError};
use crate::resources::ModelResources;
use crate::types::{MediaKind, Processor};

fn default_namespace() -> String {
    "Logos".to_string()
}

fn default_label() -> String {
    "visa".to_string()
}

fn default_large_label() -> String {
    "bigvisa".to_string()
}

fn default_cascade() -> String {
    "logo/visaLogo.xml".to_string()
}

fn default_large_ratio() -> f64 {
    DEFAULT_LARGE_RATIO
}

fn default_min_size() -> Option<(u32, u32)> {
    Some((100, 50))
}

fn default_max_size() -> Option<(u32, u32)> {
    Some((4000, 2000))
}

/// One configured cascade enricher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnricherConfig {
    /// Attribute namespace, also the processor name
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_label")]
    pub label: String,
    /// Extra label when a region is large relative to the frame
    #[serde(default = "default_large_label")]
    pub large_label: String,
    /// Cascade definition, relative to the model-resource root
    #[serde(default = "default_cascade")]
    pub cascade: String,
    #[serde(default = "default_levels")]
    pub levels: Vec<CascadeLevel>,
    #[serde(default = "default_large_ratio")]
    pub large_ratio: f64,
    #[serde(default = "default_min_size")]
    pub min_size: Option<(u32, u32)>,
    #[serde(default = "default_max_size")]
    pub max_size: Option<(u32, u32)>,
}

impl Default for EnricherConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            label: default_label(),
            large_label: default_large_label(),
            cascade: default_cascade(),
            levels: default_levels(),
            large_ratio: default_large_ratio(),
            min_size: default_min_size(),
            max_size: default_max_size(),
        }
    }
}

/// Runs a cascade detector and records labeled regions
pub struct CascadeEnricher {
    config: EnricherConfig,
    estimator: CascadeEstimator,
    backend: Arc<dyn ClassifierBackend>,
    detector: Option<Box<dyn Detector>>,
}

impl CascadeEnricher {
    pub fn new(
        config: EnricherConfig,
        backend: Arc<dyn ClassifierBackend>,
    ) -> Result<Self, CascadeError> {
        let estimator = CascadeEstimator::new(config.levels.clone(), config.large_ratio)?;
        Ok(Self {
            config,
            estimator,
            backend,
            detector: None,
        })
    }

    pub fn config(&self) -> &EnricherConfig {
        &self.config
    }

    fn params(&self, level: &CascadeLevel) -> DetectionParams {
        DetectionParams {
            scale_factor: level.scale_factor,
            min_neighbors: level.min_neighbors,
            min_size: self.config.min_size,
            max_size: self.config.max_size,
        }
    }
}

/// Closed polygon through the clamped corners of `region`
fn region_polygon(region: &Region, width: u32, height: u32) -> String {
    let (x0, y0, x1, y1) = region.clamped(width, height);
    format!("{x0},{y0} {x1},{y0} {x1},{y1} {x0},{y1}")
}

impl Processor for CascadeEnricher {
    fn name(&self) -> &str {
        &self.config.namespace
    }

    fn supported_kinds(&self) -> &[MediaKind] {
        &[MediaKind::Image]
    }

    fn init(&mut self, resources: &ModelResources) -> Result<(), InitError> {
        let blob = resources.read(&self.config.cascade)?;
        self.detector = Some(self.backend.load(&blob)?);
        info!(
            processor = %self.config.namespace,
            cascade = %self.config.cascade,
            levels = self.estimator.levels().len(),
            "Loaded cascade classifier"
        );
        Ok(())
    }

    fn process(&self, document: &mut AssetDocument) -> Result<(), ProcessorError> {
        let ns = self.config.namespace.as_str();
        if document.attr_exists(ns) && !document.is_changed() {
            debug!(id = %document.id(), processor = ns, "Already enriched, unchanged");
            return Ok(());
        }

        let Some(detector) = self.detector.as_deref() else {
            return Err(ProcessorError::unrecoverable(format!(
                "{ns} used before init"
            )));
        };
        let image = document
            .load_image()
            .map_err(|e| ProcessorError::soft(format!("{ns}: no decoded raster available: {e}")))?;
        let (width, height) = (image.width(), image.height());

        let result = self
            .estimator
            .estimate(height, |level| detector.detect(image, &self.params(level)))
            .map_err(|e| ProcessorError::soft(format!("{ns}: {e}")))?;

        let mut labels = Vec::new();
        if !result.is_empty() {
            labels.push(self.config.label.clone());
            if result.large {
                labels.push(self.config.large_label.clone());
            }
        }
        let polygons: Vec<AttrValue> = result
            .regions
            .iter()
            .map(|r| AttrValue::from(region_polygon(r, width, height)))
            .collect();

        debug!(
            id = %document.id(),
            processor = ns,
            regions = result.regions.len(),
            confidence = result.confidence,
            "Cascade result"
        );

        document.set_attr(&format!("{ns}.count"), result.regions.len() as u64)?;
        document.set_attr(&format!("{ns}.confidence"), result.confidence)?;
        document.set_attr(&format!("{ns}.keywords"), labels.clone())?;
        if !polygons.is_empty() {
            document.set_attr(&format!("SVG.{ns}"), AttrValue::List(polygons))?;
        }
        if !labels.is_empty() {
            document.add_keywords(result.confidence, true, &labels);
        }
        Ok(())
    }
}
