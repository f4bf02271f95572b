//! Cascade enricher wired into the standard chain with a scripted classifier

mod helpers;

use std::sync::Arc;

use helpers::{write_gradient_png, CountingStore};
use image::DynamicImage;
use mediakit_ingest::config::IngestConfig;
use mediakit_ingest::detection::{
    ClassifierBackend, DetectionParams, Detector, DetectorError, EnricherConfig, Region,
};
use mediakit_ingest::resources::ResourceBlob;
use mediakit_ingest::workflow::{standard_pipeline, DocumentOutcome};
use mediakit_ingest::{AssetDocument, InitError, ModelResources};

/// Finds one region covering the top-left quarter up to 40 neighbors
struct QuarterDetector;

impl Detector for QuarterDetector {
    fn detect(
        &self,
        image: &DynamicImage,
        params: &DetectionParams,
    ) -> Result<Vec<Region>, DetectorError> {
        if params.min_neighbors > 40 {
            return Ok(Vec::new());
        }
        Ok(vec![Region::new(0, 0, image.width() / 2, image.height() / 2)])
    }
}

struct QuarterBackend;

impl ClassifierBackend for QuarterBackend {
    fn load(&self, definition: &ResourceBlob) -> Result<Box<dyn Detector>, InitError> {
        assert!(definition.name.ends_with(".xml"));
        Ok(Box::new(QuarterDetector))
    }
}

#[test]
fn test_enricher_labels_document() {
    let models = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(models.path().join("logo")).unwrap();
    std::fs::write(models.path().join("logo/visaLogo.xml"), "<opencv_storage/>").unwrap();

    let media = tempfile::tempdir().unwrap();
    let path = media.path().join("card.png");
    write_gradient_png(&path, 400, 200);

    let config = IngestConfig {
        enrichers: vec![EnricherConfig::default()],
        ..IngestConfig::default()
    };
    let pipeline = standard_pipeline(
        &config,
        Arc::new(CountingStore::default()),
        Some(Arc::new(QuarterBackend)),
    )
    .unwrap()
    .build(&ModelResources::new(models.path()))
    .unwrap();

    let mut doc = AssetDocument::new(&path);
    let report = pipeline.run(&mut doc);
    assert_eq!(report.outcome, DocumentOutcome::Completed);
    assert_eq!(report.processors_run.last().map(String::as_str), Some("Logos"));

    // Passes at 20, 30 and 40 neighbors; region is half the frame height
    let confidence = doc.get_f64("Logos.confidence").unwrap();
    assert!((confidence - 0.8).abs() < 1e-9);
    assert_eq!(doc.get_i64("Logos.count"), Some(1));
    assert!(doc.keywords().get("keywords", "visa").is_some());
    assert!(doc.keywords().get("keywords", "bigvisa").is_some());

    let json = doc.to_json();
    assert_eq!(json["attributes"]["SVG"]["Logos"][0], "0,0 200,0 200,100 0,100");
}
