//! Integration tests for the standard processor chain
//!
//! Runs source, metadata and proxy processors over generated images on disk.

mod helpers;

use std::sync::Arc;

use helpers::{write_gradient_jpeg, write_gradient_png, CountingStore, LogCapture};
use mediakit_ingest::config::IngestConfig;
use mediakit_ingest::document::{ImageSchema, ProxySchema, SourceSchema};
use mediakit_ingest::proxy::ProxySpec;
use mediakit_ingest::workflow::{standard_pipeline, DocumentOutcome, Pipeline};
use mediakit_ingest::{AssetDocument, ModelResources};
use tracing::Level;

fn pipeline(config: &IngestConfig, store: Arc<CountingStore>) -> Pipeline {
    standard_pipeline(config, store, None)
        .unwrap()
        .build(&ModelResources::new("/nonexistent/models"))
        .unwrap()
}

#[test]
fn test_landscape_photo_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("harbor.png");
    write_gradient_png(&path, 3000, 2000);

    let store = Arc::new(CountingStore::default());
    let config = IngestConfig {
        proxies: vec![
            ProxySpec::jpg(1024, 0.9),
            ProxySpec::jpg(256, 0.7),
            ProxySpec::jpg(128, 0.5),
        ],
        ..IngestConfig::default()
    };
    let pipeline = pipeline(&config, Arc::clone(&store));

    let mut doc = AssetDocument::new(&path);
    let report = pipeline.run(&mut doc);
    assert_eq!(report.outcome, DocumentOutcome::Completed);
    assert_eq!(report.warnings, 0);
    assert!(doc.image().is_none(), "raster released after the run");

    let source: SourceSchema = doc.get_schema().unwrap().unwrap();
    assert_eq!(source.mime_type.as_deref(), Some("image/png"));

    let image: ImageSchema = doc.get_schema().unwrap().unwrap();
    assert_eq!((image.width, image.height), (Some(3000), Some(2000)));

    let proxies: ProxySchema = doc.get_schema().unwrap().unwrap();
    let sizes: Vec<(u32, u32)> = proxies.items.iter().map(|p| (p.width, p.height)).collect();
    assert_eq!(sizes, vec![(128, 85), (256, 171), (1024, 683)]);
    assert!(proxies
        .items
        .windows(2)
        .all(|w| w[0].area() <= w[1].area()));
    assert_eq!(proxies.tiny_proxy.len(), 9);
    assert_eq!(store.puts(), 3);
    assert!(proxies.items.iter().all(|p| p.uri.starts_with("memory://")));
}

#[test]
fn test_small_image_gets_fallback_proxy() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("icon.jpg");
    write_gradient_jpeg(&path, 100, 60);

    let store = Arc::new(CountingStore::default());
    let pipeline = pipeline(&IngestConfig::default(), Arc::clone(&store));

    let mut doc = AssetDocument::new(&path);
    assert_eq!(pipeline.run(&mut doc).outcome, DocumentOutcome::Completed);

    let proxies: ProxySchema = doc.get_schema().unwrap().unwrap();
    assert_eq!(proxies.items.len(), 1);
    assert_eq!((proxies.items[0].width, proxies.items[0].height), (100, 60));
}

#[test]
fn test_sidecar_next_to_primary_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write_gradient_png(&dir.path().join("IMG_0001.png"), 64, 64);
    let sidecar = dir.path().join("IMG_0001.xmp");
    std::fs::write(&sidecar, "<x:xmpmeta/>").unwrap();

    let store = Arc::new(CountingStore::default());
    let pipeline = pipeline(&IngestConfig::default(), Arc::clone(&store));

    let mut doc = AssetDocument::new(&sidecar);
    let report = pipeline.run(&mut doc);
    assert!(matches!(report.outcome, DocumentOutcome::Skipped { .. }));
    assert_eq!(report.processors_run, vec!["source"]);
    assert_eq!(store.puts(), 0);
}

#[test]
fn test_non_image_runs_source_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "shopping list").unwrap();

    let pipeline = pipeline(&IngestConfig::default(), Arc::new(CountingStore::default()));
    let mut doc = AssetDocument::new(&path);
    let report = pipeline.run(&mut doc);

    assert_eq!(report.outcome, DocumentOutcome::Completed);
    assert_eq!(report.processors_run, vec!["source"]);
    assert!(!doc.attr_exists("proxies"));
}

#[test]
fn test_corrupt_image_fails_and_is_logged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.jpg");
    std::fs::write(&path, "definitely not a jpeg").unwrap();

    let pipeline = pipeline(&IngestConfig::default(), Arc::new(CountingStore::default()));
    let capture = LogCapture::new();
    let report = capture.capture(|| pipeline.run(&mut AssetDocument::new(&path)));

    // Dimension lookup is a soft failure; decoding for proxies is fatal
    assert_eq!(report.warnings, 1);
    assert!(matches!(
        report.outcome,
        DocumentOutcome::Failed { ref processor, .. } if processor == "proxy"
    ));

    let failures = capture.matching(Level::WARN, "Document failed");
    assert_eq!(failures.len(), 1);
    assert!(failures[0].fields["path"].ends_with("broken.jpg"));
    assert_eq!(failures[0].fields["processor"], "proxy");
}
