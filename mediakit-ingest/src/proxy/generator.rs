//! Proxy cascade generation
//!
//! The largest proxy is resized from the full-resolution source and
//! orientation-corrected; every smaller proxy is resized from that largest
//! proxy, so the source is only resampled once.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageOutputFormat};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Cursor;
use std::sync::Arc;
use tracing::{debug, info};

use super::orientation::Orientation;
use super::tiny::tiny_proxy;
use crate::document::{AssetDocument, Proxy, ProxySchema};
use crate::error::ProcessorError;
use crate::storage::ObjectStore;
use crate::types::{MediaKind, Processor};

/// Proxy encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyFormat {
    Jpg,
    Png,
}

impl ProxyFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ProxyFormat::Jpg => "jpg",
            ProxyFormat::Png => "png",
        }
    }
}

/// One configured rendition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProxySpec {
    /// Target width in displayed (orientation-corrected) pixels
    pub width: u32,
    pub format: ProxyFormat,
    /// Encoder quality in (0, 1]; ignored for PNG
    pub quality: f64,
}

impl ProxySpec {
    pub fn jpg(width: u32, quality: f64) -> Self {
        Self {
            width,
            format: ProxyFormat::Jpg,
            quality,
        }
    }

    /// 1024@0.9, 256@0.7, 128@0.5, all JPEG
    pub fn defaults() -> Vec<ProxySpec> {
        vec![
            ProxySpec::jpg(1024, 0.9),
            ProxySpec::jpg(256, 0.7),
            ProxySpec::jpg(128, 0.5),
        ]
    }

    /// JPEG quality on the encoder's 1..=100 scale
    fn jpeg_quality(&self) -> u8 {
        (self.quality * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

/// What a generated proxy was resized from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedFrom {
    Original,
    Largest,
}

/// A rendition held in memory before encoding
#[derive(Debug, Clone)]
pub struct GeneratedProxy {
    pub spec: ProxySpec,
    pub width: u32,
    pub height: u32,
    pub derived_from: DerivedFrom,
    pub image: DynamicImage,
}

impl GeneratedProxy {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Height preserving the displayed aspect ratio, at least one pixel
fn proxy_height(target_width: u32, displayed_width: u32, displayed_height: u32) -> u32 {
    let aspect = displayed_width as f64 / displayed_height.max(1) as f64;
    ((target_width as f64 / aspect).round() as u32).max(1)
}

/// Generate the rendition cascade for `source`
///
/// Returns proxies in generation order (largest first). Specs wider than the
/// displayed source are skipped; when every spec is skipped a single proxy is
/// made at the source's native width with maximum quality.
pub fn generate_cascade(
    source: &DynamicImage,
    orientation: Orientation,
    specs: &[ProxySpec],
) -> Vec<GeneratedProxy> {
    let (raw_width, raw_height) = source.dimensions();
    let (displayed_width, displayed_height) = orientation.displayed(raw_width, raw_height);

    let mut ordered: Vec<ProxySpec> = specs
        .iter()
        .copied()
        .filter(|spec| spec.width > 0 && spec.width <= displayed_width)
        .collect();
    ordered.sort_by(|a, b| b.width.cmp(&a.width));

    if ordered.is_empty() {
        let format = specs.first().map(|s| s.format).unwrap_or(ProxyFormat::Jpg);
        ordered.push(ProxySpec {
            width: displayed_width,
            format,
            quality: 1.0,
        });
    }

    let mut generated: Vec<GeneratedProxy> = Vec::with_capacity(ordered.len());
    for spec in ordered {
        let width = spec.width;
        let height = proxy_height(width, displayed_width, displayed_height);

        let (image, derived_from) = match generated.first() {
            None => {
                let (resize_w, resize_h) = orientation.displayed(width, height);
                let resized = source.resize_exact(resize_w, resize_h, FilterType::Lanczos3);
                (orientation.apply(resized), DerivedFrom::Original)
            }
            Some(largest) => (
                largest
                    .image
                    .resize_exact(width, height, FilterType::Lanczos3),
                DerivedFrom::Largest,
            ),
        };

        generated.push(GeneratedProxy {
            spec,
            width,
            height,
            derived_from,
            image: DynamicImage::ImageRgb8(image.to_rgb8()),
        });
    }
    generated
}

/// Encode a generated proxy to bytes
pub fn encode_proxy(proxy: &GeneratedProxy) -> Result<Vec<u8>, image::ImageError> {
    let mut cursor = Cursor::new(Vec::new());
    let format = match proxy.spec.format {
        ProxyFormat::Jpg => ImageOutputFormat::Jpeg(proxy.spec.jpeg_quality()),
        ProxyFormat::Png => ImageOutputFormat::Png,
    };
    proxy.image.write_to(&mut cursor, format)?;
    Ok(cursor.into_inner())
}

/// Content-derived object-store prefix for a document's proxies
pub fn proxy_prefix(document: &AssetDocument) -> String {
    format!("{:x}", Sha256::digest(document.id().as_bytes()))
}

/// Builds the `proxies` namespace for image documents
pub struct ProxyProcessor {
    specs: Vec<ProxySpec>,
    store: Arc<dyn ObjectStore>,
}

impl ProxyProcessor {
    pub fn new(specs: Vec<ProxySpec>, store: Arc<dyn ObjectStore>) -> Self {
        Self { specs, store }
    }

    pub fn specs(&self) -> &[ProxySpec] {
        &self.specs
    }
}

impl Processor for ProxyProcessor {
    fn name(&self) -> &str {
        "proxy"
    }

    fn supported_kinds(&self) -> &[MediaKind] {
        &[MediaKind::Image]
    }

    fn process(&self, document: &mut AssetDocument) -> Result<(), ProcessorError> {
        if document.attr_exists("proxies") && !document.is_changed() {
            debug!(path = %document.path().display(), "Proxies already exist");
            return Ok(());
        }

        let orientation = document
            .get_i64("image.Exif.Orientation")
            .map(Orientation::from_exif)
            .unwrap_or_default();

        let display_path = document.path().display().to_string();
        let generated = {
            let source = document.load_image().map_err(|e| {
                ProcessorError::unrecoverable(format!("Failed to decode {}: {}", display_path, e))
            })?;
            generate_cascade(source, orientation, &self.specs)
        };

        let prefix = proxy_prefix(document);
        let mut items = Vec::with_capacity(generated.len());
        for proxy in &generated {
            let bytes = encode_proxy(proxy).map_err(|e| {
                ProcessorError::unrecoverable(format!(
                    "Failed to encode {}x{} proxy: {}",
                    proxy.width, proxy.height, e
                ))
            })?;
            let name = format!(
                "{}/{}x{}.{}",
                prefix,
                proxy.width,
                proxy.height,
                proxy.spec.format.extension()
            );
            let uri = self.store.put(&name, &bytes).map_err(|e| {
                ProcessorError::unrecoverable(format!("Failed to store proxy {}: {}", name, e))
            })?;

            items.push(Proxy {
                width: proxy.width,
                height: proxy.height,
                format: proxy.spec.format.extension().to_string(),
                quality: proxy.spec.quality,
                name,
                uri,
            });
        }
        items.sort_by_key(Proxy::area);

        let tiny = generated
            .iter()
            .min_by_key(|p| p.area())
            .map(|p| tiny_proxy(&p.image))
            .unwrap_or_default();

        info!(
            path = %display_path,
            proxies = items.len(),
            orientation = orientation.degrees,
            "Generated proxies"
        );

        document.set_schema(ProxySchema {
            items,
            tiny_proxy: tiny,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::orientation::Orientation;
    use crate::storage::MemoryObjectStore;

    fn source(width: u32, height: u32) -> DynamicImage {
        DynamicImage::new_rgb8(width, height)
    }

    #[test]
    fn test_default_cascade_from_3000x2000() {
        let out = generate_cascade(
            &source(3000, 2000),
            Orientation::IDENTITY,
            &ProxySpec::defaults(),
        );

        let sizes: Vec<(u32, u32)> = out.iter().map(|p| (p.width, p.height)).collect();
        assert_eq!(sizes, vec![(1024, 683), (256, 171), (128, 85)]);
        assert_eq!(out[0].derived_from, DerivedFrom::Original);
        assert_eq!(out[1].derived_from, DerivedFrom::Largest);
        assert_eq!(out[2].derived_from, DerivedFrom::Largest);
        assert_eq!(out[2].image.dimensions(), (128, 85));
    }

    #[test]
    fn test_unsorted_specs_are_generated_descending() {
        let specs = vec![
            ProxySpec::jpg(128, 0.5),
            ProxySpec::jpg(1024, 0.9),
            ProxySpec::jpg(256, 0.7),
        ];
        let out = generate_cascade(&source(2000, 1000), Orientation::IDENTITY, &specs);
        let widths: Vec<u32> = out.iter().map(|p| p.width).collect();
        assert_eq!(widths, vec![1024, 256, 128]);
    }

    #[test]
    fn test_specs_wider_than_source_skipped() {
        let out = generate_cascade(&source(300, 200), Orientation::IDENTITY, &ProxySpec::defaults());
        let widths: Vec<u32> = out.iter().map(|p| p.width).collect();
        assert_eq!(widths, vec![256, 128]);
        assert_eq!(out[0].derived_from, DerivedFrom::Original);
    }

    #[test]
    fn test_tiny_source_gets_native_fallback() {
        let out = generate_cascade(&source(100, 50), Orientation::IDENTITY, &ProxySpec::defaults());
        assert_eq!(out.len(), 1);
        assert_eq!((out[0].width, out[0].height), (100, 50));
        assert_eq!(out[0].spec.quality, 1.0);
    }

    #[test]
    fn test_empty_specs_still_produce_one_proxy() {
        let out = generate_cascade(&source(64, 64), Orientation::IDENTITY, &[]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].width, 64);
    }

    #[test]
    fn test_rotated_source_uses_displayed_dimensions() {
        // 4000x3000 buffer displayed as 3000x4000
        let out = generate_cascade(
            &source(400, 300),
            Orientation::from_exif(6),
            &[ProxySpec::jpg(150, 0.9), ProxySpec::jpg(30, 0.5)],
        );
        assert_eq!((out[0].width, out[0].height), (150, 200));
        assert_eq!(out[0].image.dimensions(), (150, 200));
        assert_eq!(out[1].image.dimensions(), (30, 40));
    }

    #[test]
    fn test_jpeg_quality_scale() {
        assert_eq!(ProxySpec::jpg(1, 0.9).jpeg_quality(), 90);
        assert_eq!(ProxySpec::jpg(1, 0.0).jpeg_quality(), 1);
        assert_eq!(ProxySpec::jpg(1, 2.0).jpeg_quality(), 100);
    }

    #[test]
    fn test_encode_png_and_jpeg() {
        let out = generate_cascade(
            &source(64, 32),
            Orientation::IDENTITY,
            &[ProxySpec {
                width: 32,
                format: ProxyFormat::Png,
                quality: 1.0,
            }],
        );
        let png = encode_proxy(&out[0]).unwrap();
        assert_eq!(&png[..4], b"\x89PNG");

        let out = generate_cascade(&source(64, 32), Orientation::IDENTITY, &[ProxySpec::jpg(32, 0.8)]);
        let jpg = encode_proxy(&out[0]).unwrap();
        assert_eq!(&jpg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_processor_stores_ascending_with_tiny_proxy() {
        let store = Arc::new(MemoryObjectStore::new());
        let processor = ProxyProcessor::new(ProxySpec::defaults(), store.clone());

        let mut doc = AssetDocument::new("/virtual/wide.jpg");
        doc.set_image(source(3000, 2000));
        processor.process(&mut doc).unwrap();

        let schema: ProxySchema = doc.get_schema().unwrap().unwrap();
        let widths: Vec<u32> = schema.items.iter().map(|p| p.width).collect();
        assert_eq!(widths, vec![128, 256, 1024]);
        assert_eq!(schema.tiny_proxy.len(), 9);
        assert_eq!(store.len(), 3);

        let prefix = proxy_prefix(&doc);
        assert_eq!(schema.items[0].name, format!("{}/128x85.jpg", prefix));
        assert_eq!(schema.items[0].uri, format!("memory://{}/128x85.jpg", prefix));
    }

    #[test]
    fn test_processor_skips_unchanged_document_with_proxies() {
        let store = Arc::new(MemoryObjectStore::new());
        let processor = ProxyProcessor::new(ProxySpec::defaults(), store.clone());

        let mut doc = AssetDocument::new("/virtual/a.jpg");
        doc.set_attr("proxies.items", Vec::<i64>::new()).unwrap();
        doc.set_changed(false);
        processor.process(&mut doc).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_processor_decode_failure_is_unrecoverable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not an image").unwrap();

        let processor = ProxyProcessor::new(ProxySpec::defaults(), Arc::new(MemoryObjectStore::new()));
        let mut doc = AssetDocument::new(&path);
        assert!(matches!(
            processor.process(&mut doc),
            Err(ProcessorError::Unrecoverable(_))
        ));
    }
}
