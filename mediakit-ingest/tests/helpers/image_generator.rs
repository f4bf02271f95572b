//! Test image fixtures
//!
//! Images are generated in-process so the tests carry no binary fixtures.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{ImageOutputFormat, Rgb, RgbImage};
use mediakit_ingest::storage::{MemoryObjectStore, ObjectStore, StorageError};

/// Horizontal red / vertical green gradient
fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    })
}

pub fn write_gradient_png(path: &Path, width: u32, height: u32) {
    gradient(width, height).save(path).unwrap();
}

pub fn write_gradient_jpeg(path: &Path, width: u32, height: u32) {
    let mut file = std::fs::File::create(path).unwrap();
    image::DynamicImage::ImageRgb8(gradient(width, height))
        .write_to(&mut file, ImageOutputFormat::Jpeg(90))
        .unwrap();
}

/// In-memory store that counts writes
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryObjectStore,
    puts: AtomicUsize,
}

impl CountingStore {
    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn names(&self) -> Vec<String> {
        self.inner.names()
    }
}

impl ObjectStore for CountingStore {
    fn put(&self, name: &str, bytes: &[u8]) -> Result<String, StorageError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(name, bytes)
    }

    fn get(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        self.inner.get(name)
    }
}
