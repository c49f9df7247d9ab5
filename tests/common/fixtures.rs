use std::path::{Path, PathBuf};
use std::sync::Arc;

use facelens::core::NetworkParams;
use facelens::detection::inference::InferenceEngine;
use facelens::detection::{Detector, LabelStyle, NetworkDetector};
use image::{DynamicImage, ImageBuffer, Rgb};
use ndarray::{Array4, ArrayD, IxDyn};
use serde_json::{Value, json};
use tempfile::NamedTempFile;

/// Creates a 100x100 test image with a left-to-right gradient and returns the temp file.
/// The file will be automatically cleaned up when dropped.
pub fn create_test_image() -> NamedTempFile {
    let img = ImageBuffer::from_fn(100, 100, |x, y| Rgb([(x * 2) as u8, (y * 2) as u8, 90u8]));
    let file = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .expect("Failed to create temp image file");
    img.save_with_format(file.path(), image::ImageFormat::Png)
        .expect("Failed to save test image");
    file
}

/// A 64x48 color frame in memory
pub fn color_frame() -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_fn(64, 48, |x, y| {
        Rgb([(x * 4) as u8, (y * 5) as u8, 40u8])
    }))
}

/// Writes `entries` as the registry document and returns its path
pub fn write_registry(dir: &Path, entries: Value) -> PathBuf {
    let path = dir.join("detectors.json");
    std::fs::write(&path, serde_json::to_string_pretty(&entries).expect("Failed to encode registry"))
        .expect("Failed to write registry");
    path
}

/// Writes a small valid cascade (bright left half, dark right half)
pub fn write_cascade(dir: &Path, file_name: &str) -> PathBuf {
    write_edge_cascade(dir, file_name, 8, 8)
}

/// Cascade with one `width` x `height` window that fires where the left
/// half is brighter than the right half
pub fn write_edge_cascade(dir: &Path, file_name: &str, width: u32, height: u32) -> PathBuf {
    let half = width / 2;
    let cascade = json!({
        "window": [width, height],
        "stages": [{
            "threshold": 0.5,
            "features": [{
                "rects": [[0, 0, half, height, 1.0], [half, 0, width - half, height, -1.0]],
                "threshold": 0.5,
                "left": -1.0,
                "right": 1.0
            }]
        }]
    });
    let path = dir.join(file_name);
    std::fs::write(&path, cascade.to_string()).expect("Failed to write cascade");
    path
}

/// Square frame, bright on the left half and dark on the right
pub fn split_frame(size: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_fn(size, size, |x, _| {
        if x < size / 2 { Rgb([220u8, 220, 220]) } else { Rgb([20u8, 20, 20]) }
    }))
}

/// Writes a file that is not a valid model or cascade
pub fn write_garbage(dir: &Path, file_name: &str) -> PathBuf {
    let path = dir.join(file_name);
    std::fs::write(&path, b"\x00\x01 definitely not a model").expect("Failed to write file");
    path
}

/// Engine returning the same output for every frame
pub struct FixedOutputEngine {
    pub output: ArrayD<f32>,
}

impl InferenceEngine for FixedOutputEngine {
    fn forward(&mut self, _blob: &Array4<f32>) -> anyhow::Result<ArrayD<f32>> {
        Ok(self.output.clone())
    }
}

/// Detection rows shaped `[1, 1, N, 7]`
pub fn detection_output(rows: &[[f32; 7]]) -> ArrayD<f32> {
    let values: Vec<f32> = rows.iter().flatten().copied().collect();
    ArrayD::from_shape_vec(IxDyn(&[1, 1, rows.len(), 7]), values).expect("Failed to shape rows")
}

/// Network detector over a fixed engine with the given classes
pub fn make_network_detector(classes: &[&str], output: ArrayD<f32>) -> NetworkDetector {
    NetworkDetector::with_engine(
        "Fake Network",
        NetworkParams::default(),
        classes.iter().map(|c| c.to_string()).collect(),
        Box::new(FixedOutputEngine { output }),
        Arc::new(LabelStyle::default()),
    )
}

pub fn make_network(classes: &[&str], output: ArrayD<f32>) -> Detector {
    Detector::Network(make_network_detector(classes, output))
}
