pub mod annotate;
pub mod cascade;
pub mod haar;
pub mod inference;
pub mod network;
pub mod preprocessing;
pub mod steps;

use std::sync::Arc;

use image::DynamicImage;

use crate::core::config::{DetectorConfig, DetectorParams};
use crate::core::error::{DetectionError, LoadError, LoadNotice};
use crate::core::history::OperationState;
use crate::models::{BoundingBox, DetectorKind, LastDetection};
use crate::pipeline::{Pipeline, PipelineContext};
use steps::*;

pub use annotate::LabelStyle;
pub use cascade::CascadeDetector;
pub use network::NetworkDetector;

/// The active detector: one of the two closed variants
#[derive(Debug)]
pub enum Detector {
    Cascade(CascadeDetector),
    Network(NetworkDetector),
}

impl Detector {
    /// Build the variant a config describes; nothing is loaded until `init`
    pub fn from_config(config: DetectorConfig, style: Arc<LabelStyle>) -> Self {
        match config.params {
            DetectorParams::Cascade(params) => {
                Detector::Cascade(CascadeDetector::new(config.name, params, style))
            }
            DetectorParams::Network(params) => {
                Detector::Network(NetworkDetector::new(config.name, params, style))
            }
        }
    }

    pub fn init(&mut self) -> Result<(), LoadError> {
        match self {
            Detector::Cascade(d) => d.init(),
            Detector::Network(d) => d.init(),
        }
    }

    /// Detect and draw onto `frame`.
    ///
    /// `aux` means "also find eyes and smiles" for cascades and "print the
    /// confidence" for networks.
    pub fn detect(&mut self, frame: &mut DynamicImage, aux: bool) -> Result<(), DetectionError> {
        match self {
            Detector::Cascade(d) => d.detect(frame, aux),
            Detector::Network(d) => d.detect(frame, aux),
        }
    }

    pub fn kind(&self) -> DetectorKind {
        match self {
            Detector::Cascade(_) => DetectorKind::Cascade,
            Detector::Network(_) => DetectorKind::Network,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Detector::Cascade(d) => d.name(),
            Detector::Network(d) => d.name(),
        }
    }

    pub fn can_detect_eyes(&self) -> bool {
        match self {
            Detector::Cascade(d) => d.can_detect_eyes(),
            Detector::Network(_) => false,
        }
    }

    pub fn can_detect_smiles(&self) -> bool {
        match self {
            Detector::Cascade(d) => d.can_detect_smiles(),
            Detector::Network(_) => false,
        }
    }

    /// Ignored by cascades and for values outside (0, 1)
    pub fn set_min_confidence(&mut self, value: f32) {
        if let Detector::Network(d) = self {
            d.set_min_confidence(value);
        }
    }

    pub fn min_confidence(&self) -> Option<f32> {
        match self {
            Detector::Cascade(_) => None,
            Detector::Network(d) => Some(d.min_confidence()),
        }
    }

    pub fn last_detection(&self) -> &LastDetection {
        match self {
            Detector::Cascade(d) => d.last_detection(),
            Detector::Network(d) => d.last_detection(),
        }
    }

    /// Empty when the last call found nothing
    pub fn last_rect(&self) -> BoundingBox {
        self.last_detection().rect
    }

    pub fn notices(&self) -> &[LoadNotice] {
        match self {
            Detector::Cascade(d) => d.notices(),
            Detector::Network(_) => &[],
        }
    }

    pub fn as_network(&self) -> Option<&NetworkDetector> {
        match self {
            Detector::Network(d) => Some(d),
            Detector::Cascade(_) => None,
        }
    }

    pub fn as_network_mut(&mut self) -> Option<&mut NetworkDetector> {
        match self {
            Detector::Network(d) => Some(d),
            Detector::Cascade(_) => None,
        }
    }
}

/// Build the image-operation pipeline for one operation state.
///
/// Order: grayscale group (equalize, binary, adaptive, back to color),
/// then zero threshold, edges, horizontal flip, vertical flip.
pub fn build_operation_pipeline(state: &OperationState, context: PipelineContext) -> Pipeline {
    let mut pipeline = Pipeline::new().with_context(context);

    if state.needs_grayscale() {
        pipeline = pipeline.add_step_boxed(Box::new(GrayscaleStep));
        if state.histogram_equalization {
            pipeline = pipeline.add_step_boxed(Box::new(HistogramEqualizationStep));
        }
        if state.binary_threshold > 0 {
            pipeline = pipeline.add_step_boxed(Box::new(BinaryThresholdStep {
                level: state.binary_threshold,
            }));
        }
        if state.adaptive_threshold > 0 {
            pipeline = pipeline.add_step_boxed(Box::new(AdaptiveThresholdStep {
                level: state.adaptive_threshold,
            }));
        }
        pipeline = pipeline.add_step_boxed(Box::new(ColorStep));
    }

    if state.zero_threshold > 0 {
        pipeline = pipeline.add_step_boxed(Box::new(ZeroThresholdStep {
            level: state.zero_threshold,
        }));
    }
    if state.detect_edges {
        pipeline = pipeline.add_step_boxed(Box::new(EdgeDetectionStep));
    }
    if state.flip_horizontal {
        pipeline = pipeline.add_step_boxed(Box::new(FlipStep {
            axis: FlipAxis::Horizontal,
        }));
    }
    if state.flip_vertical {
        pipeline = pipeline.add_step_boxed(Box::new(FlipStep {
            axis: FlipAxis::Vertical,
        }));
    }

    pipeline
}
