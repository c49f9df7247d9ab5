pub mod capture;
pub mod core;
pub mod detection;
pub mod models;
pub mod pipeline;
pub mod processor;

pub use capture::{CaptureSummary, FpsMeter, FrameSource, ImageDirectorySource, run_capture};
pub use crate::core::{
    DetectionError, DetectorConfig, History, LoadError, LoadNotice, ModelRegistry, Operation,
    OperationState,
};
pub use detection::{Detector, LabelStyle, build_operation_pipeline};
pub use models::{BoundingBox, DetectorKind, LastDetection};
pub use pipeline::{DebugConfig, Pipeline, PipelineContext, PipelineStep};
pub use processor::{FrameProcessor, ProcessedFrame};
