mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from facelens for tests
pub use facelens::core::{DetectorParams, NetworkParams};
pub use facelens::detection::inference::InferenceEngine;
pub use facelens::detection::{Detector, LabelStyle, NetworkDetector};
pub use facelens::{FrameProcessor, LoadError, ModelRegistry, Operation};
