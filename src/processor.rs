use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use image::{DynamicImage, ImageReader};
use tracing::{debug, info, warn};

use crate::core::error::{DetectionError, LoadError, LoadNotice};
use crate::core::history::{History, Operation, OperationState};
use crate::core::registry::ModelRegistry;
use crate::detection::{Detector, build_operation_pipeline};
use crate::models::DetectorKind;
use crate::pipeline::PipelineContext;

/// Slider range for the minimum confidence, in percent
pub const MIN_CONFIDENCE_PERCENT: std::ops::RangeInclusive<u8> = 5..=95;

/// One frame after operations and detection
#[derive(Debug)]
pub struct ProcessedFrame {
    pub image: DynamicImage,
    /// Status line for this frame, if anything was detected
    pub status: Option<String>,
    /// Set when detection failed and the detector was switched off
    pub detection_failure: Option<DetectionError>,
}

/// Owns the history, the active detector and the uploaded source image.
///
/// At most one detector is active. Selecting another one builds it first
/// and drops the old one afterwards; a failed selection leaves none active.
#[derive(Debug, Default)]
pub struct FrameProcessor {
    registry: Option<ModelRegistry>,
    names: Vec<String>,
    history: History,
    detector: Option<Detector>,
    min_confidence: Option<f32>,
    upload: Option<PathBuf>,
    context: PipelineContext,
    frame_index: usize,
}

impl FrameProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save every pipeline step's output (see [`PipelineContext::with_debug`])
    pub fn with_pipeline_context(mut self, context: PipelineContext) -> Self {
        self.context = context;
        self
    }

    /// Attach a registry and return the detector names to present
    pub fn initialize(&mut self, registry: ModelRegistry) -> Result<Vec<String>, LoadError> {
        self.names = registry.list_names()?;
        info!("{} detector(s) listed in {:?}", self.names.len(), registry.source());
        self.registry = Some(registry);
        Ok(self.names.clone())
    }

    /// Names still selectable; failed detectors are removed
    pub fn detector_names(&self) -> &[String] {
        &self.names
    }

    /// Make `name` the active detector.
    ///
    /// On failure detection is switched off. `name` leaves the list unless
    /// the registry document itself could not be read.
    /// On success, returns the notices of a partial load.
    pub fn select_detector(&mut self, name: &str) -> Result<Vec<LoadNotice>, LoadError> {
        let registry = self
            .registry
            .as_ref()
            .ok_or_else(|| LoadError::NameNotFound(name.to_string()))?;

        match registry.instantiate_by_name(name) {
            Ok(mut detector) => {
                if let Some(value) = self.min_confidence {
                    detector.set_min_confidence(value);
                }
                let notices = detector.notices().to_vec();
                for notice in &notices {
                    info!("{}", notice);
                }
                info!("Active detector: {} ({})", detector.name(), detector.kind());
                self.detector = Some(detector);
                Ok(notices)
            }
            Err(e) => {
                warn!("Couldn't load detector '{}': {}", name, e);
                self.detector = None;
                if e.is_entry_error() {
                    self.names.retain(|n| n != name);
                }
                Err(e)
            }
        }
    }

    /// Make an already loaded detector the active one
    pub fn activate(&mut self, mut detector: Detector) {
        if let Some(value) = self.min_confidence {
            detector.set_min_confidence(value);
        }
        info!("Active detector: {} ({})", detector.name(), detector.kind());
        self.detector = Some(detector);
    }

    /// Switch detection off
    pub fn deselect(&mut self) {
        if let Some(detector) = self.detector.take() {
            debug!("Released detector '{}'", detector.name());
        }
    }

    /// The capture device stopped; its detector goes with it
    pub fn camera_off(&mut self) {
        self.deselect();
    }

    pub fn active_detector(&self) -> Option<&Detector> {
        self.detector.as_ref()
    }

    pub fn active_detector_mut(&mut self) -> Option<&mut Detector> {
        self.detector.as_mut()
    }

    /// Slider value in percent; values outside 5..=95 are ignored
    pub fn set_min_confidence_percent(&mut self, percent: u8) -> bool {
        if !MIN_CONFIDENCE_PERCENT.contains(&percent) {
            return false;
        }
        let value = f32::from(percent) / 100.0;
        self.min_confidence = Some(value);
        if let Some(detector) = self.detector.as_mut() {
            detector.set_min_confidence(value);
        }
        true
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn operations(&self) -> &OperationState {
        self.history.current()
    }

    /// Record one operation; returns the status line describing it
    pub fn apply(&mut self, op: Operation) -> Option<String> {
        self.history.add(op);
        if self.history.current().has_threshold_conflict() {
            debug!("More than one threshold mode is active");
        }
        self.history.last_changed_field_description()
    }

    pub fn undo(&mut self) -> Option<String> {
        if self.history.undo() {
            self.history.last_changed_field_description()
        } else {
            None
        }
    }

    pub fn redo(&mut self) -> Option<String> {
        if self.history.redo() {
            self.history.last_changed_field_description()
        } else {
            None
        }
    }

    pub fn reset_operations(&mut self) {
        self.history.reset();
    }

    /// Use an image file as the source; it is re-read on every reprocess
    pub fn upload_image(&mut self, path: impl Into<PathBuf>) -> Result<String> {
        let path = path.into();
        read_image(&path)?;
        let status = format!("Uploaded file: {}", path.display());
        self.upload = Some(path);
        Ok(status)
    }

    pub fn uploaded_image(&self) -> Option<&Path> {
        self.upload.as_deref()
    }

    /// Drop the uploaded image and its detector
    pub fn close_image(&mut self) {
        self.upload = None;
        self.deselect();
    }

    /// Process the pristine uploaded image again
    pub fn reprocess(&mut self) -> Result<ProcessedFrame> {
        let path = self
            .upload
            .clone()
            .ok_or_else(|| anyhow!("No image has been uploaded"))?;
        let frame = read_image(&path)?;
        self.process_frame(frame)
    }

    /// Apply the current operations to `frame`, then run the active detector.
    ///
    /// A detection failure is reported on the frame and switches detection
    /// off; the operations have already been applied by then.
    pub fn process_frame(&mut self, frame: DynamicImage) -> Result<ProcessedFrame> {
        let state = *self.history.current();
        let pipeline = build_operation_pipeline(&state, self.context.clone());
        let mut image = pipeline.run(frame, self.frame_index)?;
        self.frame_index += 1;

        let Some(detector) = self.detector.as_mut() else {
            return Ok(ProcessedFrame {
                image,
                status: None,
                detection_failure: None,
            });
        };

        let aux = match detector.kind() {
            DetectorKind::Cascade => state.show_features,
            DetectorKind::Network => state.show_confidence,
        };
        match detector.detect(&mut image, aux) {
            Ok(()) => {
                let status = detector.last_detection().status_message();
                Ok(ProcessedFrame {
                    image,
                    status,
                    detection_failure: None,
                })
            }
            Err(e) => {
                warn!("Detection with '{}' failed, switching it off: {}", detector.name(), e);
                self.detector = None;
                Ok(ProcessedFrame {
                    image,
                    status: Some(format!("Detection failed: {}", e)),
                    detection_failure: Some(e),
                })
            }
        }
    }
}

/// Save a processed frame; returns the status line
pub fn save_frame(frame: &DynamicImage, path: &Path) -> Result<String> {
    frame
        .save(path)
        .with_context(|| format!("Failed to save {}", path.display()))?;
    Ok(format!("Saved file: {}", path.display()))
}

fn read_image(path: &Path) -> Result<DynamicImage> {
    ImageReader::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .decode()
        .map_err(|e| anyhow!("Failed to decode image {}: {}", path.display(), e))
}
