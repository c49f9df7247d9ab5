use std::sync::Arc;

use image::{DynamicImage, GrayImage};
use tracing::{debug, info, warn};

use crate::core::config::CascadeParams;
use crate::core::error::{DetectionError, LoadError, LoadNotice};
use crate::detection::annotate::{
    self, ACCENT_COLOR, BOX_THICKNESS, CIRCLE_THICKNESS, EYE_COLOR, LabelStyle, SMILE_COLOR,
};
use crate::detection::haar::{DetectParams, HaarCascade};
use crate::models::{BoundingBox, LastDetection};

pub const FACE_LABEL: &str = "Face";

/// Face detector with optional eye and smile sub-classifiers
#[derive(Debug)]
pub struct CascadeDetector {
    name: String,
    params: CascadeParams,
    face: Option<HaarCascade>,
    eyes: Option<HaarCascade>,
    smile: Option<HaarCascade>,
    notices: Vec<LoadNotice>,
    detect_params: DetectParams,
    style: Arc<LabelStyle>,
    last: LastDetection,
    faces: Vec<BoundingBox>,
}

impl CascadeDetector {
    pub fn new(name: impl Into<String>, params: CascadeParams, style: Arc<LabelStyle>) -> Self {
        Self {
            name: name.into(),
            params,
            face: None,
            eyes: None,
            smile: None,
            notices: Vec::new(),
            detect_params: DetectParams::default(),
            style,
            last: LastDetection::default(),
            faces: Vec::new(),
        }
    }

    pub fn with_detect_params(mut self, detect_params: DetectParams) -> Self {
        self.detect_params = detect_params;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Load the face cascade and whichever sub-classifiers are configured.
    ///
    /// Only the face cascade is mandatory. A configured eye or smile cascade
    /// that fails to load leaves a [`LoadNotice`] and the capability off.
    /// Calling again after a successful load does nothing.
    pub fn init(&mut self) -> Result<(), LoadError> {
        if self.face.is_some() {
            return Ok(());
        }
        if self.params.face_path.as_os_str().is_empty() {
            return Err(LoadError::FaceCascadePathEmpty);
        }

        let face = HaarCascade::load(&self.params.face_path)
            .map_err(|e| LoadError::invalid_cascade(&self.params.face_path, format!("{:#}", e)))?;

        self.notices.clear();
        if let Some(path) = &self.params.eyes_path {
            match HaarCascade::load(path) {
                Ok(cascade) => self.eyes = Some(cascade),
                Err(e) => {
                    warn!("Couldn't load eye classifier {:?}: {:#}", path, e);
                    self.notices.push(LoadNotice::EyeClassifierUnavailable {
                        reason: format!("{:#}", e),
                    });
                }
            }
        }
        if let Some(path) = &self.params.smile_path {
            match HaarCascade::load(path) {
                Ok(cascade) => self.smile = Some(cascade),
                Err(e) => {
                    warn!("Couldn't load smile classifier {:?}: {:#}", path, e);
                    self.notices.push(LoadNotice::SmileClassifierUnavailable {
                        reason: format!("{:#}", e),
                    });
                }
            }
        }

        self.face = Some(face);
        info!(
            "Cascade detector '{}' ready (eyes: {}, smiles: {})",
            self.name,
            self.eyes.is_some(),
            self.smile.is_some()
        );
        Ok(())
    }

    pub fn notices(&self) -> &[LoadNotice] {
        &self.notices
    }

    pub fn can_detect_eyes(&self) -> bool {
        self.eyes.is_some()
    }

    pub fn can_detect_smiles(&self) -> bool {
        self.smile.is_some()
    }

    pub fn last_detection(&self) -> &LastDetection {
        &self.last
    }

    /// Faces found in the last frame
    pub fn faces(&self) -> &[BoundingBox] {
        &self.faces
    }

    /// Find faces and draw them; with `show_features`, also eyes and smiles.
    pub fn detect(&mut self, frame: &mut DynamicImage, show_features: bool) -> Result<(), DetectionError> {
        self.last.clear();
        self.faces.clear();

        let face_cascade = self
            .face
            .as_ref()
            .ok_or_else(|| DetectionError::NotLoaded(self.name.clone()))?;

        let gray = frame.to_luma8();
        let (width, height) = gray.dimensions();
        let faces: Vec<BoundingBox> = face_cascade
            .detect(&gray, &self.detect_params)
            .into_iter()
            .filter_map(|face| face.clamp_to(width, height))
            .collect();
        debug!("{} face(s) in {}x{} frame", faces.len(), width, height);

        if faces.is_empty() {
            return Ok(());
        }

        let canvas = annotate::rgb_canvas(frame);
        for face in &faces {
            annotate::draw_box(canvas, *face, ACCENT_COLOR, BOX_THICKNESS);
            annotate::draw_label(canvas, FACE_LABEL, face.x, face.y, &self.style);
            self.last = LastDetection {
                rect: *face,
                label: FACE_LABEL.to_string(),
            };

            if !show_features {
                continue;
            }
            let roi = crop(&gray, face);

            if let Some(eyes) = &self.eyes {
                for eye in eyes.detect(&roi, &self.detect_params) {
                    let center = (face.x + eye.x + eye.width / 2, face.y + eye.y + eye.height / 2);
                    let radius = (0.25 * (eye.width + eye.height) as f32).round() as i32;
                    annotate::draw_circle(canvas, center, radius, EYE_COLOR, CIRCLE_THICKNESS);
                }
            }

            if let Some(smile) = &self.smile {
                // Smiles are searched in the lower half of the face only
                let lower = BoundingBox::new(0, face.height / 2, face.width, face.height - face.height / 2);
                let lower_roi = crop(&roi, &lower);
                for found in smile.detect(&lower_roi, &self.detect_params) {
                    let rect = BoundingBox::new(
                        face.x + found.x,
                        face.y + lower.y + found.y,
                        found.width,
                        found.height,
                    );
                    annotate::draw_box(canvas, rect, SMILE_COLOR, 1);
                }
            }
        }

        self.faces = faces;
        Ok(())
    }
}

/// Sub-image of `img`; `rect` must already lie inside it
fn crop(img: &GrayImage, rect: &BoundingBox) -> GrayImage {
    image::imageops::crop_imm(
        img,
        rect.x.max(0) as u32,
        rect.y.max(0) as u32,
        rect.width.max(0) as u32,
        rect.height.max(0) as u32,
    )
    .to_image()
}
