use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use image::DynamicImage;
use ndarray::ArrayD;
use tracing::{debug, info, trace, warn};

use crate::core::config::NetworkParams;
use crate::core::error::{DetectionError, LoadError};
use crate::detection::annotate::{self, ACCENT_COLOR, BOX_THICKNESS, LabelStyle};
use crate::detection::inference::{INPUT_SIZE, InferenceEngine, RtenEngine, blob_from_image};
use crate::models::{BoundingBox, LastDetection};

/// Confidence a detection must exceed until the user picks another value
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.7;

/// Values per detection row: batch, class, confidence, x1, y1, x2, y2
const ROW_LEN: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassEntry {
    pub name: String,
    pub enabled: bool,
}

/// Object detector backed by a neural network
pub struct NetworkDetector {
    name: String,
    params: NetworkParams,
    engine: Option<Box<dyn InferenceEngine>>,
    classes: Vec<ClassEntry>,
    sorted_class_names: Vec<String>,
    min_confidence: f32,
    style: Arc<LabelStyle>,
    last: LastDetection,
}

impl std::fmt::Debug for NetworkDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkDetector")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("loaded", &self.engine.is_some())
            .field("classes", &self.classes.len())
            .field("min_confidence", &self.min_confidence)
            .finish()
    }
}

impl NetworkDetector {
    pub fn new(name: impl Into<String>, params: NetworkParams, style: Arc<LabelStyle>) -> Self {
        Self {
            name: name.into(),
            params,
            engine: None,
            classes: Vec::new(),
            sorted_class_names: Vec::new(),
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            style,
            last: LastDetection::default(),
        }
    }

    /// Detector around an engine that is already loaded
    pub fn with_engine(
        name: impl Into<String>,
        params: NetworkParams,
        class_names: Vec<String>,
        engine: Box<dyn InferenceEngine>,
        style: Arc<LabelStyle>,
    ) -> Self {
        let mut detector = Self::new(name, params, style);
        detector.set_class_names(class_names);
        detector.engine = Some(engine);
        detector
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read class names and load the network.
    ///
    /// The model path is checked before the graph path. An unreadable
    /// class-names file is not fatal: every row then lacks a label and is skipped.
    pub fn init(&mut self) -> Result<(), LoadError> {
        if self.engine.is_some() {
            return Ok(());
        }
        if self.params.model_path.as_os_str().is_empty() {
            return Err(LoadError::ModelPathEmpty);
        }
        if self.params.inf_graph_path.as_os_str().is_empty() {
            return Err(LoadError::InfGraphPathEmpty);
        }

        match read_class_names(&self.params.class_names_path) {
            Ok(names) => self.set_class_names(names),
            Err(e) => {
                warn!("Couldn't read class names {:?}: {}", self.params.class_names_path, e);
                self.set_class_names(Vec::new());
            }
        }

        let engine = RtenEngine::load(&self.params)?;
        self.engine = Some(Box::new(engine));
        info!("Network detector '{}' ready with {} classes", self.name, self.classes.len());
        Ok(())
    }

    fn set_class_names(&mut self, names: Vec<String>) {
        self.sorted_class_names = names.clone();
        self.classes = names
            .into_iter()
            .map(|name| ClassEntry { name, enabled: true })
            .collect();
    }

    pub fn min_confidence(&self) -> f32 {
        self.min_confidence
    }

    /// Values outside the open interval (0, 1) are ignored
    pub fn set_min_confidence(&mut self, value: f32) {
        if value > 0.0 && value < 1.0 {
            self.min_confidence = value;
        } else {
            debug!("Ignoring min confidence {} for '{}'", value, self.name);
        }
    }

    pub fn classes(&self) -> &[ClassEntry] {
        &self.classes
    }

    pub fn class_names(&self) -> Vec<String> {
        self.classes.iter().map(|c| c.name.clone()).collect()
    }

    /// Returns false when no class has that name
    pub fn set_class_enabled(&mut self, name: &str, enabled: bool) -> bool {
        let mut found = false;
        for class in self.classes.iter_mut().filter(|c| c.name == name) {
            class.enabled = enabled;
            found = true;
        }
        found
    }

    /// Positional enable flags in class-file order; extra flags are ignored
    pub fn set_enabled_classes(&mut self, flags: &[bool]) {
        for (class, flag) in self.classes.iter_mut().zip(flags) {
            class.enabled = *flag;
        }
    }

    /// Class names ordered by how often they appeared in the last frame
    pub fn sorted_class_names(&self) -> &[String] {
        &self.sorted_class_names
    }

    pub fn last_detection(&self) -> &LastDetection {
        &self.last
    }

    /// Run the network on `frame` and draw every accepted detection.
    ///
    /// A row is accepted when its confidence exceeds the minimum and its class
    /// is enabled. The last accepted row becomes the last detection.
    pub fn detect(&mut self, frame: &mut DynamicImage, show_confidence: bool) -> Result<(), DetectionError> {
        self.last.clear();

        if matches!(
            frame,
            DynamicImage::ImageLuma8(_)
                | DynamicImage::ImageLumaA8(_)
                | DynamicImage::ImageLuma16(_)
                | DynamicImage::ImageLumaA16(_)
        ) {
            return Err(DetectionError::GrayscaleFrame);
        }

        let engine = self
            .engine
            .as_mut()
            .ok_or_else(|| DetectionError::NotLoaded(self.name.clone()))?;

        let canvas = annotate::rgb_canvas(frame);
        let (width, height) = canvas.dimensions();
        let blob = blob_from_image(canvas, INPUT_SIZE, self.params.mean_values, self.params.swap_rb);
        let output = engine
            .forward(&blob)
            .map_err(|e| DetectionError::Inference(format!("{:#}", e)))?;
        let rows = detection_rows(&output)?;

        let class_ids = rows.iter().filter_map(|row| class_index(row[1]));
        self.sorted_class_names = order_classes(&self.class_names(), class_ids);

        for row in &rows {
            let confidence = row[2];
            let Some(class) = class_index(row[1]).and_then(|idx| self.classes.get(idx)) else {
                trace!("Skipping row with unknown class id {}", row[1]);
                continue;
            };
            if !(confidence > self.min_confidence && class.enabled) {
                continue;
            }

            let box_x = (row[3] * width as f32) as i32;
            let box_y = (row[4] * height as f32) as i32;
            let box_w = (row[5] * width as f32 - box_x as f32) as i32;
            let box_h = (row[6] * height as f32 - box_y as f32) as i32;
            let rect = BoundingBox::new(box_x, box_y, box_w, box_h);

            let text = if show_confidence {
                format!("{} : confidence = {}%", class.name, (confidence * 100.0) as i32)
            } else {
                class.name.clone()
            };
            annotate::draw_box(canvas, rect, ACCENT_COLOR, BOX_THICKNESS);
            annotate::draw_label(canvas, &text, rect.x, rect.y, &self.style);

            self.last = LastDetection {
                rect,
                label: class.name.clone(),
            };
        }

        Ok(())
    }
}

/// Zero-based index into the class list for a 1-based class id; 0 is background
fn class_index(raw_id: f32) -> Option<usize> {
    if !raw_id.is_finite() || raw_id < 1.0 {
        return None;
    }
    Some(raw_id as usize - 1)
}

/// Flatten a `[.., N, 7]` detections tensor into rows
pub fn detection_rows(output: &ArrayD<f32>) -> Result<Vec<[f32; ROW_LEN]>, DetectionError> {
    let shape = output.shape();
    if shape.len() < 2 || shape[shape.len() - 1] != ROW_LEN {
        return Err(DetectionError::MalformedOutput(format!(
            "expected [.., N, {}] detections, got {:?}",
            ROW_LEN, shape
        )));
    }

    let values: Vec<f32> = output.iter().copied().collect();
    Ok(values
        .chunks_exact(ROW_LEN)
        .map(|chunk| {
            let mut row = [0.0; ROW_LEN];
            row.copy_from_slice(chunk);
            row
        })
        .collect())
}

/// Order class names by descending detection count in this frame.
///
/// Ties keep class-file order; classes not seen this frame follow in
/// class-file order. `class_ids` are zero-based indices.
pub fn order_classes(class_names: &[String], class_ids: impl Iterator<Item = usize>) -> Vec<String> {
    let mut counts: HashMap<usize, usize> = HashMap::new();
    for id in class_ids.filter(|id| *id < class_names.len()) {
        *counts.entry(id).or_insert(0) += 1;
    }

    let mut seen: Vec<usize> = (0..class_names.len()).filter(|i| counts.contains_key(i)).collect();
    seen.sort_by(|a, b| counts[b].cmp(&counts[a]));

    seen.iter()
        .copied()
        .chain((0..class_names.len()).filter(|i| !counts.contains_key(i)))
        .map(|i| class_names[i].clone())
        .collect()
}

/// One label per line, in class-id order starting at id 1
pub fn read_class_names(path: &Path) -> std::io::Result<Vec<String>> {
    let text = std::fs::read_to_string(path)?;
    Ok(text.lines().map(|line| line.trim_end_matches('\r').to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_order_by_count_then_file_order() {
        let classes = names(&["dog", "cat", "bird"]);
        // cat x3, dog x1
        let ids = [1, 0, 1, 1].into_iter();
        assert_eq!(order_classes(&classes, ids), names(&["cat", "dog", "bird"]));
    }

    #[test]
    fn test_order_ties_keep_file_order() {
        let classes = names(&["a", "b", "c", "d"]);
        let ids = [3, 1, 3, 1].into_iter();
        assert_eq!(order_classes(&classes, ids), names(&["b", "d", "a", "c"]));
    }

    #[test]
    fn test_order_ignores_unknown_ids() {
        let classes = names(&["a", "b"]);
        assert_eq!(order_classes(&classes, [7, 7, 1].into_iter()), names(&["b", "a"]));
    }

    #[test]
    fn test_class_index() {
        assert_eq!(class_index(1.0), Some(0));
        assert_eq!(class_index(0.0), None);
        assert_eq!(class_index(f32::NAN), None);
    }

    #[test]
    fn test_detection_rows_shape() {
        let ok = ArrayD::<f32>::zeros(ndarray::IxDyn(&[1, 1, 3, 7]));
        assert_eq!(detection_rows(&ok).unwrap().len(), 3);

        let bad = ArrayD::<f32>::zeros(ndarray::IxDyn(&[1, 1, 3, 6]));
        assert!(matches!(detection_rows(&bad), Err(DetectionError::MalformedOutput(_))));
    }
}
