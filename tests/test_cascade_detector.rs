mod common;

use std::path::Path;
use std::sync::Arc;

use common::*;
use facelens::core::CascadeParams;
use facelens::detection::CascadeDetector;
use facelens::detection::annotate::{ACCENT_COLOR, EYE_COLOR, SMILE_COLOR};
use facelens::detection::haar::DetectParams;
use facelens::models::BoundingBox;
use image::{DynamicImage, Rgb};

const FRAME: u32 = 48;

/// Face, eye and smile cascades that each match exactly one window on a
/// `split_frame(FRAME)`: the whole face, the whole face again as an eye,
/// and the lower half of the face as a smile
fn make_detector(dir: &Path, with_features: bool) -> anyhow::Result<CascadeDetector> {
    let face = write_edge_cascade(dir, "face.json", FRAME, FRAME);
    let params = if with_features {
        CascadeParams {
            face_path: face,
            eyes_path: Some(write_edge_cascade(dir, "eyes.json", FRAME, FRAME)),
            smile_path: Some(write_edge_cascade(dir, "smile.json", FRAME, FRAME / 2)),
        }
    } else {
        CascadeParams {
            face_path: face,
            ..Default::default()
        }
    };

    let mut detector = CascadeDetector::new("Faces", params, Arc::new(LabelStyle::default()))
        .with_detect_params(DetectParams {
            scale_factor: 1.1,
            min_neighbors: 0,
        });
    detector.init()?;
    Ok(detector)
}

fn has_color(frame: &DynamicImage, color: Rgb<u8>) -> bool {
    frame.to_rgb8().pixels().any(|p| *p == color)
}

#[test]
fn test_face_box_and_label() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let mut detector = make_detector(dir.path(), false)?;
    assert!(!detector.can_detect_eyes());

    let mut frame = split_frame(FRAME);
    detector.detect(&mut frame, true)?;

    let last = detector.last_detection();
    assert_eq!(last.label, "Face");
    assert_eq!(last.rect, BoundingBox::new(0, 0, FRAME as i32, FRAME as i32));
    assert_eq!(detector.faces().len(), 1);

    let canvas = frame.to_rgb8();
    // Right border of the box, below the label tag
    assert_eq!(canvas.get_pixel(FRAME - 1, 30), &ACCENT_COLOR);
    // Filled label tag in the top-left corner
    assert_eq!(canvas.get_pixel(10, 10), &ACCENT_COLOR);
    Ok(())
}

#[test]
fn test_eye_circles_and_smiles() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let mut detector = make_detector(dir.path(), true)?;
    assert!(detector.can_detect_eyes());
    assert!(detector.can_detect_smiles());
    assert!(detector.notices().is_empty());

    let mut frame = split_frame(FRAME);
    detector.detect(&mut frame, true)?;
    let canvas = frame.to_rgb8();

    // Eye centered at (24, 24) with radius round(0.25 * (48 + 48)) = 24
    assert_eq!(canvas.get_pixel(24, 0), &EYE_COLOR);
    assert_eq!(canvas.get_pixel(0, 24), &EYE_COLOR);
    assert_ne!(canvas.get_pixel(24, 12), &EYE_COLOR);

    // Smile box over the lower half of the face
    assert_eq!(canvas.get_pixel(40, FRAME / 2), &SMILE_COLOR);
    assert_eq!(canvas.get_pixel(40, FRAME - 1), &SMILE_COLOR);
    assert_eq!(detector.last_detection().label, "Face");
    Ok(())
}

#[test]
fn test_features_off_skips_eyes_and_smiles() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let mut detector = make_detector(dir.path(), true)?;

    let mut frame = split_frame(FRAME);
    detector.detect(&mut frame, false)?;

    assert!(!detector.last_detection().rect.is_empty());
    assert!(has_color(&frame, ACCENT_COLOR));
    assert!(!has_color(&frame, EYE_COLOR));
    assert!(!has_color(&frame, SMILE_COLOR));
    Ok(())
}

#[test]
fn test_no_faces_leaves_frame_untouched() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let mut detector = make_detector(dir.path(), true)?;

    // A face first, so the empty result below is a fresh one
    detector.detect(&mut split_frame(FRAME), false)?;
    assert!(!detector.last_detection().rect.is_empty());

    let mut frame = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(FRAME, FRAME, Rgb([128, 128, 128])));
    let before = frame.clone();
    detector.detect(&mut frame, true)?;

    assert!(detector.last_detection().rect.is_empty());
    assert!(detector.faces().is_empty());
    assert_eq!(frame, before);
    Ok(())
}
