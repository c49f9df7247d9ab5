//! Drawing detections onto frames.
//!
//! All detectors draw with one accent palette: boxes and label tags in the
//! accent color, eye circles in blue, white label text.

use std::path::Path;

use ab_glyph::FontVec;
use anyhow::Context;
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_rect_mut, draw_hollow_circle_mut, draw_hollow_rect_mut, draw_text_mut, text_size,
};
use imageproc::rect::Rect;
use tracing::debug;

use crate::models::BoundingBox;

pub const ACCENT_COLOR: Rgb<u8> = Rgb([255, 167, 147]);
pub const EYE_COLOR: Rgb<u8> = Rgb([98, 190, 239]);
pub const SMILE_COLOR: Rgb<u8> = Rgb([167, 239, 147]);
pub const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

pub const BOX_THICKNESS: u32 = 2;
pub const CIRCLE_THICKNESS: u32 = 3;

/// Approximate glyph cell used to size label tags when no font is loaded
const FALLBACK_CHAR_WIDTH: u32 = 8;
const FALLBACK_LINE_HEIGHT: u32 = 16;

/// Font settings for label tags.
///
/// Without a font the tag background is still drawn, sized from a fixed
/// glyph cell, so the detection stays visible.
pub struct LabelStyle {
    pub font: Option<FontVec>,
    pub font_scale: f32,
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            font: None,
            font_scale: 18.0,
        }
    }
}

impl std::fmt::Debug for LabelStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabelStyle")
            .field("font", &self.font.is_some())
            .field("font_scale", &self.font_scale)
            .finish()
    }
}

impl LabelStyle {
    pub fn with_font_path(font_path: &Path) -> anyhow::Result<Self> {
        let font_data = std::fs::read(font_path)
            .with_context(|| format!("Failed to read font {:?}", font_path))?;
        let font = FontVec::try_from_vec(font_data)
            .map_err(|_| anyhow::anyhow!("Failed to parse font file: {}", font_path.display()))?;
        Ok(Self {
            font: Some(font),
            ..Self::default()
        })
    }

    /// Try a few common system font locations, falling back to no font
    pub fn with_system_font() -> Self {
        let candidates = [
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/TTF/DejaVuSans.ttf",
            "/usr/share/fonts/dejavu/DejaVuSans.ttf",
            "/System/Library/Fonts/Helvetica.ttc",
            "C:\\Windows\\Fonts\\arial.ttf",
        ];
        for candidate in candidates {
            let path = Path::new(candidate);
            if path.exists() {
                if let Ok(style) = Self::with_font_path(path) {
                    debug!("Using label font {}", candidate);
                    return style;
                }
            }
        }
        debug!("No system font found, labels are drawn without text");
        Self::default()
    }

    fn text_size(&self, text: &str) -> (u32, u32) {
        match &self.font {
            Some(font) => text_size(self.font_scale, font, text),
            None => (
                FALLBACK_CHAR_WIDTH * text.chars().count() as u32,
                FALLBACK_LINE_HEIGHT,
            ),
        }
    }
}

/// Replace `frame` with its 3-channel version if needed and borrow the pixels
pub fn rgb_canvas(frame: &mut DynamicImage) -> &mut RgbImage {
    if !matches!(frame, DynamicImage::ImageRgb8(_)) {
        *frame = DynamicImage::ImageRgb8(frame.to_rgb8());
    }
    match frame {
        DynamicImage::ImageRgb8(img) => img,
        _ => unreachable!("frame was converted to Rgb8 above"),
    }
}

/// Hollow rectangle, `thickness` pixels wide, growing inwards
pub fn draw_box(canvas: &mut RgbImage, bbox: BoundingBox, color: Rgb<u8>, thickness: u32) {
    for i in 0..thickness as i32 {
        let inner = BoundingBox::new(bbox.x + i, bbox.y + i, bbox.width - 2 * i, bbox.height - 2 * i);
        match inner.to_rect() {
            Some(rect) => draw_hollow_rect_mut(canvas, rect, color),
            None => break,
        }
    }
}

/// Hollow circle with a ring `thickness` pixels wide
pub fn draw_circle(canvas: &mut RgbImage, center: (i32, i32), radius: i32, color: Rgb<u8>, thickness: u32) {
    for i in 0..thickness as i32 {
        let r = radius - thickness as i32 / 2 + i;
        if r > 0 {
            draw_hollow_circle_mut(canvas, center, r, color);
        }
    }
}

/// Filled label tag anchored at the box's top-left corner.
///
/// The tag is pushed down so it never leaves the top edge of the frame.
pub fn draw_label(canvas: &mut RgbImage, text: &str, left: i32, top: i32, style: &LabelStyle) {
    let (text_w, text_h) = style.text_size(text);
    if text_w == 0 || text_h == 0 {
        return;
    }
    let top = top.max(0);
    let left = left.max(0);
    let tag = Rect::at(left, top).of_size(text_w + 4, text_h + 4);
    draw_filled_rect_mut(canvas, tag, ACCENT_COLOR);

    if let Some(font) = &style.font {
        draw_text_mut(canvas, TEXT_COLOR, left + 2, top + 2, style.font_scale, font, text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;

    #[test]
    fn test_rgb_canvas_converts_gray() {
        let mut frame = DynamicImage::ImageLuma8(GrayImage::new(4, 4));
        let canvas = rgb_canvas(&mut frame);
        assert_eq!(canvas.dimensions(), (4, 4));
        assert!(matches!(frame, DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn test_draw_box_marks_border_only() {
        let mut canvas = RgbImage::new(20, 20);
        draw_box(&mut canvas, BoundingBox::new(2, 2, 10, 10), ACCENT_COLOR, 2);
        assert_eq!(canvas.get_pixel(2, 2), &ACCENT_COLOR);
        assert_eq!(canvas.get_pixel(3, 3), &ACCENT_COLOR);
        assert_eq!(canvas.get_pixel(7, 7), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_label_without_font_draws_tag() {
        let mut canvas = RgbImage::new(64, 32);
        draw_label(&mut canvas, "Face", 0, 0, &LabelStyle::default());
        assert_eq!(canvas.get_pixel(1, 1), &ACCENT_COLOR);
    }
}
