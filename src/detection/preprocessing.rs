use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::{ThresholdType, equalize_histogram, threshold};
use imageproc::edges::canny;
use imageproc::filter::box_filter;

/// Canny hysteresis thresholds used by the edge operation
pub const CANNY_LOW_THRESHOLD: f32 = 50.0;
pub const CANNY_HIGH_THRESHOLD: f32 = 100.0;

/// Constant subtracted from the local mean in adaptive thresholding
pub const ADAPTIVE_OFFSET: i16 = 2;

/// Convert image to grayscale
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

pub fn is_grayscale(img: &DynamicImage) -> bool {
    matches!(img, DynamicImage::ImageLuma8(_) | DynamicImage::ImageLuma16(_))
}

/// Expand a single-channel frame back to three channels
pub fn to_color(img: &DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => img.clone(),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

pub fn equalize(img: &GrayImage) -> GrayImage {
    equalize_histogram(img)
}

/// Pixels above `level` become white, the rest black
pub fn binary_threshold(img: &GrayImage, level: u8) -> GrayImage {
    threshold(img, level, ThresholdType::Binary)
}

/// Pixels at or below `level` become zero, per channel; the rest keep their value
pub fn zero_threshold(img: &DynamicImage, level: u8) -> DynamicImage {
    match img {
        DynamicImage::ImageLuma8(gray) => {
            DynamicImage::ImageLuma8(threshold(gray, level, ThresholdType::ToZero))
        }
        DynamicImage::ImageRgba8(rgba) => {
            let mut out = rgba.clone();
            for pixel in out.pixels_mut() {
                for channel in pixel.0.iter_mut().take(3) {
                    if *channel <= level {
                        *channel = 0;
                    }
                }
            }
            DynamicImage::ImageRgba8(out)
        }
        other => {
            let mut out = other.to_rgb8();
            for pixel in out.pixels_mut() {
                for channel in pixel.0.iter_mut() {
                    if *channel <= level {
                        *channel = 0;
                    }
                }
            }
            DynamicImage::ImageRgb8(out)
        }
    }
}

/// Mean-C adaptive threshold over a `(2r+1)` square neighbourhood
pub fn adaptive_threshold(img: &GrayImage, block_radius: u8) -> GrayImage {
    let radius = block_radius.max(1) as u32;
    let means = box_filter(img, radius, radius);
    let mut out = GrayImage::new(img.width(), img.height());
    for (x, y, pixel) in img.enumerate_pixels() {
        let mean = means.get_pixel(x, y)[0] as i16;
        let value = if pixel[0] as i16 > mean - ADAPTIVE_OFFSET { 255 } else { 0 };
        out.put_pixel(x, y, Luma([value]));
    }
    out
}

/// Canny edges of the frame, returned as a three-channel frame
pub fn detect_edges(img: &DynamicImage) -> DynamicImage {
    let gray = to_grayscale(img);
    let edges = canny(&gray, CANNY_LOW_THRESHOLD, CANNY_HIGH_THRESHOLD);
    DynamicImage::ImageRgb8(DynamicImage::ImageLuma8(edges).to_rgb8())
}
