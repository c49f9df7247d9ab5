use crate::detection::preprocessing;
use crate::pipeline::{PipelineContext, PipelineStep};
use anyhow::Result;
use image::DynamicImage;

/// Convert image to grayscale
pub struct GrayscaleStep;

impl PipelineStep for GrayscaleStep {
    fn process(&self, frame: DynamicImage, _context: &PipelineContext) -> Result<DynamicImage> {
        Ok(DynamicImage::ImageLuma8(preprocessing::to_grayscale(&frame)))
    }

    fn name(&self) -> &str {
        "Grayscale Conversion"
    }
}

/// Expand a grayscale frame back to three channels
pub struct ColorStep;

impl PipelineStep for ColorStep {
    fn process(&self, frame: DynamicImage, _context: &PipelineContext) -> Result<DynamicImage> {
        Ok(preprocessing::to_color(&frame))
    }

    fn name(&self) -> &str {
        "Color Conversion"
    }
}

pub struct HistogramEqualizationStep;

impl PipelineStep for HistogramEqualizationStep {
    fn process(&self, frame: DynamicImage, _context: &PipelineContext) -> Result<DynamicImage> {
        let gray = frame.to_luma8();
        Ok(DynamicImage::ImageLuma8(preprocessing::equalize(&gray)))
    }

    fn name(&self) -> &str {
        "Histogram Equalization"
    }
}

pub struct BinaryThresholdStep {
    pub level: u8,
}

impl PipelineStep for BinaryThresholdStep {
    fn process(&self, frame: DynamicImage, _context: &PipelineContext) -> Result<DynamicImage> {
        let gray = frame.to_luma8();
        Ok(DynamicImage::ImageLuma8(preprocessing::binary_threshold(&gray, self.level)))
    }

    fn name(&self) -> &str {
        "Binary Thresholding"
    }
}

pub struct AdaptiveThresholdStep {
    pub level: u8,
}

impl PipelineStep for AdaptiveThresholdStep {
    fn process(&self, frame: DynamicImage, _context: &PipelineContext) -> Result<DynamicImage> {
        let gray = frame.to_luma8();
        Ok(DynamicImage::ImageLuma8(preprocessing::adaptive_threshold(&gray, self.level)))
    }

    fn name(&self) -> &str {
        "Adaptive Thresholding"
    }
}

/// Works on color frames, per channel
pub struct ZeroThresholdStep {
    pub level: u8,
}

impl PipelineStep for ZeroThresholdStep {
    fn process(&self, frame: DynamicImage, _context: &PipelineContext) -> Result<DynamicImage> {
        Ok(preprocessing::zero_threshold(&frame, self.level))
    }

    fn name(&self) -> &str {
        "Thresholding To Zero"
    }
}

/// Detect edges using Canny
pub struct EdgeDetectionStep;

impl PipelineStep for EdgeDetectionStep {
    fn process(&self, frame: DynamicImage, _context: &PipelineContext) -> Result<DynamicImage> {
        let color = if preprocessing::is_grayscale(&frame) {
            preprocessing::to_color(&frame)
        } else {
            frame
        };
        Ok(preprocessing::detect_edges(&color))
    }

    fn name(&self) -> &str {
        "Edge Detection"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipAxis {
    Horizontal,
    Vertical,
}

/// Mirror the frame around one axis
pub struct FlipStep {
    pub axis: FlipAxis,
}

impl PipelineStep for FlipStep {
    fn process(&self, frame: DynamicImage, _context: &PipelineContext) -> Result<DynamicImage> {
        Ok(match self.axis {
            FlipAxis::Horizontal => frame.fliph(),
            FlipAxis::Vertical => frame.flipv(),
        })
    }

    fn name(&self) -> &str {
        match self.axis {
            FlipAxis::Horizontal => "Horizontal Flip",
            FlipAxis::Vertical => "Vertical Flip",
        }
    }
}
