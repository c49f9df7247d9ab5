use std::fmt;

use imageproc::rect::Rect;

/// Rectangle in frame pixel coordinates.
///
/// Coordinates are signed because network detections can start slightly
/// outside the frame. An empty box (zero or negative extent) means
/// "nothing detected".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    pub fn area(&self) -> i64 {
        if self.is_empty() {
            return 0;
        }
        self.width as i64 * self.height as i64
    }

    /// Intersect with a `width` x `height` frame.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<BoundingBox> {
        let x1 = self.x.max(0);
        let y1 = self.y.max(0);
        let x2 = self.right().min(width as i32);
        let y2 = self.bottom().min(height as i32);

        let clamped = BoundingBox::new(x1, y1, x2 - x1, y2 - y1);
        if clamped.is_empty() { None } else { Some(clamped) }
    }

    /// Drawing rectangle, `None` for empty boxes.
    pub fn to_rect(&self) -> Option<Rect> {
        if self.is_empty() {
            return None;
        }
        Some(Rect::at(self.x, self.y).of_size(self.width as u32, self.height as u32))
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} {}> - <{} {}>", self.x, self.y, self.right(), self.bottom())
    }
}

/// Detector family tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorKind {
    Cascade,
    Network,
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectorKind::Cascade => write!(f, "cascade"),
            DetectorKind::Network => write!(f, "network"),
        }
    }
}

/// Last rectangle and label a detector drew
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastDetection {
    pub rect: BoundingBox,
    pub label: String,
}

impl LastDetection {
    pub fn clear(&mut self) {
        self.rect = BoundingBox::default();
        self.label.clear();
    }

    /// Status line for a non-empty detection
    pub fn status_message(&self) -> Option<String> {
        if self.rect.is_empty() {
            return None;
        }
        Some(format!("Detected {} at: {}", self.label, self.rect))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_box() {
        assert!(BoundingBox::default().is_empty());
        assert!(BoundingBox::new(3, 4, 0, 10).is_empty());
        assert!(!BoundingBox::new(3, 4, 1, 1).is_empty());
    }

    #[test]
    fn test_clamp_to_frame() {
        let b = BoundingBox::new(-5, 10, 20, 100);
        assert_eq!(b.clamp_to(50, 50), Some(BoundingBox::new(0, 10, 15, 40)));
        assert_eq!(BoundingBox::new(60, 60, 5, 5).clamp_to(50, 50), None);
    }

    #[test]
    fn test_status_message() {
        let det = LastDetection {
            rect: BoundingBox::new(10, 20, 30, 40),
            label: "cat".to_string(),
        };
        assert_eq!(det.status_message().as_deref(), Some("Detected cat at: <10 20> - <40 60>"));
        assert_eq!(LastDetection::default().status_message(), None);
    }
}
