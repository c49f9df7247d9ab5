//! Haar cascade classifier runtime.
//!
//! Viola-Jones detection with boosted stumps over Haar-like features.
//! Cascades are stored as JSON:
//!
//! ```json
//! { "window": [24, 24],
//!   "stages": [ { "threshold": -1.2,
//!                 "features": [ { "rects": [[0, 0, 12, 24, 1.0], [12, 0, 12, 24, -1.0]],
//!                                 "threshold": 0.5, "left": -1.0, "right": 1.0 } ] } ] }
//! ```
//!
//! Rectangles are `[x, y, w, h, weight]` in window coordinates. Feature
//! thresholds are expressed per unit of window standard deviation.

use std::path::Path;

use anyhow::Context;
use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::models::BoundingBox;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaarCascade {
    /// Base detection window (width, height)
    pub window: (u32, u32),
    pub stages: Vec<CascadeStage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeStage {
    pub threshold: f32,
    pub features: Vec<HaarFeature>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaarFeature {
    pub rects: Vec<[f32; 5]>,
    pub threshold: f32,
    pub left: f32,
    pub right: f32,
}

/// Multi-scale search settings
#[derive(Debug, Clone, Copy)]
pub struct DetectParams {
    pub scale_factor: f32,
    /// Raw hits a group needs beyond the first to survive; 0 disables grouping
    pub min_neighbors: usize,
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 3,
        }
    }
}

/// Overlap tolerance used when grouping raw hits
const GROUP_EPS: f32 = 0.2;

impl HaarCascade {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read cascade {:?}", path))?;
        let cascade: HaarCascade = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse cascade {:?}", path))?;
        cascade.validate()?;
        Ok(cascade)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let (w, h) = self.window;
        if w == 0 || h == 0 {
            anyhow::bail!("cascade window must be non-empty, got {}x{}", w, h);
        }
        for (i, stage) in self.stages.iter().enumerate() {
            for feature in &stage.features {
                for r in &feature.rects {
                    let inside = r[0] >= 0.0
                        && r[1] >= 0.0
                        && r[2] > 0.0
                        && r[3] > 0.0
                        && r[0] + r[2] <= w as f32
                        && r[1] + r[3] <= h as f32;
                    if !inside {
                        anyhow::bail!("stage {} has a feature rectangle outside the {}x{} window", i, w, h);
                    }
                }
            }
        }
        Ok(())
    }

    /// Detect objects at every scale that fits the image
    pub fn detect(&self, image: &GrayImage, params: &DetectParams) -> Vec<BoundingBox> {
        let integral = IntegralImage::new(image);
        let (img_w, img_h) = image.dimensions();
        let scale_factor = params.scale_factor.max(1.01);

        let mut hits = Vec::new();
        let mut scale = 1.0f32;
        loop {
            let win_w = (self.window.0 as f32 * scale) as u32;
            let win_h = (self.window.1 as f32 * scale) as u32;
            if win_w > img_w || win_h > img_h {
                break;
            }
            let step = (scale * 2.0).max(1.0) as usize;

            for y in (0..=img_h - win_h).step_by(step) {
                for x in (0..=img_w - win_w).step_by(step) {
                    if self.evaluate_window(&integral, x, y, win_w, win_h, scale) {
                        hits.push(BoundingBox::new(x as i32, y as i32, win_w as i32, win_h as i32));
                    }
                }
            }
            scale *= scale_factor;
        }

        group_rectangles(hits, params.min_neighbors)
    }

    fn evaluate_window(&self, integral: &IntegralImage, x: u32, y: u32, w: u32, h: u32, scale: f32) -> bool {
        let std_dev = integral.std_dev(x, y, w, h).max(1.0);
        let area_scale = scale * scale;

        for stage in &self.stages {
            let mut stage_sum = 0.0f32;
            for feature in &stage.features {
                let value = feature.evaluate(integral, x, y, scale) / area_scale;
                stage_sum += if value < feature.threshold * std_dev {
                    feature.left
                } else {
                    feature.right
                };
            }
            if stage_sum < stage.threshold {
                return false;
            }
        }
        true
    }
}

impl HaarFeature {
    fn evaluate(&self, integral: &IntegralImage, ox: u32, oy: u32, scale: f32) -> f32 {
        let mut sum = 0.0f32;
        for r in &self.rects {
            let rx = ox + (r[0] * scale) as u32;
            let ry = oy + (r[1] * scale) as u32;
            let rw = ((r[2] * scale) as u32).max(1);
            let rh = ((r[3] * scale) as u32).max(1);
            sum += integral.sum(rx, ry, rw, rh) as f32 * r[4];
        }
        sum
    }
}

/// Summed-area tables of pixel values and squared pixel values
struct IntegralImage {
    stride: usize,
    width: u32,
    height: u32,
    sum: Vec<u64>,
    sq_sum: Vec<u64>,
}

impl IntegralImage {
    fn new(src: &GrayImage) -> Self {
        let (w, h) = src.dimensions();
        let stride = w as usize + 1;
        let mut sum = vec![0u64; stride * (h as usize + 1)];
        let mut sq_sum = vec![0u64; stride * (h as usize + 1)];
        let raw = src.as_raw();

        for y in 0..h as usize {
            let mut row = 0u64;
            let mut row_sq = 0u64;
            for x in 0..w as usize {
                let v = raw[y * w as usize + x] as u64;
                row += v;
                row_sq += v * v;
                let idx = (y + 1) * stride + (x + 1);
                sum[idx] = sum[idx - stride] + row;
                sq_sum[idx] = sq_sum[idx - stride] + row_sq;
            }
        }

        Self {
            stride,
            width: w,
            height: h,
            sum,
            sq_sum,
        }
    }

    fn corners(&self, x: u32, y: u32, w: u32, h: u32) -> (usize, usize, usize, usize) {
        let x1 = (x + w).min(self.width) as usize;
        let y1 = (y + h).min(self.height) as usize;
        let x0 = (x as usize).min(x1);
        let y0 = (y as usize).min(y1);
        (
            y0 * self.stride + x0,
            y0 * self.stride + x1,
            y1 * self.stride + x0,
            y1 * self.stride + x1,
        )
    }

    fn sum(&self, x: u32, y: u32, w: u32, h: u32) -> u64 {
        let (tl, tr, bl, br) = self.corners(x, y, w, h);
        self.sum[br] + self.sum[tl] - self.sum[tr] - self.sum[bl]
    }

    fn std_dev(&self, x: u32, y: u32, w: u32, h: u32) -> f32 {
        let (tl, tr, bl, br) = self.corners(x, y, w, h);
        let n = (w as f64) * (h as f64);
        if n == 0.0 {
            return 0.0;
        }
        let s = (self.sum[br] + self.sum[tl] - self.sum[tr] - self.sum[bl]) as f64;
        let sq = (self.sq_sum[br] + self.sq_sum[tl] - self.sq_sum[tr] - self.sq_sum[bl]) as f64;
        let mean = s / n;
        ((sq / n - mean * mean).max(0.0)).sqrt() as f32
    }
}

fn similar(a: &BoundingBox, b: &BoundingBox) -> bool {
    let delta = GROUP_EPS * (a.width.min(b.width) + a.height.min(b.height)) as f32 * 0.5;
    (a.x - b.x).abs() as f32 <= delta
        && (a.y - b.y).abs() as f32 <= delta
        && (a.right() - b.right()).abs() as f32 <= delta
        && (a.bottom() - b.bottom()).abs() as f32 <= delta
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// Cluster overlapping hits and average each cluster.
///
/// Clusters with `min_neighbors` or fewer members are dropped, as are
/// clusters sitting inside a stronger one.
pub fn group_rectangles(hits: Vec<BoundingBox>, min_neighbors: usize) -> Vec<BoundingBox> {
    if min_neighbors == 0 || hits.is_empty() {
        return hits;
    }

    let mut parent: Vec<usize> = (0..hits.len()).collect();
    for i in 0..hits.len() {
        for j in (i + 1)..hits.len() {
            if similar(&hits[i], &hits[j]) {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[rj] = ri;
                }
            }
        }
    }

    // root -> (count, sum x, sum y, sum w, sum h)
    let mut clusters: Vec<(usize, [i64; 5])> = Vec::new();
    let mut slot_of_root = vec![usize::MAX; hits.len()];
    for (i, hit) in hits.iter().enumerate() {
        let root = find(&mut parent, i);
        if slot_of_root[root] == usize::MAX {
            slot_of_root[root] = clusters.len();
            clusters.push((root, [0; 5]));
        }
        let acc = &mut clusters[slot_of_root[root]].1;
        acc[0] += 1;
        acc[1] += hit.x as i64;
        acc[2] += hit.y as i64;
        acc[3] += hit.width as i64;
        acc[4] += hit.height as i64;
    }

    let averaged: Vec<(usize, BoundingBox)> = clusters
        .into_iter()
        .filter(|(_, acc)| acc[0] as usize > min_neighbors)
        .map(|(_, acc)| {
            let n = acc[0];
            let rect = BoundingBox::new(
                (acc[1] / n) as i32,
                (acc[2] / n) as i32,
                (acc[3] / n) as i32,
                (acc[4] / n) as i32,
            );
            (n as usize, rect)
        })
        .collect();

    averaged
        .iter()
        .filter(|(count, rect)| {
            !averaged.iter().any(|(other_count, other)| {
                other != rect && other_count > count && contains(other, rect)
            })
        })
        .map(|(_, rect)| *rect)
        .collect()
}

fn contains(outer: &BoundingBox, inner: &BoundingBox) -> bool {
    inner.x >= outer.x && inner.y >= outer.y && inner.right() <= outer.right() && inner.bottom() <= outer.bottom()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    /// One stump: left half brighter than right half
    fn edge_cascade() -> HaarCascade {
        HaarCascade {
            window: (8, 8),
            stages: vec![CascadeStage {
                threshold: 0.5,
                features: vec![HaarFeature {
                    rects: vec![[0.0, 0.0, 4.0, 8.0, 1.0], [4.0, 0.0, 4.0, 8.0, -1.0]],
                    threshold: 0.5,
                    left: -1.0,
                    right: 1.0,
                }],
            }],
        }
    }

    #[test]
    fn test_integral_sum() {
        let img = GrayImage::from_fn(4, 3, |x, y| Luma([(x + y) as u8]));
        let integral = IntegralImage::new(&img);
        let expected: u64 = (1..3).flat_map(|y| (1..4).map(move |x| (x + y) as u64)).sum();
        assert_eq!(integral.sum(1, 1, 3, 2), expected);
        assert_eq!(integral.std_dev(0, 0, 1, 1), 0.0);
    }

    #[test]
    fn test_flat_image_has_no_hits() {
        let img = GrayImage::from_pixel(40, 40, Luma([128]));
        let params = DetectParams { scale_factor: 1.2, min_neighbors: 0 };
        assert!(edge_cascade().detect(&img, &params).is_empty());
    }

    #[test]
    fn test_bright_left_edge_is_found() {
        let img = GrayImage::from_fn(40, 40, |x, _| Luma([if x < 20 { 220 } else { 20 }]));
        let params = DetectParams { scale_factor: 1.2, min_neighbors: 0 };
        let hits = edge_cascade().detect(&img, &params);
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|r| r.x < 20 && r.right() > 20));
    }

    #[test]
    fn test_group_rectangles_merges_and_filters() {
        let cluster = vec![
            BoundingBox::new(10, 10, 20, 20),
            BoundingBox::new(11, 10, 20, 20),
            BoundingBox::new(10, 11, 20, 20),
            BoundingBox::new(12, 12, 20, 20),
        ];
        let mut hits = cluster.clone();
        hits.push(BoundingBox::new(100, 100, 20, 20));

        let grouped = group_rectangles(hits, 3);
        assert_eq!(grouped, vec![BoundingBox::new(10, 10, 20, 20)]);
        assert_eq!(group_rectangles(cluster.clone(), 4), vec![]);
        assert_eq!(group_rectangles(cluster.clone(), 0).len(), 4);
    }

    #[test]
    fn test_rejects_rect_outside_window() {
        let mut cascade = edge_cascade();
        cascade.stages[0].features[0].rects[1] = [6.0, 0.0, 4.0, 8.0, -1.0];
        assert!(cascade.validate().is_err());
    }
}
