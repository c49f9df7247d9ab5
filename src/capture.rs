use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use image::{DynamicImage, ImageReader};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::processor::{FrameProcessor, ProcessedFrame};

/// Frames averaged by [`FpsMeter`]
pub const FPS_WINDOW: usize = 60;

const FRAME_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "tif"];

/// Anything that yields raw frames, one at a time
pub trait FrameSource: Send {
    /// `Ok(None)` once the source is exhausted
    fn next_frame(&mut self) -> Result<Option<DynamicImage>>;
}

/// Replays the image files of a directory in file-name order
#[derive(Debug)]
pub struct ImageDirectorySource {
    frames: VecDeque<PathBuf>,
}

impl ImageDirectorySource {
    pub fn open(dir: &Path) -> Result<Self> {
        let mut frames: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read frame directory {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_frame_file(path))
            .collect();
        frames.sort();
        info!("{} frame(s) found in {}", frames.len(), dir.display());

        Ok(Self {
            frames: frames.into(),
        })
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for ImageDirectorySource {
    fn next_frame(&mut self) -> Result<Option<DynamicImage>> {
        let Some(path) = self.frames.pop_front() else {
            return Ok(None);
        };
        let frame = ImageReader::open(&path)
            .with_context(|| format!("Failed to open frame {}", path.display()))?
            .decode()
            .map_err(|e| anyhow!("Failed to decode frame {}: {}", path.display(), e))?;
        Ok(Some(frame))
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Rolling frames-per-second over the last [`FPS_WINDOW`] frame intervals
#[derive(Debug, Default)]
pub struct FpsMeter {
    intervals: VecDeque<Duration>,
    last_tick: Option<Instant>,
}

impl FpsMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the start of a frame and return the updated rate
    pub fn tick(&mut self) -> f64 {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> f64 {
        if let Some(last) = self.last_tick {
            self.intervals.push_back(now.saturating_duration_since(last));
            if self.intervals.len() > FPS_WINDOW {
                self.intervals.pop_front();
            }
        }
        self.last_tick = Some(now);
        self.fps()
    }

    /// 0.0 until two frames have been seen
    pub fn fps(&self) -> f64 {
        if self.intervals.is_empty() {
            return 0.0;
        }
        let total: Duration = self.intervals.iter().sum();
        let mean = total.as_secs_f64() / self.intervals.len() as f64;
        if mean > 0.0 { 1.0 / mean } else { 0.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureSummary {
    pub frames: usize,
    /// True when the enabled flag ended the loop, false when the source ran dry
    pub cancelled: bool,
    pub fps: f64,
}

/// Run frames from `source` through `processor` until the source is
/// exhausted or `enabled` is cleared.
///
/// The flag is checked once per frame. The processor lock is held for one
/// frame at a time, and the task yields after each frame. The active
/// detector is released when the loop ends, on errors too.
pub async fn run_capture<S, F>(
    source: &mut S,
    processor: &Mutex<FrameProcessor>,
    enabled: &AtomicBool,
    sink: F,
) -> Result<CaptureSummary>
where
    S: FrameSource + ?Sized,
    F: FnMut(ProcessedFrame, f64) -> Result<()>,
{
    let mut meter = FpsMeter::new();
    let mut frames = 0;
    let outcome = capture_frames(source, processor, enabled, sink, &mut meter, &mut frames).await;

    processor.lock().await.camera_off();
    match &outcome {
        Ok(_) => info!("Capture stopped after {} frame(s) at {:.1} fps", frames, meter.fps()),
        Err(e) => warn!("Capture failed after {} frame(s): {:#}", frames, e),
    }

    Ok(CaptureSummary {
        frames,
        cancelled: outcome?,
        fps: meter.fps(),
    })
}

/// The frame loop itself; returns whether the flag ended it
async fn capture_frames<S, F>(
    source: &mut S,
    processor: &Mutex<FrameProcessor>,
    enabled: &AtomicBool,
    mut sink: F,
    meter: &mut FpsMeter,
    frames: &mut usize,
) -> Result<bool>
where
    S: FrameSource + ?Sized,
    F: FnMut(ProcessedFrame, f64) -> Result<()>,
{
    loop {
        if !enabled.load(Ordering::Acquire) {
            return Ok(true);
        }
        let Some(frame) = source.next_frame()? else {
            return Ok(false);
        };

        let fps = meter.tick();
        let processed = processor.lock().await.process_frame(frame)?;
        if let Some(failure) = &processed.detection_failure {
            debug!("Frame {}: {}", frames, failure);
        }
        sink(processed, fps)?;
        *frames += 1;

        tokio::task::yield_now().await;
    }
}
