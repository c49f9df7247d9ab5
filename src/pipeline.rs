use anyhow::Result;
use image::DynamicImage;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
    /// Whether debug mode is enabled
    pub enabled: bool,
}

/// Context available to all pipeline steps
#[derive(Clone, Debug, Default)]
pub struct PipelineContext {
    pub debug: Option<DebugConfig>,
}

impl PipelineContext {
    /// Enable debug mode with output directory
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(anyhow::anyhow!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                ));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.debug = Some(DebugConfig {
            output_dir,
            enabled: true,
        });
        Ok(self)
    }

    fn debug_dir(&self) -> Option<&PathBuf> {
        self.debug
            .as_ref()
            .filter(|config| config.enabled)
            .map(|config| &config.output_dir)
    }
}

/// One image operation applied to a whole frame
pub trait PipelineStep: Send + Sync {
    /// Transform the frame
    fn process(&self, frame: DynamicImage, context: &PipelineContext) -> Result<DynamicImage>;

    /// Human-readable name for this step (used in logs and debug output)
    fn name(&self) -> &str;
}

/// Composable pipeline builder
pub struct Pipeline {
    steps: Vec<Arc<dyn PipelineStep>>,
    context: PipelineContext,
}

impl Pipeline {
    /// Create a new empty pipeline
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            context: PipelineContext::default(),
        }
    }

    pub fn with_context(mut self, context: PipelineContext) -> Self {
        self.context = context;
        self
    }

    /// Add a processing step to the pipeline
    pub fn add_step_boxed(mut self, step: Box<dyn PipelineStep>) -> Self {
        self.steps.push(Arc::from(step));
        self
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in order on one frame.
    ///
    /// In debug mode each step's output is saved as
    /// `<debug dir>/<NN>_<step>/<frame_index>.png`.
    pub fn run(&self, input: DynamicImage, frame_index: usize) -> Result<DynamicImage> {
        if let Some(dir) = self.context.debug_dir() {
            save_debug_frame(&input, &dir.join("00_input"), frame_index)?;
        }

        let mut frame = input;
        for (step_idx, step) in self.steps.iter().enumerate() {
            let started = Instant::now();
            frame = step.process(frame, &self.context)?;
            debug!("Step {} took {:?}", step.name(), started.elapsed());

            if let Some(dir) = self.context.debug_dir() {
                let step_dir_name = format!(
                    "{:02}_{}",
                    step_idx + 1,
                    step.name().to_lowercase().replace(' ', "_")
                );
                save_debug_frame(&frame, &dir.join(step_dir_name), frame_index)?;
            }
        }

        Ok(frame)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn save_debug_frame(frame: &DynamicImage, step_dir: &std::path::Path, frame_index: usize) -> Result<()> {
    std::fs::create_dir_all(step_dir)?;
    let output_path = step_dir.join(format!("{:04}.png", frame_index));
    frame
        .save(&output_path)
        .map_err(|e| anyhow::anyhow!("Failed to save debug image: {}", e))?;
    debug!("Debug: saved {}", output_path.display());
    Ok(())
}
