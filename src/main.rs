use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use facelens::capture::{ImageDirectorySource, run_capture};
use facelens::processor::save_frame;
use facelens::{FrameProcessor, LabelStyle, ModelRegistry, Operation, PipelineContext};

#[derive(Parser)]
#[command(name = "facelens")]
#[command(about = "Apply image operations and run face or object detectors on images")]
struct Cli {
    /// Detector registry (JSON array of detector entries)
    #[arg(long, value_name = "FILE", default_value = "data/detectors.json")]
    registry: PathBuf,

    /// TrueType font for detection labels (system font when omitted)
    #[arg(long, value_name = "FILE")]
    font: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Save debug outputs to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the detectors listed in the registry
    List,

    /// Process one image and save the result
    Process {
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,

        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        #[command(flatten)]
        ops: OperationArgs,
    },

    /// Run every image in a directory through the capture loop
    Replay {
        #[arg(value_name = "DIR")]
        frames_dir: PathBuf,

        #[arg(short, long, value_name = "DIR")]
        output: PathBuf,

        #[command(flatten)]
        ops: OperationArgs,
    },
}

#[derive(Args)]
struct OperationArgs {
    /// Detector to activate
    #[arg(short, long)]
    detector: Option<String>,

    /// Minimum confidence for network detectors, in percent (5-95)
    #[arg(long, value_name = "PERCENT")]
    min_confidence: Option<u8>,

    #[arg(long)]
    flip_horizontal: bool,

    #[arg(long)]
    flip_vertical: bool,

    /// Also find eyes and smiles (cascade detectors)
    #[arg(long)]
    show_features: bool,

    /// Print confidence next to labels (network detectors)
    #[arg(long)]
    show_confidence: bool,

    #[arg(long)]
    equalize: bool,

    #[arg(long, value_name = "LEVEL")]
    binary_threshold: Option<u8>,

    #[arg(long, value_name = "LEVEL")]
    zero_threshold: Option<u8>,

    #[arg(long, value_name = "LEVEL")]
    adaptive_threshold: Option<u8>,

    #[arg(long)]
    edges: bool,
}

impl OperationArgs {
    fn operations(&self) -> Vec<Operation> {
        let mut ops = Vec::new();
        let flags = [
            (self.flip_horizontal, Operation::FlipHorizontal(true)),
            (self.flip_vertical, Operation::FlipVertical(true)),
            (self.show_features, Operation::ShowFeatures(true)),
            (self.show_confidence, Operation::ShowConfidence(true)),
            (self.equalize, Operation::HistogramEqualization(true)),
            (self.edges, Operation::DetectEdges(true)),
        ];
        ops.extend(flags.into_iter().filter(|(on, _)| *on).map(|(_, op)| op));
        ops.extend(self.binary_threshold.map(Operation::BinaryThreshold));
        ops.extend(self.zero_threshold.map(Operation::ZeroThreshold));
        ops.extend(self.adaptive_threshold.map(Operation::AdaptiveThreshold));
        ops
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn label_style(font: Option<&Path>) -> Result<LabelStyle> {
    match font {
        Some(path) => LabelStyle::with_font_path(path),
        None => Ok(LabelStyle::with_system_font()),
    }
}

/// Set up the processor: registry, operations, detector and confidence
fn build_processor(cli: &Cli, ops: &OperationArgs) -> Result<FrameProcessor> {
    let mut context = PipelineContext::default();
    if let Some(dir) = &cli.debug_out {
        context = context.with_debug(dir.clone())?;
    }

    let style = Arc::new(label_style(cli.font.as_deref())?);
    let registry = ModelRegistry::new(&cli.registry).with_label_style(style);
    let mut processor = FrameProcessor::new().with_pipeline_context(context);

    if let Some(name) = &ops.detector {
        processor.initialize(registry)?;
        let notices = processor
            .select_detector(name)
            .with_context(|| format!("Couldn't load detector '{}'", name))?;
        for notice in notices {
            println!("{}", notice);
        }
    }

    if let Some(percent) = ops.min_confidence {
        if !processor.set_min_confidence_percent(percent) {
            warn!("Minimum confidence must be between 5 and 95, keeping the default");
        }
    }

    for op in ops.operations() {
        if let Some(status) = processor.apply(op) {
            info!("{}", status);
        }
    }
    if processor.operations().has_threshold_conflict() {
        warn!("More than one thresholding mode is enabled");
    }

    Ok(processor)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Command::List => {
            let names = ModelRegistry::new(&cli.registry).list_names()?;
            if names.is_empty() {
                println!("No detectors in {}", cli.registry.display());
            }
            for name in names {
                println!("{}", name);
            }
        }

        Command::Process {
            image_path,
            output,
            ops,
        } => {
            let mut processor = build_processor(&cli, ops)?;
            println!("{}", processor.upload_image(image_path)?);

            let processed = processor.reprocess()?;
            if let Some(status) = &processed.status {
                println!("{}", status);
            }
            println!("{}", save_frame(&processed.image, output)?);
        }

        Command::Replay {
            frames_dir,
            output,
            ops,
        } => {
            std::fs::create_dir_all(output)
                .with_context(|| format!("Failed to create {}", output.display()))?;
            let processor = Mutex::new(build_processor(&cli, ops)?);
            let mut source = ImageDirectorySource::open(frames_dir)?;

            let enabled = Arc::new(AtomicBool::new(true));
            let ctrl_c_flag = Arc::clone(&enabled);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    ctrl_c_flag.store(false, Ordering::Release);
                }
            });

            let mut index = 0;
            let summary = run_capture(&mut source, &processor, &enabled, |frame, fps| {
                let path = output.join(format!("{:04}.png", index));
                index += 1;
                frame.image.save(&path)?;
                if let Some(status) = &frame.status {
                    info!("{} ({:.1} fps)", status, fps);
                }
                Ok(())
            })
            .await?;

            println!(
                "Processed {} frame(s) at {:.1} fps{}",
                summary.frames,
                summary.fps,
                if summary.cancelled { " (interrupted)" } else { "" }
            );
        }
    }

    Ok(())
}
