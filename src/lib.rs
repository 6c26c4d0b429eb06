//! yolokit: YOLO detection and dataset preparation helpers.
//!
//! Two independent pipelines share this crate:
//!
//! - [`detect`]: load an image from disk or a URL, run an ONNX YOLO model,
//!   draw the boxes and save the result.
//! - [`prepare`]: split a flat folder of images and YOLO label files into the
//!   `images/{train,val}` + `labels/{train,val}` layout with a `data.yaml`.
//!
//! # Modules
//!
//! - [`detect`]: Image loading, inference, annotation
//! - [`prepare`]: Train/val split, copying, manifest writing
//! - [`error`]: Error types for yolokit operations

pub mod detect;
pub mod error;
pub mod prepare;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

pub use error::YoloKitError;

/// The yolokit CLI application.
#[derive(Parser)]
#[command(name = "yolokit")]
#[command(version, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Detect objects in an image and save an annotated copy.
    Detect(DetectArgs),
    /// Split a folder of images and labels into a YOLO train/val dataset.
    Prepare(PrepareArgs),
}

/// Report format for command output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

/// Arguments for the detect subcommand.
#[derive(clap::Args)]
struct DetectArgs {
    /// Path to input image or http(s) URL.
    #[arg(short, long)]
    image: String,

    /// Path to output image (default: <input>_detected.<ext>).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path to ONNX model weights.
    #[arg(short, long, env = "YOLOKIT_MODEL", default_value = detect::DEFAULT_MODEL_PATH)]
    model: PathBuf,

    /// Confidence threshold (0-1).
    #[arg(short, long, default_value_t = 0.25)]
    conf: f32,

    /// IoU threshold for non-maximum suppression (0-1).
    #[arg(long, default_value_t = 0.7)]
    iou: f32,

    /// Model input size in pixels.
    #[arg(long, default_value_t = 640)]
    imgsz: u32,

    /// data.yaml to read class names from.
    #[arg(long)]
    data: Option<PathBuf>,

    /// TrueType font for box labels.
    #[arg(long, env = "YOLOKIT_FONT")]
    font: Option<PathBuf>,

    /// Output format for the summary.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    output_format: ReportFormat,
}

/// Arguments for the prepare subcommand.
#[derive(clap::Args)]
struct PrepareArgs {
    /// Source folder containing images, labels and classes.txt.
    #[arg(long, default_value = ".")]
    src: PathBuf,

    /// Destination dataset folder.
    #[arg(long, default_value = "dataset")]
    dest: PathBuf,

    /// Validation split fraction.
    #[arg(long, default_value_t = 0.2)]
    val: f64,

    /// Seed for the train/val shuffle.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Output format for the summary.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    output: ReportFormat,
}

/// Run the yolokit CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), YoloKitError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Detect(args) => run_detect(args),
        Commands::Prepare(args) => run_prepare(args),
    }
}

/// Execute the detect subcommand.
fn run_detect(args: DetectArgs) -> Result<(), YoloKitError> {
    let opts = detect::DetectOptions {
        model_path: args.model,
        confidence: args.conf,
        iou_threshold: args.iou,
        input_size: args.imgsz,
        data_yaml: args.data,
        font_path: args.font,
        ..Default::default()
    };

    let source = detect::ImageSource::parse(&args.image);
    let report = detect::detect_and_save(&source, args.output.as_deref(), &opts)?;

    match args.output_format {
        ReportFormat::Json => print_json(&report)?,
        ReportFormat::Text => {
            println!();
            print!("{}", report);
            println!();
        }
    }

    Ok(())
}

/// Execute the prepare subcommand.
fn run_prepare(args: PrepareArgs) -> Result<(), YoloKitError> {
    let opts = prepare::PrepareOptions {
        src: args.src,
        dest: args.dest,
        val_fraction: args.val,
        seed: args.seed,
    };

    let manifest = match prepare::prepare_dataset(&opts) {
        Ok(manifest) => manifest,
        // An empty source is reported, not a failure.
        Err(YoloKitError::EmptySource { path }) => {
            println!("No images found in {}", path.display());
            return Ok(());
        }
        Err(err) => return Err(err),
    };

    match args.output {
        ReportFormat::Json => print_json(&manifest)?,
        ReportFormat::Text => print!("{}", manifest),
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), YoloKitError> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}
