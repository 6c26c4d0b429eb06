use std::path::PathBuf;
use thiserror::Error;

/// The main error type for yolokit operations.
#[derive(Debug, Error)]
pub enum YoloKitError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot read image {path}: {message}")]
    ImageRead { path: PathBuf, message: String },

    #[error("Cannot download image from URL {url}: {message}")]
    Download { url: String, message: String },

    #[error("Failed to write image to {path}: {source}")]
    ImageWrite {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to load model {path}: {message}")]
    ModelLoad { path: PathBuf, message: String },

    #[error("Inference failed: {message}")]
    Inference { message: String },

    #[error("Invalid detection parameters: {message}")]
    InvalidDetectParams { message: String },

    #[error("Failed to load font {path}: {message}")]
    FontLoad { path: PathBuf, message: String },

    #[error("Source directory not found: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("No images found in {path}")]
    EmptySource { path: PathBuf },

    #[error("Invalid split parameters: {message}")]
    InvalidSplit { message: String },

    #[error("Failed to write manifest {path}: {source}")]
    ManifestWrite {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to serialize report: {0}")]
    ReportSerialize(#[from] serde_json::Error),

    #[error("Failed to parse manifest {path}: {source}")]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
