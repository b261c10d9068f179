//! Error types for the Pixelate pipeline.
//!
//! Errors are organized by stage so a failure names the file and the
//! stage that produced it.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for Pixelate operations.
#[derive(Error, Debug)]
pub enum PixelateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Pipeline errors, organized by stage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The codec could not decode the file contents
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// The codec could not encode an output raster
    #[error("Encode error: {message}")]
    Encode { message: String },

    /// Opening or reading the input failed
    #[error("IO error for {path}: {message}")]
    Io { path: PathBuf, message: String },

    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// File exceeds size limit
    #[error("File too large: {path} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        path: PathBuf,
        size_mb: u64,
        max_mb: u64,
    },

    /// Image dimensions exceed limit
    #[error("Image too large: {path} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        path: PathBuf,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// Decoded image has zero width or height
    #[error("Image has no pixels: {0}")]
    EmptyImage(PathBuf),

    /// Chunk size must be at least one pixel
    #[error("Invalid chunk size: {0} (must be >= 1)")]
    InvalidChunkSize(u32),

    /// Pool sizes and queue capacities must all be at least one
    #[error("Invalid pipeline options: {0}")]
    InvalidOptions(String),

    /// A batch runs once; submit a new one instead
    #[error("Batch has already run")]
    BatchConsumed,

    /// A worker thread panicked mid-batch
    #[error("Worker panicked in {stage} stage")]
    WorkerPanicked { stage: String },

    /// A stage queue closed while work was still outstanding
    #[error("Queue disconnected in {stage} stage")]
    Disconnected { stage: String },

    /// The OS refused to start a worker thread
    #[error("Failed to spawn {stage} worker: {message}")]
    Spawn { stage: String, message: String },
}

impl PipelineError {
    /// Path of the image this error belongs to, if any.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Decode { path, .. }
            | Self::Io { path, .. }
            | Self::FileTooLarge { path, .. }
            | Self::ImageTooLarge { path, .. }
            | Self::FileNotFound(path)
            | Self::EmptyImage(path) => Some(path.as_path()),
            Self::Encode { .. }
            | Self::InvalidChunkSize(_)
            | Self::InvalidOptions(_)
            | Self::BatchConsumed
            | Self::WorkerPanicked { .. }
            | Self::Disconnected { .. }
            | Self::Spawn { .. } => None,
        }
    }
}

/// Convenience type alias for Pixelate results.
pub type Result<T> = std::result::Result<T, PixelateError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_names_path() {
        let err = PipelineError::Decode {
            path: PathBuf::from("/in/a.png"),
            message: "bad header".to_string(),
        };
        assert_eq!(err.to_string(), "Decode error for /in/a.png: bad header");
        assert_eq!(err.path(), Some(std::path::Path::new("/in/a.png")));
    }

    #[test]
    fn test_stage_errors_have_no_path() {
        let err = PipelineError::WorkerPanicked {
            stage: "assemble".to_string(),
        };
        assert!(err.path().is_none());
        assert!(PipelineError::InvalidChunkSize(0).path().is_none());
    }

    #[test]
    fn test_pipeline_error_converts_to_top_level() {
        let err: PixelateError = PipelineError::InvalidChunkSize(0).into();
        assert!(err.to_string().contains("Invalid chunk size: 0"));
    }
}
