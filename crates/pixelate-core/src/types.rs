//! Core data types for the Pixelate pipeline.
//!
//! These types describe what comes out of a batch: one outcome per input
//! image plus aggregate statistics.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

/// Decoded 8-bit RGBA pixels. Never mutated once decoded.
pub type Raster = RgbaImage;

/// A successfully pixelated image.
#[derive(Debug, Clone)]
pub struct PixelatedImage {
    /// Position of the input in the submitted batch
    pub index: usize,

    /// Source file
    pub path: PathBuf,

    /// The block-averaged output, same dimensions as the source
    pub raster: RgbaImage,

    /// Number of chunks painted into `raster`
    pub chunks: usize,
}

/// The per-image result of a batch.
#[derive(Debug, Clone)]
pub enum ImageOutcome {
    Pixelated(PixelatedImage),
    Failed {
        index: usize,
        path: PathBuf,
        error: PipelineError,
    },
}

impl ImageOutcome {
    pub fn index(&self) -> usize {
        match self {
            Self::Pixelated(image) => image.index,
            Self::Failed { index, .. } => *index,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Pixelated(image) => &image.path,
            Self::Failed { path, .. } => path,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Pixelated(_))
    }
}

/// Processing statistics for a batch run.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct BatchStats {
    /// Images submitted
    pub images: usize,

    /// Images pixelated successfully
    pub succeeded: usize,

    /// Images that failed (recoverable mode only)
    pub failed: usize,

    /// Chunks averaged across all successful images
    pub chunks: usize,

    /// Wall-clock time from submission to the last worker exiting
    pub elapsed_ms: u64,

    /// Processing rate in images per second
    pub images_per_second: f64,
}

/// Everything a finished batch produced.
///
/// Outcomes arrive in completion order, not submission order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub outcomes: Vec<ImageOutcome>,
    pub stats: BatchStats,
}

impl BatchReport {
    /// Sort outcomes back into submission order.
    pub fn into_ordered(mut self) -> Self {
        self.outcomes.sort_by_key(ImageOutcome::index);
        self
    }

    /// Successful images, in the current outcome order.
    pub fn pixelated(&self) -> impl Iterator<Item = &PixelatedImage> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            ImageOutcome::Pixelated(image) => Some(image),
            ImageOutcome::Failed { .. } => None,
        })
    }

    /// Failed images with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&Path, &PipelineError)> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            ImageOutcome::Failed { path, error, .. } => Some((path.as_path(), error)),
            ImageOutcome::Pixelated(_) => None,
        })
    }

    /// Drop everything but the output rasters.
    pub fn into_rasters(self) -> Vec<RgbaImage> {
        self.outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                ImageOutcome::Pixelated(image) => Some(image.raster),
                ImageOutcome::Failed { .. } => None,
            })
            .collect()
    }
}

/// Per-image line of a batch report file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageRecord {
    pub index: usize,
    pub input: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    pub status: RecordStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Ok,
    Failed,
}

impl ImageRecord {
    /// Build a record, naming where the output raster was written (if it was).
    pub fn from_outcome(outcome: &ImageOutcome, output: Option<PathBuf>) -> Self {
        match outcome {
            ImageOutcome::Pixelated(image) => Self {
                index: image.index,
                input: image.path.clone(),
                output,
                status: RecordStatus::Ok,
                width: Some(image.raster.width()),
                height: Some(image.raster.height()),
                chunks: Some(image.chunks),
                error: None,
            },
            ImageOutcome::Failed { index, path, error } => Self {
                index: *index,
                input: path.clone(),
                output: None,
                status: RecordStatus::Failed,
                width: None,
                height: None,
                chunks: None,
                error: Some(error.to_string()),
            },
        }
    }
}
