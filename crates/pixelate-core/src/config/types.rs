//! Sub-configuration structs and their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How the logical stages map onto physical worker pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// Ingestion workers plan and average their own chunks; two pools.
    Fused,
    /// Ingest+plan, chunk processors, assemblers; three pools.
    #[default]
    Standard,
    /// Loaders, planners, chunk processors, assemblers; four pools.
    Split,
}

impl Topology {
    /// Parse a topology name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "fused" => Some(Self::Fused),
            "standard" => Some(Self::Standard),
            "split" => Some(Self::Split),
            _ => None,
        }
    }
}

impl std::fmt::Display for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Topology::Fused => write!(f, "fused"),
            Topology::Standard => write!(f, "standard"),
            Topology::Split => write!(f, "split"),
        }
    }
}

/// What a failed image does to the rest of the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorMode {
    /// The first failure aborts the batch and is returned as the error.
    #[default]
    FailFast,
    /// Failures are reported per image and the batch keeps going.
    Recoverable,
}

/// Pipeline settings: chunk size, topology, pool sizes and queue capacities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Side length of the square averaging block, in pixels
    pub chunk_size: u32,

    /// Stage-to-pool layout
    pub topology: Topology,

    /// Failure policy for the batch
    pub error_mode: ErrorMode,

    /// Workers that read and decode input files
    pub ingest_workers: usize,

    /// Workers that tile decoded rasters (split topology only)
    pub planner_workers: usize,

    /// Workers that average chunks
    pub chunk_workers: usize,

    /// Workers that reassemble output rasters
    pub assembly_workers: usize,

    /// Max decoded images buffered between loaders and planners (split
    /// topology only)
    pub image_queue_capacity: usize,

    /// Max chunk jobs buffered ahead of the chunk workers
    pub chunk_queue_capacity: usize,

    /// Max averaged chunks buffered per image ahead of its assembler
    pub result_queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 10,
            topology: Topology::default(),
            error_mode: ErrorMode::default(),
            ingest_workers: 4,
            planner_workers: 2,
            chunk_workers: default_chunk_workers(),
            assembly_workers: 4,
            image_queue_capacity: 16,
            chunk_queue_capacity: 4096,
            result_queue_capacity: 64,
        }
    }
}

/// One chunk worker per available core, falling back to 4.
fn default_chunk_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum file size in megabytes
    pub max_file_size_mb: u64,

    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 100,
            max_image_dimension: 10000,
        }
    }
}

/// Input discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Supported input extensions
    pub supported_formats: Vec<String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            supported_formats: ["jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory pixelated images are written to
    pub dir: PathBuf,

    /// Appended to the input file stem, e.g. `face_pixelated.png`
    pub suffix: String,

    /// Batch report format ("json" or "jsonl")
    pub report_format: String,

    /// Pretty-print JSON reports
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./pixelated"),
            suffix: "_pixelated".to_string(),
            report_format: "json".to_string(),
            pretty: false,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
