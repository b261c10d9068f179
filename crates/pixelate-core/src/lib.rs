//! Pixelate Core - embeddable bulk image pixelation.
//!
//! Each image is tiled into square chunks, every chunk is replaced by its
//! mean color, and the chunks are painted back into a fresh raster. A batch
//! of images flows through a staged pipeline of worker pools connected by
//! bounded queues:
//!
//! ```text
//! paths → Ingest (read, decode, tile) → Chunk workers (average) → Assemblers → outcomes
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use pixelate_core::{Config, Pixelator};
//!
//! fn main() -> pixelate_core::Result<()> {
//!     let pixelator = Pixelator::new(Config::load()?)?;
//!     let paths = pixelator.discover("./photos".as_ref());
//!     let report = pixelator.process_batch(&paths)?.into_ordered();
//!     println!("{} images pixelated", report.stats.succeeded);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod types;

// Re-exports for convenient access
pub use config::{Config, ErrorMode, Topology};
pub use error::{ConfigError, PipelineError, PipelineResult, PixelateError, Result};
pub use output::{OutputFormat, OutputNamer, ReportWriter};
pub use pipeline::{Batch, ChunkProcessor, FileDiscovery, Pipeline, PipelineState, RasterCodec};
pub use types::{BatchReport, BatchStats, ImageOutcome, ImageRecord, PixelatedImage, Raster};

use image::RgbaImage;
use std::path::{Path, PathBuf};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Pixelate processor - the main entry point for batch pixelation.
#[derive(Debug, Clone)]
pub struct Pixelator {
    config: Config,
    pipeline: Pipeline,
}

impl Pixelator {
    /// Create a new Pixelator with the given configuration.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        tracing::debug!("Initializing Pixelate v{}", VERSION);
        let pipeline = Pipeline::new(config.pipeline.clone(), config.limits.clone());
        Ok(Self { config, pipeline })
    }

    /// Create a new Pixelator with the configuration from the default location.
    pub fn with_defaults() -> Result<Self> {
        Self::new(Config::load()?)
    }

    /// Get a reference to the current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Find supported images at `path` (a file or a directory tree).
    pub fn discover(&self, path: &Path) -> Vec<PathBuf> {
        FileDiscovery::new(self.config.processing.clone()).discover(path)
    }

    /// Pixelate a batch, blocking the calling thread until it finishes.
    pub fn process_batch(&self, paths: &[PathBuf]) -> Result<BatchReport> {
        Ok(self.pipeline.run(paths)?)
    }

    /// Like [`process_batch`](Self::process_batch), reporting
    /// `(completed, total)` after each image.
    pub fn process_batch_with_progress<F>(&self, paths: &[PathBuf], on_progress: F) -> Result<BatchReport>
    where
        F: FnMut(usize, usize),
    {
        Ok(self.pipeline.run_with_progress(paths, on_progress)?)
    }

    /// Pixelate a batch from async code.
    ///
    /// The pipeline runs on its own OS threads; this only moves the blocking
    /// wait off the async executor.
    pub async fn process_batch_async<F>(&self, paths: Vec<PathBuf>, on_progress: F) -> Result<BatchReport>
    where
        F: FnMut(usize, usize) + Send + 'static,
    {
        let pipeline = self.pipeline.clone();
        let report = tokio::task::spawn_blocking(move || pipeline.run_with_progress(&paths, on_progress))
            .await
            .map_err(|_| PipelineError::WorkerPanicked {
                stage: "coordinator".to_string(),
            })??;
        Ok(report)
    }
}

/// Pixelate `paths` with square chunks of `chunk_size` pixels under the
/// default pipeline settings.
///
/// Returns the output rasters in input order. Any failed image fails the
/// whole call.
pub fn pixelate(chunk_size: u32, paths: &[PathBuf]) -> Result<Vec<RgbaImage>> {
    let mut config = Config::default();
    config.pipeline.chunk_size = chunk_size;
    let pipeline = Pipeline::new(config.pipeline, config.limits);
    Ok(pipeline.run(paths)?.into_ordered().into_rasters())
}
