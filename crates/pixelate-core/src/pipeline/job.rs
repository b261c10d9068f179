//! Messages that flow between the pipeline stages.

use crossbeam_channel::{Receiver, Sender};
use image::Rgba;
use std::path::PathBuf;
use std::sync::Arc;

use super::average::ChunkProcessor;
use super::channel::bounded_queue;
use super::grid::{ChunkGrid, Region};
use crate::error::PipelineError;
use crate::types::Raster;

/// A decoded image waiting to be tiled (split topology).
#[derive(Debug)]
pub struct DecodedImage {
    pub index: usize,
    pub path: PathBuf,
    pub raster: Arc<Raster>,
}

/// One tile of one image, waiting for a chunk worker.
#[derive(Debug)]
pub struct ChunkJob {
    pub raster: Arc<Raster>,
    pub region: Region,
    pub results: Sender<ProcessedChunk>,
}

impl ChunkJob {
    /// Average the tile.
    pub fn process(&self, processor: &dyn ChunkProcessor) -> ProcessedChunk {
        ProcessedChunk {
            region: self.region,
            color: processor.process(&self.raster, self.region),
        }
    }
}

/// A tile reduced to its single color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessedChunk {
    pub region: Region,
    pub color: Rgba<u8>,
}

/// An image in flight, as seen by the assembler.
///
/// `n_chunks` is fixed when the job is created; exactly that many
/// [`ProcessedChunk`]s will arrive on `results`.
#[derive(Debug)]
pub struct ImageJob {
    pub index: usize,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub n_chunks: usize,
    pub results: Receiver<ProcessedChunk>,
}

impl ImageJob {
    /// Create the job for `grid` together with the sending half of its
    /// private result queue.
    ///
    /// The queue holds at most `capacity` chunks (never more than the image
    /// has). Senders block while it is full, which is safe only once an
    /// assembler has taken the job.
    pub fn new(
        index: usize,
        path: PathBuf,
        grid: &ChunkGrid,
        capacity: usize,
    ) -> (Self, Sender<ProcessedChunk>) {
        let n_chunks = grid.len();
        let (tx, rx) = bounded_queue(capacity.min(n_chunks).max(1));
        let job = Self {
            index,
            path,
            width: grid.width(),
            height: grid.height(),
            n_chunks,
            results: rx,
        };
        (job, tx)
    }
}

/// Sent to the coordinator, which counts them against the batch size.
#[derive(Debug)]
pub enum Signal {
    /// One image is finished (pixelated, or failed in recoverable mode)
    Completed,
    /// The batch cannot finish
    Fatal(PipelineError),
}
