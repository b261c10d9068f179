//! Chunk workers: average one tile at a time, from any image.

use crossbeam_channel::Receiver;
use std::sync::Arc;

use super::average::ChunkProcessor;
use super::channel::{Delivery, ShutdownListener};
use super::job::ChunkJob;

/// Chunk worker loop.
///
/// Results block on their image's private queue while it is full. That
/// queue always has an assembler draining it, since planners only dispatch
/// chunks after an assembler has taken the image.
pub(crate) fn run_chunk_worker(
    jobs: Receiver<ChunkJob>,
    processor: Arc<dyn ChunkProcessor>,
    listener: ShutdownListener,
) {
    let mut processed = 0usize;
    while let Some(job) = listener.next_or_idle(&jobs) {
        let chunk = job.process(processor.as_ref());
        match listener.deliver(&job.results, chunk) {
            Ok(Delivery::Delivered) => processed += 1,
            // Assembler already gave up on this image
            Ok(Delivery::Orphaned) => tracing::trace!("Dropping chunk {}", chunk.region),
            Err(_) => break,
        }
    }
    tracing::trace!("Averaged {processed} chunks");
}
