//! Assemblers: paint each image's averaged chunks into a fresh raster.

use crossbeam_channel::Receiver;
use image::RgbaImage;

use super::channel::{Next, ShutdownListener};
use super::job::{ImageJob, ProcessedChunk};
use super::worker::Sinks;
use crate::error::PipelineError;
use crate::types::{ImageOutcome, PixelatedImage};

/// How assembling one image ended.
#[derive(Debug)]
pub enum Assembly {
    /// All `n_chunks` arrived and were painted
    Complete(PixelatedImage),
    /// Shutdown arrived first
    Shutdown,
    /// The private queue closed after `received` chunks
    Disconnected { received: usize },
}

/// Fill `chunk.region` of `out` with `chunk.color`.
pub fn paint(out: &mut RgbaImage, chunk: &ProcessedChunk) {
    let region = chunk.region;
    for y in region.start_y..region.end_y {
        for x in region.start_x..region.end_x {
            out.put_pixel(x, y, chunk.color);
        }
    }
}

/// Receive exactly `job.n_chunks` chunks and paint them.
///
/// Anything beyond `n_chunks` is left in the queue. Chunks cover disjoint
/// regions, so arrival order does not matter.
pub fn assemble(job: &ImageJob, listener: &ShutdownListener) -> Assembly {
    let mut out = RgbaImage::new(job.width, job.height);
    let mut received = 0;

    while received < job.n_chunks {
        match listener.next(&job.results) {
            Next::Job(chunk) => {
                paint(&mut out, &chunk);
                received += 1;
            }
            Next::Closed => return Assembly::Disconnected { received },
            Next::Shutdown => return Assembly::Shutdown,
        }
    }

    Assembly::Complete(PixelatedImage {
        index: job.index,
        path: job.path.clone(),
        raster: out,
        chunks: received,
    })
}

/// Assembler loop: take registered images one at a time and finish them.
pub(crate) fn run_assembler(
    registrations: Receiver<ImageJob>,
    listener: ShutdownListener,
    sinks: Sinks,
) {
    while let Some(job) = listener.next_or_idle(&registrations) {
        match assemble(&job, &listener) {
            Assembly::Complete(image) => {
                tracing::debug!("Assembled {:?} from {} chunks", image.path, image.chunks);
                sinks.completed(ImageOutcome::Pixelated(image));
            }
            Assembly::Shutdown => break,
            Assembly::Disconnected { received } => {
                tracing::error!(
                    "Chunk queue for {:?} closed after {received} of {} chunks",
                    job.path,
                    job.n_chunks
                );
                sinks.fatal(PipelineError::Disconnected {
                    stage: "assemble".to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::channel::shutdown_channel;
    use crate::pipeline::grid::{ChunkGrid, Region};
    use image::Rgba;
    use std::path::PathBuf;

    fn color_for(region: Region) -> Rgba<u8> {
        Rgba([region.start_x as u8, region.start_y as u8, 7, 255])
    }

    #[test]
    fn test_paint_fills_region_only() {
        let mut out = RgbaImage::new(4, 4);
        paint(
            &mut out,
            &ProcessedChunk {
                region: Region::new(1, 1, 3, 2),
                color: Rgba([9, 9, 9, 9]),
            },
        );
        assert_eq!(*out.get_pixel(1, 1), Rgba([9, 9, 9, 9]));
        assert_eq!(*out.get_pixel(2, 1), Rgba([9, 9, 9, 9]));
        assert_eq!(*out.get_pixel(3, 1), Rgba([0, 0, 0, 0]));
        assert_eq!(*out.get_pixel(1, 2), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_assemble_consumes_exactly_n_chunks() {
        let (_broadcaster, listener) = shutdown_channel(1);
        let grid = ChunkGrid::new(25, 12, 10).unwrap();
        let (job, tx) = ImageJob::new(4, PathBuf::from("in.png"), &grid, grid.len());

        // Deliver in reverse order
        for region in grid.plan().into_iter().rev() {
            tx.send(ProcessedChunk {
                region,
                color: color_for(region),
            })
            .unwrap();
        }

        let Assembly::Complete(image) = assemble(&job, &listener) else {
            panic!("assembly did not complete");
        };
        assert_eq!(image.index, 4);
        assert_eq!(image.chunks, 6);
        assert_eq!(image.raster.dimensions(), (25, 12));
        for region in grid.regions() {
            for y in region.start_y..region.end_y {
                for x in region.start_x..region.end_x {
                    assert_eq!(*image.raster.get_pixel(x, y), color_for(region));
                }
            }
        }
    }

    #[test]
    fn test_assemble_drains_single_slot_queue_while_producer_blocks() {
        let (_broadcaster, listener) = shutdown_channel(1);
        let grid = ChunkGrid::new(9, 7, 2).unwrap();
        let (job, tx) = ImageJob::new(1, PathBuf::from("in.png"), &grid, 1);

        let producer = std::thread::spawn(move || {
            for region in grid.regions() {
                tx.send(ProcessedChunk {
                    region,
                    color: color_for(region),
                })
                .unwrap();
            }
        });

        let Assembly::Complete(image) = assemble(&job, &listener) else {
            panic!("assembly did not complete");
        };
        producer.join().unwrap();
        assert_eq!(image.chunks, grid.len());
        assert_eq!(*image.raster.get_pixel(8, 6), color_for(Region::new(8, 6, 9, 7)));
    }

    #[test]
    fn test_assemble_leaves_extra_chunk_unconsumed() {
        let (_broadcaster, listener) = shutdown_channel(1);
        let grid = ChunkGrid::new(4, 4, 2).unwrap();
        let (tx, rx) = crate::pipeline::channel::bounded_queue(grid.len() + 1);
        let job = ImageJob {
            index: 0,
            path: PathBuf::from("in.png"),
            width: 4,
            height: 4,
            n_chunks: grid.len(),
            results: rx,
        };
        for region in grid.regions() {
            tx.send(ProcessedChunk {
                region,
                color: Rgba([1, 1, 1, 1]),
            })
            .unwrap();
        }
        tx.send(ProcessedChunk {
            region: Region::new(0, 0, 1, 1),
            color: Rgba([2, 2, 2, 2]),
        })
        .unwrap();

        assert!(matches!(assemble(&job, &listener), Assembly::Complete(_)));
        assert_eq!(job.results.len(), 1);
    }

    #[test]
    fn test_assemble_reports_early_close() {
        let (_broadcaster, listener) = shutdown_channel(1);
        let grid = ChunkGrid::new(4, 4, 2).unwrap();
        let (job, tx) = ImageJob::new(0, PathBuf::from("in.png"), &grid, 1);
        tx.send(ProcessedChunk {
            region: Region::new(0, 0, 2, 2),
            color: Rgba([1, 1, 1, 1]),
        })
        .unwrap();
        drop(tx);

        assert!(matches!(
            assemble(&job, &listener),
            Assembly::Disconnected { received: 1 }
        ));
    }

    #[test]
    fn test_assemble_stops_on_shutdown() {
        let (broadcaster, listener) = shutdown_channel(1);
        let grid = ChunkGrid::new(4, 4, 2).unwrap();
        let (job, _tx) = ImageJob::new(0, PathBuf::from("in.png"), &grid, 1);
        broadcaster.broadcast();
        assert!(matches!(assemble(&job, &listener), Assembly::Shutdown));
    }
}
