//! Image ingestion: read and decode a file, tile it, register it with the
//! assemblers, and hand its chunks on.

use crossbeam_channel::{Receiver, Sender};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::average::ChunkProcessor;
use super::channel::{ShutdownListener, Stopped};
use super::decode::RasterCodec;
use super::grid::ChunkGrid;
use super::job::{ChunkJob, DecodedImage, ImageJob};
use super::validate::Validator;
use super::worker::Sinks;
use crate::error::{PipelineError, PipelineResult};
use crate::types::Raster;

/// Reads, validates and decodes one input file.
pub(crate) struct Ingestor {
    codec: Arc<dyn RasterCodec>,
    validator: Validator,
}

impl Ingestor {
    pub fn new(codec: Arc<dyn RasterCodec>, validator: Validator) -> Self {
        Self { codec, validator }
    }

    pub fn load(&self, path: &Path) -> PipelineResult<Arc<Raster>> {
        self.validator.validate(path)?;

        let bytes = std::fs::read(path).map_err(|e| PipelineError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let raster = self.codec.decode(&bytes, path)?;
        self.validator
            .check_dimensions(path, raster.width(), raster.height())?;

        tracing::debug!(
            "Decoded {:?} ({}x{})",
            path,
            raster.width(),
            raster.height()
        );
        Ok(Arc::new(raster))
    }
}

/// Where a planner's chunks go.
#[derive(Clone)]
pub(crate) enum ChunkTarget {
    /// Onto the shared chunk queue for the chunk workers
    Queue(Sender<ChunkJob>),
    /// Averaged on the spot (fused topology)
    Inline(Arc<dyn ChunkProcessor>),
}

/// Tiles decoded images and dispatches their chunks.
#[derive(Clone)]
pub(crate) struct Planner {
    pub chunk_size: u32,
    pub result_capacity: usize,
    pub registrations: Sender<ImageJob>,
    pub target: ChunkTarget,
}

impl Planner {
    /// Register `image` with the assemblers, then dispatch every chunk.
    ///
    /// Registration happens first. The registration queue is a rendezvous,
    /// so by the time any chunk is produced an assembler holds the job and
    /// is draining its private queue.
    pub fn dispatch(
        &self,
        image: DecodedImage,
        listener: &ShutdownListener,
        sinks: &Sinks,
    ) -> Result<(), Stopped> {
        let DecodedImage {
            index,
            path,
            raster,
        } = image;

        let grid = match ChunkGrid::new(raster.width(), raster.height(), self.chunk_size) {
            Ok(grid) => grid,
            Err(e) => {
                sinks.failed(index, path, e);
                return Ok(());
            }
        };

        let (job, results) = ImageJob::new(index, path, &grid, self.result_capacity);
        tracing::trace!("Registering image {index} with {} chunks", job.n_chunks);
        listener.send(&self.registrations, job)?;

        match &self.target {
            ChunkTarget::Queue(chunks) => {
                for region in grid.regions() {
                    let job = ChunkJob {
                        raster: Arc::clone(&raster),
                        region,
                        results: results.clone(),
                    };
                    listener.send(chunks, job)?;
                }
            }
            ChunkTarget::Inline(processor) => {
                for region in grid.regions() {
                    let job = ChunkJob {
                        raster: Arc::clone(&raster),
                        region,
                        results: results.clone(),
                    };
                    listener.send(&job.results, job.process(processor.as_ref()))?;
                }
            }
        }
        Ok(())
    }
}

/// What a loader does with a decoded image.
#[derive(Clone)]
pub(crate) enum Handoff {
    /// Pass it to the planner pool (split topology)
    Forward(Sender<DecodedImage>),
    /// Plan it on the loader's own thread
    Plan(Planner),
}

/// Loader loop: pull paths, decode, hand off.
pub(crate) fn run_loader(
    paths: Receiver<(usize, PathBuf)>,
    ingestor: Arc<Ingestor>,
    handoff: Handoff,
    listener: ShutdownListener,
    sinks: Sinks,
) {
    while let Some((index, path)) = listener.next_or_idle(&paths) {
        let raster = match ingestor.load(&path) {
            Ok(raster) => raster,
            Err(e) => {
                sinks.failed(index, path, e);
                continue;
            }
        };

        let image = DecodedImage {
            index,
            path,
            raster,
        };
        let handed_off = match &handoff {
            Handoff::Forward(decoded) => listener.send(decoded, image),
            Handoff::Plan(planner) => planner.dispatch(image, &listener, &sinks),
        };
        if handed_off.is_err() {
            break;
        }
    }
}

/// Planner loop (split topology): pull decoded images, tile, dispatch.
pub(crate) fn run_planner(
    decoded: Receiver<DecodedImage>,
    planner: Planner,
    listener: ShutdownListener,
    sinks: Sinks,
) {
    while let Some(image) = listener.next_or_idle(&decoded) {
        if planner.dispatch(image, &listener, &sinks).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ErrorMode, LimitsConfig};
    use crate::pipeline::average::MeanColor;
    use crate::pipeline::channel::{bounded_queue, shutdown_channel};
    use crate::pipeline::decode::ImageCodec;
    use crate::pipeline::job::Signal;
    use image::{Rgba, RgbaImage};

    fn ingestor() -> Ingestor {
        Ingestor::new(Arc::new(ImageCodec), Validator::new(LimitsConfig::default()))
    }

    fn test_sinks(
        mode: ErrorMode,
    ) -> (
        Sinks,
        Receiver<crate::types::ImageOutcome>,
        Receiver<Signal>,
    ) {
        let (outcomes, outcome_rx) = bounded_queue(8);
        let (signals, signal_rx) = bounded_queue(8);
        let sinks = Sinks {
            outcomes,
            signals,
            error_mode: mode,
        };
        (sinks, outcome_rx, signal_rx)
    }

    fn decoded(width: u32, height: u32) -> DecodedImage {
        DecodedImage {
            index: 0,
            path: PathBuf::from("img.png"),
            raster: Arc::new(RgbaImage::from_pixel(width, height, Rgba([4, 4, 4, 255]))),
        }
    }

    #[test]
    fn test_load_png_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.png");
        RgbaImage::from_pixel(6, 4, Rgba([1, 2, 3, 255]))
            .save(&path)
            .unwrap();

        let raster = ingestor().load(&path).unwrap();
        assert_eq!(raster.dimensions(), (6, 4));
        assert_eq!(*raster.get_pixel(5, 3), Rgba([1, 2, 3, 255]));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ingestor().load(Path::new("/nope/in.png")).unwrap_err();
        assert!(matches!(err, PipelineError::FileNotFound(_)));
    }

    #[test]
    fn test_load_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.png");
        // Valid signature, garbage after it
        std::fs::write(&path, [0x89, b'P', b'N', b'G', 0, 1, 2, 3, 4, 5, 6, 7]).unwrap();

        let err = ingestor().load(&path).unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
        assert_eq!(err.path(), Some(path.as_path()));
    }

    #[test]
    fn test_dispatch_registers_before_chunks() {
        let (_broadcaster, listener) = shutdown_channel(1);
        let (sinks, _outcomes, _signals) = test_sinks(ErrorMode::FailFast);
        let (reg_tx, reg_rx) = bounded_queue(1);
        let (chunk_tx, chunk_rx) = bounded_queue(16);
        let planner = Planner {
            chunk_size: 10,
            result_capacity: 16,
            registrations: reg_tx,
            target: ChunkTarget::Queue(chunk_tx),
        };

        planner.dispatch(decoded(25, 12), &listener, &sinks).unwrap();

        let job = reg_rx.try_recv().unwrap();
        assert_eq!(job.n_chunks, 6);
        let regions: Vec<_> = chunk_rx.try_iter().map(|c| c.region).collect();
        assert_eq!(regions, ChunkGrid::new(25, 12, 10).unwrap().plan());
    }

    #[test]
    fn test_dispatch_inline_fills_private_queue() {
        let (_broadcaster, listener) = shutdown_channel(1);
        let (sinks, _outcomes, _signals) = test_sinks(ErrorMode::FailFast);
        let (reg_tx, reg_rx) = bounded_queue(1);
        let planner = Planner {
            chunk_size: 3,
            result_capacity: 16,
            registrations: reg_tx,
            target: ChunkTarget::Inline(Arc::new(MeanColor)),
        };

        planner.dispatch(decoded(7, 5), &listener, &sinks).unwrap();

        let job = reg_rx.try_recv().unwrap();
        assert_eq!(job.n_chunks, 6);
        assert_eq!(job.results.len(), 6);
        assert!(job
            .results
            .try_iter()
            .all(|c| c.color == Rgba([4, 4, 4, 255])));
    }

    #[test]
    fn test_dispatch_inline_waits_for_assembler_with_single_slot_queue() {
        let (_broadcaster, listener) = shutdown_channel(1);
        let (sinks, _outcomes, _signals) = test_sinks(ErrorMode::FailFast);
        let (reg_tx, reg_rx) = bounded_queue::<ImageJob>(0);
        let planner = Planner {
            chunk_size: 2,
            result_capacity: 1,
            registrations: reg_tx,
            target: ChunkTarget::Inline(Arc::new(MeanColor)),
        };

        let assembler = std::thread::spawn(move || {
            let job = reg_rx.recv().unwrap();
            (0..job.n_chunks)
                .map(|_| job.results.recv().unwrap())
                .collect::<Vec<_>>()
        });

        planner.dispatch(decoded(7, 5), &listener, &sinks).unwrap();
        let chunks = assembler.join().unwrap();
        assert_eq!(chunks.len(), 12);
        assert!(chunks.iter().all(|c| c.color == Rgba([4, 4, 4, 255])));
    }

    #[test]
    fn test_dispatch_stops_on_shutdown_when_registration_full() {
        let (broadcaster, listener) = shutdown_channel(1);
        let (sinks, _outcomes, _signals) = test_sinks(ErrorMode::FailFast);
        let (reg_tx, _reg_rx) = bounded_queue(1);
        let (chunk_tx, _chunk_rx) = bounded_queue(16);
        let planner = Planner {
            chunk_size: 10,
            result_capacity: 16,
            registrations: reg_tx,
            target: ChunkTarget::Queue(chunk_tx),
        };

        planner.dispatch(decoded(5, 5), &listener, &sinks).unwrap();
        broadcaster.broadcast();
        assert_eq!(
            planner.dispatch(decoded(5, 5), &listener, &sinks),
            Err(Stopped)
        );
    }

    #[test]
    fn test_loader_reports_failures_and_exits_on_shutdown() {
        let (broadcaster, listener) = shutdown_channel(1);
        let (sinks, outcome_rx, signal_rx) = test_sinks(ErrorMode::Recoverable);
        let (path_tx, path_rx) = bounded_queue(1);
        let (decoded_tx, _decoded_rx) = bounded_queue(1);
        path_tx.send((0, PathBuf::from("/missing.png"))).unwrap();
        drop(path_tx);

        let handle = std::thread::spawn(move || {
            run_loader(
                path_rx,
                Arc::new(ingestor()),
                Handoff::Forward(decoded_tx),
                listener,
                sinks,
            )
        });

        assert!(matches!(signal_rx.recv().unwrap(), Signal::Completed));
        broadcaster.broadcast();
        handle.join().unwrap();

        let outcome = outcome_rx.try_recv().unwrap();
        assert!(!outcome.is_success());
        assert_eq!(outcome.path(), Path::new("/missing.png"));
    }
}
