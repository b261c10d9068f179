//! The coordinator: wires the stage pools for a batch, counts completions,
//! then shuts every worker down and collects the outcomes.

use crossbeam_channel::Receiver;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::assemble::run_assembler;
use super::average::{ChunkProcessor, MeanColor};
use super::channel::{bounded_queue, shutdown_channel, ShutdownListener};
use super::decode::{ImageCodec, RasterCodec};
use super::ingest::{run_loader, run_planner, ChunkTarget, Handoff, Ingestor, Planner};
use super::job::{ChunkJob, ImageJob, Signal};
use super::process::run_chunk_worker;
use super::validate::Validator;
use super::worker::{Sinks, Stage, WorkerSet};
use crate::config::{LimitsConfig, PipelineConfig, Topology};
use crate::error::{PipelineError, PipelineResult};
use crate::types::{BatchReport, BatchStats, ImageOutcome};

/// Lifecycle of a batch. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Created, not yet run
    Idle,
    /// Workers are up and images are in flight
    Running,
    /// Shutdown has been broadcast; waiting for workers to exit
    Draining,
    /// Every worker has exited
    Stopped,
}

/// Number of workers in each pool for a topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSizes {
    pub ingest: usize,
    pub planner: usize,
    pub chunk: usize,
    pub assembly: usize,
}

impl PoolSizes {
    pub fn for_config(config: &PipelineConfig) -> Self {
        let (planner, chunk) = match config.topology {
            Topology::Fused => (0, 0),
            Topology::Standard => (0, config.chunk_workers),
            Topology::Split => (config.planner_workers, config.chunk_workers),
        };
        Self {
            ingest: config.ingest_workers,
            planner,
            chunk,
            assembly: config.assembly_workers,
        }
    }

    pub fn total(&self) -> usize {
        self.ingest + self.planner + self.chunk + self.assembly
    }
}

/// A configured pixelation pipeline.
///
/// A `Pipeline` holds no threads of its own. Each batch gets fresh queues
/// and fresh worker pools, which are torn down before the batch returns.
#[derive(Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    validator: Validator,
    codec: Arc<dyn RasterCodec>,
    processor: Arc<dyn ChunkProcessor>,
}

impl Pipeline {
    /// Create a pipeline that decodes with [`ImageCodec`] and averages with
    /// [`MeanColor`].
    pub fn new(config: PipelineConfig, limits: LimitsConfig) -> Self {
        Self {
            config,
            validator: Validator::new(limits),
            codec: Arc::new(ImageCodec),
            processor: Arc::new(MeanColor),
        }
    }

    /// Replace the codec used to decode inputs.
    pub fn with_codec<C: RasterCodec + 'static>(mut self, codec: C) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    /// Replace the per-chunk reduction.
    pub fn with_processor<P: ChunkProcessor + 'static>(mut self, processor: P) -> Self {
        self.processor = Arc::new(processor);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The codec inputs are decoded with, also used to encode outputs.
    pub fn codec(&self) -> &dyn RasterCodec {
        self.codec.as_ref()
    }

    /// Prepare a batch without running it.
    pub fn batch(&self, paths: Vec<PathBuf>) -> Batch {
        Batch {
            pipeline: self.clone(),
            paths,
            state: PipelineState::Idle,
        }
    }

    /// Pixelate every image in `paths`.
    ///
    /// Outcomes are in completion order; see [`BatchReport::into_ordered`].
    pub fn run(&self, paths: &[PathBuf]) -> PipelineResult<BatchReport> {
        self.batch(paths.to_vec()).run(|_, _| {})
    }

    /// Like [`run`](Self::run), calling `on_progress(completed, total)`
    /// after each image finishes.
    pub fn run_with_progress<F>(&self, paths: &[PathBuf], on_progress: F) -> PipelineResult<BatchReport>
    where
        F: FnMut(usize, usize),
    {
        self.batch(paths.to_vec()).run(on_progress)
    }

    /// Check chunk size, the pool sizes the topology uses, and the queue
    /// capacities. See [`PipelineConfig::validate`].
    pub fn validate_options(&self) -> PipelineResult<()> {
        self.config.validate()
    }

    /// Start every pool for one batch. Downstream pools start first.
    fn spawn_workers(
        &self,
        sizes: PoolSizes,
        paths: Receiver<(usize, PathBuf)>,
        listener: &ShutdownListener,
        sinks: &Sinks,
        workers: &mut WorkerSet,
    ) -> PipelineResult<()> {
        let config = &self.config;
        // Rendezvous: a planner only moves on once an assembler holds the
        // image, so every private result queue has a consumer.
        let (registrations, registered) = bounded_queue::<ImageJob>(0);

        let target = if config.topology == Topology::Fused {
            ChunkTarget::Inline(Arc::clone(&self.processor))
        } else {
            let (chunk_tx, chunk_rx) = bounded_queue::<ChunkJob>(config.chunk_queue_capacity);
            for i in 0..sizes.chunk {
                let jobs = chunk_rx.clone();
                let processor = Arc::clone(&self.processor);
                let listener = listener.clone();
                workers.spawn(Stage::Chunk, i, sinks.signals.clone(), move || {
                    run_chunk_worker(jobs, processor, listener)
                })?;
            }
            ChunkTarget::Queue(chunk_tx)
        };

        let planner = Planner {
            chunk_size: config.chunk_size,
            result_capacity: config.result_queue_capacity,
            registrations,
            target,
        };

        for i in 0..sizes.assembly {
            let registered = registered.clone();
            let listener = listener.clone();
            let sinks = sinks.clone();
            workers.spawn(Stage::Assemble, i, sinks.signals.clone(), move || {
                run_assembler(registered, listener, sinks)
            })?;
        }

        let (load_stage, handoff) = if config.topology == Topology::Split {
            let (decoded_tx, decoded_rx) = bounded_queue(config.image_queue_capacity);
            for i in 0..sizes.planner {
                let decoded = decoded_rx.clone();
                let planner = planner.clone();
                let listener = listener.clone();
                let sinks = sinks.clone();
                workers.spawn(Stage::Plan, i, sinks.signals.clone(), move || {
                    run_planner(decoded, planner, listener, sinks)
                })?;
            }
            (Stage::Load, Handoff::Forward(decoded_tx))
        } else {
            (Stage::Ingest, Handoff::Plan(planner))
        };

        let ingestor = Arc::new(Ingestor::new(
            Arc::clone(&self.codec),
            self.validator.clone(),
        ));
        for i in 0..sizes.ingest {
            let paths = paths.clone();
            let ingestor = Arc::clone(&ingestor);
            let handoff = handoff.clone();
            let listener = listener.clone();
            let sinks = sinks.clone();
            workers.spawn(load_stage, i, sinks.signals.clone(), move || {
                run_loader(paths, ingestor, handoff, listener, sinks)
            })?;
        }

        Ok(())
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// One submitted set of images. Runs at most once.
pub struct Batch {
    pipeline: Pipeline,
    paths: Vec<PathBuf>,
    state: PipelineState,
}

impl Batch {
    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Run the batch to completion.
    ///
    /// Returns once every image has finished and every worker has exited.
    /// In fail-fast mode the first image error aborts the batch and is
    /// returned; in-flight work is abandoned.
    pub fn run<F>(&mut self, mut on_progress: F) -> PipelineResult<BatchReport>
    where
        F: FnMut(usize, usize),
    {
        if self.state != PipelineState::Idle {
            return Err(PipelineError::BatchConsumed);
        }

        let pipeline = self.pipeline.clone();
        let paths = std::mem::take(&mut self.paths);
        let total = paths.len();
        let start = Instant::now();

        if let Err(e) = pipeline.validate_options() {
            self.transition(PipelineState::Stopped);
            return Err(e);
        }

        self.transition(PipelineState::Running);
        let result = self.execute(&pipeline, paths, &mut on_progress);
        self.transition(PipelineState::Stopped);

        let outcomes = result?;
        let stats = summarize(&outcomes, total, start.elapsed());
        tracing::info!(
            "Batch complete: {} succeeded, {} failed in {:.2}s ({:.1} img/sec)",
            stats.succeeded,
            stats.failed,
            stats.elapsed_ms as f64 / 1000.0,
            stats.images_per_second
        );
        Ok(BatchReport { outcomes, stats })
    }

    fn execute(
        &mut self,
        pipeline: &Pipeline,
        paths: Vec<PathBuf>,
        on_progress: &mut dyn FnMut(usize, usize),
    ) -> PipelineResult<Vec<ImageOutcome>> {
        let total = paths.len();
        if total == 0 {
            self.transition(PipelineState::Draining);
            return Ok(Vec::new());
        }

        let sizes = PoolSizes::for_config(&pipeline.config);
        let (broadcaster, listener) = shutdown_channel(sizes.total());

        let (path_tx, path_rx) = bounded_queue(total);
        for entry in paths.into_iter().enumerate() {
            // Sized to the batch, never blocks
            let _ = path_tx.send(entry);
        }
        drop(path_tx);

        let (outcome_tx, outcome_rx) = bounded_queue(total);
        let (signal_tx, signal_rx) = bounded_queue(total + sizes.total());
        let sinks = Sinks {
            outcomes: outcome_tx,
            signals: signal_tx,
            error_mode: pipeline.config.error_mode,
        };

        let mut workers = WorkerSet::default();
        let spawned = pipeline.spawn_workers(sizes, path_rx, &listener, &sinks, &mut workers);
        // Workers now hold the only senders; losing them all ends the wait.
        drop(sinks);
        drop(listener);

        tracing::info!(
            "Pixelating {total} images ({} topology, {} workers, chunk size {})",
            pipeline.config.topology,
            workers.len(),
            pipeline.config.chunk_size
        );

        let fatal = match spawned {
            Ok(()) => await_completion(&signal_rx, total, on_progress),
            Err(e) => Some(e),
        };

        self.transition(PipelineState::Draining);
        let released = broadcaster.broadcast();
        tracing::debug!("Broadcast {released} shutdown tokens");
        let panics = workers.join_all();

        // A panic is the root cause of any disconnect it left behind.
        if let Some(error) = panics.into_iter().next().or(fatal) {
            tracing::error!("Batch aborted: {error}");
            return Err(error);
        }
        Ok(outcome_rx.try_iter().collect())
    }

    fn transition(&mut self, next: PipelineState) {
        tracing::debug!("Batch state: {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// Block until `total` images have completed or something fatal arrives.
fn await_completion(
    signals: &Receiver<Signal>,
    total: usize,
    on_progress: &mut dyn FnMut(usize, usize),
) -> Option<PipelineError> {
    let mut completed = 0;
    while completed < total {
        match signals.recv() {
            Ok(Signal::Completed) => {
                completed += 1;
                on_progress(completed, total);
            }
            Ok(Signal::Fatal(error)) => return Some(error),
            Err(_) => {
                return Some(PipelineError::Disconnected {
                    stage: "coordinator".to_string(),
                })
            }
        }
    }
    None
}

fn summarize(outcomes: &[ImageOutcome], images: usize, elapsed: Duration) -> BatchStats {
    let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
    let chunks = outcomes
        .iter()
        .map(|outcome| match outcome {
            ImageOutcome::Pixelated(image) => image.chunks,
            ImageOutcome::Failed { .. } => 0,
        })
        .sum();
    let secs = elapsed.as_secs_f64();

    BatchStats {
        images,
        succeeded,
        failed: outcomes.len() - succeeded,
        chunks,
        elapsed_ms: elapsed.as_millis() as u64,
        images_per_second: if secs > 0.0 {
            succeeded as f64 / secs
        } else {
            0.0
        },
    }
}
