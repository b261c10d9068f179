//! Worker threads, their completion reporting, and the join barrier.

use crossbeam_channel::Sender;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use super::job::Signal;
use crate::config::ErrorMode;
use crate::error::{PipelineError, PipelineResult};
use crate::types::ImageOutcome;

/// The stage a worker belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Read and decode (split topology)
    Load,
    /// Read, decode and tile
    Ingest,
    /// Tile decoded rasters (split topology)
    Plan,
    /// Average chunks
    Chunk,
    /// Paint chunks into output rasters
    Assemble,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Ingest => "ingest",
            Stage::Plan => "plan",
            Stage::Chunk => "chunk",
            Stage::Assemble => "assemble",
        };
        f.write_str(name)
    }
}

/// Where workers report finished images and batch-ending failures.
#[derive(Debug, Clone)]
pub(crate) struct Sinks {
    pub outcomes: Sender<ImageOutcome>,
    pub signals: Sender<Signal>,
    pub error_mode: ErrorMode,
}

impl Sinks {
    /// Publish a finished image and count it toward the batch.
    pub fn completed(&self, outcome: ImageOutcome) {
        // Both queues are sized so these sends never block.
        let _ = self.outcomes.send(outcome);
        let _ = self.signals.send(Signal::Completed);
    }

    /// Report an image that could not be pixelated, per the error mode.
    pub fn failed(&self, index: usize, path: PathBuf, error: PipelineError) {
        match self.error_mode {
            ErrorMode::FailFast => {
                tracing::error!("Aborting batch: {error}");
                self.fatal(error);
            }
            ErrorMode::Recoverable => {
                tracing::warn!("Failed: {:?} - {error}", path);
                self.completed(ImageOutcome::Failed { index, path, error });
            }
        }
    }

    /// End the batch.
    pub fn fatal(&self, error: PipelineError) {
        let _ = self.signals.try_send(Signal::Fatal(error));
    }
}

/// Reports a panicking worker so the coordinator stops waiting on it.
struct PanicGuard {
    stage: Stage,
    signals: Sender<Signal>,
}

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            let _ = self.signals.try_send(Signal::Fatal(PipelineError::WorkerPanicked {
                stage: self.stage.to_string(),
            }));
        }
    }
}

/// Every worker spawned for one batch.
#[derive(Default)]
pub(crate) struct WorkerSet {
    handles: Vec<(Stage, JoinHandle<()>)>,
}

impl WorkerSet {
    /// Spawn a named worker thread running `body`.
    pub fn spawn<F>(
        &mut self,
        stage: Stage,
        index: usize,
        signals: Sender<Signal>,
        body: F,
    ) -> PipelineResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(format!("pixelate-{stage}-{index}"))
            .spawn(move || {
                let _guard = PanicGuard { stage, signals };
                let span = tracing::debug_span!("worker", %stage, index);
                let _enter = span.enter();
                tracing::trace!("started");
                body();
                tracing::trace!("exited");
            })
            .map_err(|e| PipelineError::Spawn {
                stage: stage.to_string(),
                message: e.to_string(),
            })?;
        self.handles.push((stage, handle));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every worker to exit. Returns one error per panicked worker.
    pub fn join_all(self) -> Vec<PipelineError> {
        self.handles
            .into_iter()
            .filter_map(|(stage, handle)| {
                handle.join().err().map(|_| PipelineError::WorkerPanicked {
                    stage: stage.to_string(),
                })
            })
            .collect()
    }
}
