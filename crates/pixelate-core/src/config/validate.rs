//! Configuration validation with range checks.

use crate::error::{ConfigError, PipelineError, PipelineResult};

use super::{Config, PipelineConfig, Topology};

impl PipelineConfig {
    /// Check chunk size, the pool sizes the topology uses, and the queue
    /// capacities it uses.
    ///
    /// Pools and queues a topology never builds may be zero.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.chunk_size == 0 {
            return Err(PipelineError::InvalidChunkSize(self.chunk_size));
        }

        let mut required = vec![
            ("ingest_workers", self.ingest_workers),
            ("assembly_workers", self.assembly_workers),
            ("result_queue_capacity", self.result_queue_capacity),
        ];
        if self.topology != Topology::Fused {
            required.push(("chunk_workers", self.chunk_workers));
            required.push(("chunk_queue_capacity", self.chunk_queue_capacity));
        }
        if self.topology == Topology::Split {
            required.push(("planner_workers", self.planner_workers));
            required.push(("image_queue_capacity", self.image_queue_capacity));
        }

        match required.into_iter().find(|(_, value)| *value == 0) {
            Some((name, _)) => Err(PipelineError::InvalidOptions(format!(
                "{name} must be at least 1"
            ))),
            None => Ok(()),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate().map_err(|e| {
            ConfigError::ValidationError(match e {
                PipelineError::InvalidChunkSize(_) => "pipeline.chunk_size must be > 0".into(),
                PipelineError::InvalidOptions(message) => format!("pipeline.{message}"),
                other => other.to_string(),
            })
        })?;

        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.output.suffix.is_empty() {
            return Err(ConfigError::ValidationError(
                "output.suffix must not be empty".into(),
            ));
        }
        if crate::output::OutputFormat::parse(&self.output.report_format).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "output.report_format must be \"json\" or \"jsonl\", got {:?}",
                self.output.report_format
            )));
        }
        Ok(())
    }
}
