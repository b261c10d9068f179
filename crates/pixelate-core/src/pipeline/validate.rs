//! Cheap checks run on an input before it is read and decoded.
//!
//! Format detection belongs to the codec, so nothing here looks at file
//! contents.

use std::path::Path;

use crate::config::LimitsConfig;
use crate::error::PipelineError;

/// Validates input files against the configured limits.
#[derive(Debug, Clone)]
pub struct Validator {
    limits: LimitsConfig,
}

impl Validator {
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Check that `path` exists and is within `max_file_size_mb`.
    pub fn validate(&self, path: &Path) -> Result<(), PipelineError> {
        let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PipelineError::FileNotFound(path.to_path_buf()),
            _ => PipelineError::Io {
                path: path.to_path_buf(),
                message: format!("Cannot read metadata: {e}"),
            },
        })?;

        let max_bytes = self.limits.max_file_size_mb.saturating_mul(1024 * 1024);
        if metadata.len() > max_bytes {
            return Err(PipelineError::FileTooLarge {
                path: path.to_path_buf(),
                size_mb: metadata.len() / (1024 * 1024),
                max_mb: self.limits.max_file_size_mb,
            });
        }

        Ok(())
    }

    /// Reject decoded dimensions beyond `max_image_dimension`, and empty images.
    pub fn check_dimensions(&self, path: &Path, width: u32, height: u32) -> Result<(), PipelineError> {
        if width == 0 || height == 0 {
            return Err(PipelineError::EmptyImage(path.to_path_buf()));
        }
        let max_dim = self.limits.max_image_dimension;
        if width > max_dim || height > max_dim {
            return Err(PipelineError::ImageTooLarge {
                path: path.to_path_buf(),
                width,
                height,
                max_dim,
            });
        }
        Ok(())
    }
}
