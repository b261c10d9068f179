//! Finding the input images for a batch.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::ProcessingConfig;

/// Discovers image files under a path.
pub struct FileDiscovery {
    config: ProcessingConfig,
}

impl FileDiscovery {
    pub fn new(config: ProcessingConfig) -> Self {
        Self { config }
    }

    /// Collect supported image files at `path`.
    ///
    /// A file is returned as-is if its extension is supported. A directory is
    /// walked recursively. Results are sorted so batch indices are stable
    /// between runs.
    pub fn discover(&self, path: &Path) -> Vec<PathBuf> {
        if path.is_file() {
            return if self.is_supported(path) {
                vec![path.to_path_buf()]
            } else {
                vec![]
            };
        }

        let mut files: Vec<PathBuf> = WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && self.is_supported(e.path()))
            .map(|e| e.into_path())
            .collect();

        files.sort();
        files
    }

    fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.config
                    .supported_formats
                    .iter()
                    .any(|fmt| fmt.eq_ignore_ascii_case(ext))
            })
    }
}
