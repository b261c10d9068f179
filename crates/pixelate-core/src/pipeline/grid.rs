//! Chunk grid planning: tiling an image into square averaging blocks.
//!
//! Tiles are emitted in row-major order. Tiles on the right and bottom edges
//! are clipped to the image bounds rather than padded, so the tile set is an
//! exact partition of the image.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// A half-open pixel rectangle `[start_x, end_x) x [start_y, end_y)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub start_x: u32,
    pub start_y: u32,
    pub end_x: u32,
    pub end_y: u32,
}

impl Region {
    pub fn new(start_x: u32, start_y: u32, end_x: u32, end_y: u32) -> Self {
        debug_assert!(start_x <= end_x && start_y <= end_y);
        Self {
            start_x,
            start_y,
            end_x,
            end_y,
        }
    }

    pub fn width(&self) -> u32 {
        self.end_x - self.start_x
    }

    pub fn height(&self) -> u32 {
        self.end_y - self.start_y
    }

    /// Number of pixels covered by this region.
    pub fn pixel_count(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        (self.start_x..self.end_x).contains(&x) && (self.start_y..self.end_y).contains(&y)
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({},{})-({},{})",
            self.start_x, self.start_y, self.end_x, self.end_y
        )
    }
}

/// The tiling of a `width x height` image into `chunk_size` squares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkGrid {
    width: u32,
    height: u32,
    chunk_size: u32,
}

impl ChunkGrid {
    /// Plan a grid. Rejects a zero chunk size before any division happens.
    pub fn new(width: u32, height: u32, chunk_size: u32) -> PipelineResult<Self> {
        if chunk_size == 0 {
            return Err(PipelineError::InvalidChunkSize(chunk_size));
        }
        Ok(Self {
            width,
            height,
            chunk_size,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Tiles per row.
    pub fn columns(&self) -> u32 {
        self.width.div_ceil(self.chunk_size)
    }

    /// Tiles per column.
    pub fn rows(&self) -> u32 {
        self.height.div_ceil(self.chunk_size)
    }

    /// Total tile count: `ceil(h / c) * ceil(w / c)`.
    pub fn len(&self) -> usize {
        self.rows() as usize * self.columns() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate the tiles in row-major order.
    pub fn regions(&self) -> impl Iterator<Item = Region> + '_ {
        let step = self.chunk_size as usize;
        (0..self.height).step_by(step).flat_map(move |start_y| {
            (0..self.width).step_by(step).map(move |start_x| {
                Region::new(
                    start_x,
                    start_y,
                    start_x.saturating_add(self.chunk_size).min(self.width),
                    start_y.saturating_add(self.chunk_size).min(self.height),
                )
            })
        })
    }

    /// Collect the tiles into a vector.
    pub fn plan(&self) -> Vec<Region> {
        self.regions().collect()
    }
}
