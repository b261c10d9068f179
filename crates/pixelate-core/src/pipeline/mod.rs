//! The staged pixelation pipeline.
//!
//! - **grid**: Tile an image into row-major, edge-clipped chunks
//! - **average**: Reduce one chunk to its mean color
//! - **decode**: The codec boundary (bytes to raster and back)
//! - **validate**: Pre-decode checks against the configured limits
//! - **discovery**: Find input images on disk
//! - **channel**: Bounded queues and the shutdown-token protocol
//! - **job**: Messages passed between stages
//! - **ingest**: Load, tile, register and dispatch images
//! - **process**: Chunk worker pool
//! - **assemble**: Paint averaged chunks into output rasters
//! - **worker**: Thread spawning, panic reporting, join barrier
//! - **coordinator**: Per-batch wiring, completion counting, shutdown

pub mod assemble;
pub mod average;
pub mod channel;
pub mod coordinator;
pub mod decode;
pub mod discovery;
pub mod grid;
pub mod ingest;
pub mod job;
pub mod process;
pub mod validate;
pub mod worker;

// Re-exports for convenient access
pub use assemble::{assemble, paint, Assembly};
pub use average::{average_region, ChunkProcessor, MeanColor};
pub use coordinator::{Batch, Pipeline, PipelineState, PoolSizes};
pub use decode::{ImageCodec, RasterCodec};
pub use discovery::FileDiscovery;
pub use grid::{ChunkGrid, Region};
pub use job::{ImageJob, ProcessedChunk};
pub use validate::Validator;
pub use worker::Stage;
