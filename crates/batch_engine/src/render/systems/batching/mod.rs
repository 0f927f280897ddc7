//! Geometry batching
//!
//! Packs independently authored meshes into shared device buffers and draws
//! them with a single multi-draw per flush.

pub mod geometry_batcher;

pub use geometry_batcher::{
    BatchError, BatchResult, BatcherState, FlushReport, GeometryBatcher, MeshSlot, TEXTURE_UNIT,
};
