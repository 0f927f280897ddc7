//! # Rendering System
//!
//! Geometry batching and resource lifetime management on top of an abstract
//! graphics device.
//!
//! ## Architecture
//!
//! - **Device API**: the [`GraphicsDevice`] trait and an in-memory
//!   [`HeadlessDevice`] implementing it
//! - **Primitives**: [`Vertex`], [`Mesh`] and the generated shapes
//! - **Batching**: [`GeometryBatcher`] packs meshes into shared buffers and
//!   draws them with one multi-draw per flush
//! - **Resources**: [`TextureArray`] and the deferred-release trash batches
//! - **Context**: [`RenderContext`] owns the device and the trash registry
//!
//! Everything here is driven from a single render thread.

pub mod api;
pub mod context;
pub mod primitives;
pub mod resources;
pub mod systems;

#[cfg(test)]
mod batching_integration_tests;

pub use api::{
    BufferHandle, DeviceError, DeviceResult, DrawRange, GraphicsDevice, HeadlessDevice,
    ShaderHandle, TextureHandle, VertexLayoutHandle,
};
pub use context::RenderContext;
pub use primitives::{Mesh, MeshError, Vertex};
pub use resources::{
    SharedTrashBatch, TextureArray, TextureError, TrashBatch, TrashError, TrashItem,
    TrashItemKind, TrashRegistry,
};
pub use systems::batching::{BatchError, BatchResult, FlushReport, GeometryBatcher};
