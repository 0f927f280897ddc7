//! # Render Resources
//!
//! Device-owned resources that outlive a single frame, and the deferred
//! release machinery that frees them.

pub mod texture_array;
pub mod trash;

pub use texture_array::{mip_levels, TextureArray, TextureError, TextureResult};
pub use trash::{
    SharedTrashBatch, TrashBatch, TrashBatchKey, TrashError, TrashItem, TrashItemKind,
    TrashRegistry, TrashResult, GROWTH_INCREMENT, MAX_REGISTERED_BATCHES,
};
