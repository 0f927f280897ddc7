//! # Batch Engine
//!
//! Mesh batching and deterministic resource cleanup for real-time renderers.
//!
//! ## Features
//!
//! - **Mesh Data Model**: owned vertex/index meshes with transform, rotate,
//!   recolor, append and OBJ loading
//! - **Geometry Batching**: many meshes packed into one vertex and one index
//!   buffer, drawn with a single indexed multi-draw
//! - **Trash Batches**: deferred, ordered, idempotent release of meshes,
//!   batchers and texture arrays, with a registry for shutdown cleanup
//! - **Device Abstraction**: all device work goes through the
//!   `GraphicsDevice` trait; `HeadlessDevice` runs everything in memory
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use batch_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut context = RenderContext::new(HeadlessDevice::new(), RenderConfig::default())?;
//!     let mut batcher = context.create_batcher()?;
//!     let trash = context.create_default_trash_batch();
//!
//!     let mut ship = ObjLoader::load_obj("resources/models/ship.obj")?;
//!     ship.rotate(0.5, Vec3::new(0.0, 1.0, 0.0));
//!
//!     batcher.submit(context.device_mut(), &ship)?;
//!     batcher.submit(context.device_mut(), &Mesh::sphere(1.0, 16, 8))?;
//!     batcher.flush(context.device_mut(), ShaderHandle::NULL, TextureHandle::NULL)?;
//!
//!     trash.borrow_mut().add(ship);
//!     trash.borrow_mut().add(batcher);
//!     context.teardown();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::must_use_candidate,
    clippy::missing_errors_doc
)]

// Configuration
pub mod config;
pub mod core;

// Utilities
pub mod foundation;

// Asset loading
pub mod assets;

// Batching, resources and the device boundary
pub mod render;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        assets::{ObjError, ObjLoader},
        core::config::{BatcherConfig, Config, RenderConfig},
        foundation::math::Vec3,
        render::{
            BatchError, FlushReport, GeometryBatcher, GraphicsDevice, HeadlessDevice, Mesh,
            RenderContext, ShaderHandle, SharedTrashBatch, TextureArray, TextureHandle,
            TrashBatch, TrashItem, Vertex,
        },
    };
}
