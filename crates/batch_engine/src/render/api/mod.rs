//! # Device API
//!
//! The boundary between the batching core and the graphics device, plus an
//! in-memory device implementing it.

pub mod device;
pub mod headless;

pub use device::{
    BufferHandle, BufferUsage, DeviceError, DeviceResult, DrawRange, GraphicsDevice,
    ShaderHandle, TextureArrayDescriptor, TextureHandle, Topology, VertexLayoutHandle,
};
pub use headless::{DrawCall, HeadlessDevice};
