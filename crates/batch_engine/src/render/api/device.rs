//! Device abstraction traits for the batching layer
//!
//! This module defines the contract the batching core needs from a graphics
//! device: fixed-size buffers with sub-range uploads, a vertex layout binding
//! both buffers, indexed multi-draw, texture arrays and sampler binding.
//! Context creation and shader compilation live outside this boundary.
//!
//! Handles are plain `u32` newtypes. A zero handle is the "creation failed"
//! sentinel; components that create device objects must check `is_null()`
//! before using the result.

use crate::render::primitives::VertexAttribute;

/// Result type for device operations
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Errors raised at the device boundary
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DeviceError {
    /// The device returned the zero handle for a new object
    #[error("Device returned a null handle while creating {0}")]
    NullHandle(&'static str),

    /// Operation on a buffer the device does not know (never created or already destroyed)
    #[error("Unknown buffer handle {0:?}")]
    UnknownBuffer(BufferHandle),

    /// Operation on a texture the device does not know
    #[error("Unknown texture handle {0:?}")]
    UnknownTexture(TextureHandle),

    /// Operation on a vertex layout the device does not know
    #[error("Unknown vertex layout handle {0:?}")]
    UnknownLayout(VertexLayoutHandle),

    /// Byte range falls outside the target buffer
    #[error("Range {offset}..{end} exceeds buffer size {size}")]
    OutOfRange {
        /// Start of the range in bytes
        offset: u64,
        /// End of the range in bytes (exclusive)
        end: u64,
        /// Size of the buffer in bytes
        size: u64,
    },

    /// Texture layer outside the array
    #[error("Layer {layer} is outside texture array with {layers} layers")]
    InvalidLayer {
        /// Requested layer
        layer: u32,
        /// Layers in the array
        layers: u32,
    },

    /// Pixel data does not match the texture layer dimensions
    #[error("Expected {expected} bytes of pixel data, got {actual}")]
    SizeMismatch {
        /// Bytes required for the upload
        expected: usize,
        /// Bytes supplied
        actual: usize,
    },
}

macro_rules! device_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            /// The zero handle, returned when creation fails and used as the "unbound" value
            pub const NULL: Self = Self(0);

            /// Whether this is the zero handle
            pub fn is_null(self) -> bool {
                self.0 == 0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::NULL
            }
        }
    };
}

device_handle!(
    /// Handle to a device buffer
    BufferHandle
);
device_handle!(
    /// Handle to a vertex layout (vertex + index buffer binding)
    VertexLayoutHandle
);
device_handle!(
    /// Handle to a layered texture
    TextureHandle
);
device_handle!(
    /// Handle to a linked shader program, resolved by the caller
    ShaderHandle
);

/// What a buffer is bound as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Interleaved vertex data
    Vertex,
    /// 32-bit unsigned indices
    Index,
}

/// Primitive topology of a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    /// Independent triangles, three indices each
    TriangleList,
}

/// One sub-draw of a multi-draw dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawRange {
    /// Number of indices to draw
    pub index_count: u32,
    /// Byte offset of the first index in the bound index buffer
    pub index_byte_offset: u64,
    /// Value added to every index before fetching the vertex
    pub base_vertex: i32,
}

/// Description of a texture array allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureArrayDescriptor {
    /// Layer width in pixels
    pub width: u32,
    /// Layer height in pixels
    pub height: u32,
    /// Number of layers
    pub layers: u32,
    /// Number of mip levels to allocate
    pub mip_levels: u32,
}

/// Graphics device used by the batching core
///
/// Implementations are driven from a single render thread; nothing here is
/// required to be `Send` or `Sync`.
pub trait GraphicsDevice {
    /// Allocate a buffer of `size` bytes with undefined contents
    fn create_buffer(&mut self, usage: BufferUsage, size: u64) -> DeviceResult<BufferHandle>;

    /// Copy `data` into `buffer` starting at byte `offset`
    fn upload_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> DeviceResult<()>;

    /// Free a buffer; unknown or null handles are ignored
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Bind a vertex and an index buffer together with an attribute layout
    fn create_vertex_layout(
        &mut self,
        vertex_buffer: BufferHandle,
        index_buffer: BufferHandle,
        stride: usize,
        attributes: &[VertexAttribute],
    ) -> DeviceResult<VertexLayoutHandle>;

    /// Free a vertex layout; unknown or null handles are ignored
    fn destroy_vertex_layout(&mut self, layout: VertexLayoutHandle);

    /// Look up the binding slot of a sampler uniform, `None` if the program has no such uniform
    fn sampler_slot(&self, program: ShaderHandle, name: &str) -> Option<i32>;

    /// Point a sampler uniform at a texture unit
    fn set_sampler_unit(&mut self, program: ShaderHandle, slot: i32, unit: u32);

    /// Bind a texture array to a texture unit, [`TextureHandle::NULL`] unbinds
    fn bind_texture_array(&mut self, unit: u32, texture: TextureHandle);

    /// Issue every range in one indexed multi-draw using 32-bit indices
    fn multi_draw_indexed(
        &mut self,
        layout: VertexLayoutHandle,
        topology: Topology,
        ranges: &[DrawRange],
    ) -> DeviceResult<()>;

    /// Allocate an RGBA8 texture array
    fn create_texture_array(&mut self, descriptor: &TextureArrayDescriptor) -> DeviceResult<TextureHandle>;

    /// Replace mip level 0 of one layer with tightly packed RGBA8 pixels
    fn upload_texture_layer(
        &mut self,
        texture: TextureHandle,
        layer: u32,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> DeviceResult<()>;

    /// Rebuild the mip chain of every layer
    fn generate_mipmaps(&mut self, texture: TextureHandle) -> DeviceResult<()>;

    /// Free a texture array; unknown or null handles are ignored
    fn destroy_texture_array(&mut self, texture: TextureHandle);
}
