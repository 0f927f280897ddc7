//! Vertex layout shared by every mesh and by the batcher's device buffers
//!
//! The vertex is a plain `#[repr(C)]` record of 4-byte fields so it can be
//! uploaded with `bytemuck::cast_slice` and described to the device with
//! [`Vertex::attributes`].

use bytemuck::{Pod, Zeroable};
use std::mem::offset_of;

/// Per-vertex data consumed by the batch shaders
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Position in model space
    pub position: [f32; 3],

    /// Vertex color, multiplied with the sampled texel
    pub color: [f32; 3],

    /// Normal vector
    pub normal: [f32; 3],

    /// Texture coordinates
    pub tex_coord: [f32; 2],

    /// Layer of the bound texture array to sample from
    pub texture_layer: i32,

    /// Dimensionality flag, [`Vertex::DIMENSION_2D`] or [`Vertex::DIMENSION_3D`]
    pub dimension: u32,
}

impl Vertex {
    /// Flat UI geometry, drawn without the 3D camera transform
    pub const DIMENSION_2D: u32 = 0;

    /// World-space geometry
    pub const DIMENSION_3D: u32 = 1;

    /// Size of one vertex in bytes, the stride of the vertex buffer
    pub const STRIDE: usize = std::mem::size_of::<Self>();

    /// Create a white, 3D vertex sampling texture layer 0
    pub fn new(position: [f32; 3], normal: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self {
            position,
            color: [1.0, 1.0, 1.0],
            normal,
            tex_coord,
            texture_layer: 0,
            dimension: Self::DIMENSION_3D,
        }
    }

    /// Replace the color
    pub fn with_color(mut self, color: [f32; 3]) -> Self {
        self.color = color;
        self
    }

    /// Replace the texture layer
    pub fn with_texture_layer(mut self, layer: i32) -> Self {
        self.texture_layer = layer;
        self
    }

    /// Mark the vertex as flat UI geometry
    pub fn as_2d(mut self) -> Self {
        self.dimension = Self::DIMENSION_2D;
        self
    }

    /// Whether the vertex is world-space geometry
    pub fn is_3d(&self) -> bool {
        self.dimension == Self::DIMENSION_3D
    }

    /// Describe the vertex attributes for the device's vertex layout
    ///
    /// Locations are fixed: 0 position, 1 color, 2 normal, 3 texture
    /// coordinates, 4 texture layer (integer), 5 dimension flag (unsigned).
    pub fn attributes() -> [VertexAttribute; 6] {
        [
            VertexAttribute {
                location: 0,
                components: 3,
                format: AttributeFormat::Float,
                offset: offset_of!(Vertex, position),
            },
            VertexAttribute {
                location: 1,
                components: 3,
                format: AttributeFormat::Float,
                offset: offset_of!(Vertex, color),
            },
            VertexAttribute {
                location: 2,
                components: 3,
                format: AttributeFormat::Float,
                offset: offset_of!(Vertex, normal),
            },
            VertexAttribute {
                location: 3,
                components: 2,
                format: AttributeFormat::Float,
                offset: offset_of!(Vertex, tex_coord),
            },
            // Integer attributes must not be normalized or converted to float
            VertexAttribute {
                location: 4,
                components: 1,
                format: AttributeFormat::Int,
                offset: offset_of!(Vertex, texture_layer),
            },
            VertexAttribute {
                location: 5,
                components: 1,
                format: AttributeFormat::UInt,
                offset: offset_of!(Vertex, dimension),
            },
        ]
    }
}

impl Default for Vertex {
    fn default() -> Self {
        Self::new([0.0; 3], [0.0; 3], [0.0; 2])
    }
}

/// Scalar type of a vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeFormat {
    /// 32-bit float components
    Float,
    /// 32-bit signed integer components
    Int,
    /// 32-bit unsigned integer components
    UInt,
}

/// One attribute of the interleaved vertex layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// Shader input location
    pub location: u32,
    /// Number of components (1 to 4)
    pub components: u32,
    /// Component type
    pub format: AttributeFormat,
    /// Byte offset inside [`Vertex`]
    pub offset: usize,
}
