//! Core geometry primitives: vertices, meshes and generated shapes

pub mod vertex;
pub mod mesh;
pub mod shapes;

pub use vertex::{AttributeFormat, Vertex, VertexAttribute};
pub use mesh::{Mesh, MeshError};
