//! Mesh representation for batched geometry
//!
//! A [`Mesh`] owns two contiguous sequences: interleaved [`Vertex`] records
//! and a triangle list of `u32` indices into them. Every index must be below
//! the vertex count and the index count is a multiple of three.
//!
//! Meshes are plain owned data. Nothing frees a mesh behind the caller's back;
//! it lives until it is dropped or handed to a
//! [`TrashBatch`](crate::render::resources::trash::TrashBatch).
//!
//! In-place edits (`transform`, `resize`, `set_color`, `set_texture_layer`,
//! `rotate`) can run at any time, including after the mesh was submitted to
//! a batcher: the batcher copies vertex data at submit time.

use std::fmt;

use bytemuck::Zeroable;

use crate::foundation::math::{rotation_matrix, Vec3};
use super::vertex::Vertex;

/// Errors reported by mesh validation and fallible copies
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MeshError {
    /// An index addresses a vertex past the end of the vertex sequence
    #[error("Index {index} at position {position} is out of bounds for {vertex_count} vertices")]
    IndexOutOfBounds {
        /// Position of the offending entry in the index sequence
        position: usize,
        /// Offending index value
        index: u32,
        /// Number of vertices in the mesh
        vertex_count: usize,
    },

    /// The index count is not a multiple of three
    #[error("Index count {0} is not a multiple of 3")]
    NotTriangleList(usize),

    /// The combined vertex count cannot be addressed by 32-bit indices
    #[error("{0} vertices exceed the 32-bit index range")]
    TooManyVertices(usize),

    /// Storage for a copy could not be reserved
    #[error("Failed to allocate storage for {0}")]
    AllocationFailed(&'static str),
}

/// Triangle-list mesh with interleaved vertices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// Vertex data
    pub vertices: Vec<Vertex>,

    /// Index data for triangles
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Create a new mesh
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Create a mesh with no geometry
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of indices
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Whether the mesh has no vertices
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Check the triangle-list and index-bound invariants
    pub fn validate(&self) -> Result<(), MeshError> {
        if self.indices.len() % 3 != 0 {
            return Err(MeshError::NotTriangleList(self.indices.len()));
        }

        let vertex_count = self.vertices.len();
        if let Some((position, &index)) = self
            .indices
            .iter()
            .enumerate()
            .find(|(_, &index)| index as usize >= vertex_count)
        {
            return Err(MeshError::IndexOutOfBounds { position, index, vertex_count });
        }

        Ok(())
    }

    /// Offset every vertex position
    pub fn transform(&mut self, offset: Vec3) {
        for vertex in &mut self.vertices {
            vertex.position[0] += offset.x;
            vertex.position[1] += offset.y;
            vertex.position[2] += offset.z;
        }
    }

    /// Scale every vertex position component-wise about the origin
    pub fn resize(&mut self, scale: Vec3) {
        for vertex in &mut self.vertices {
            vertex.position[0] *= scale.x;
            vertex.position[1] *= scale.y;
            vertex.position[2] *= scale.z;
        }
    }

    /// Overwrite the color of every vertex
    pub fn set_color(&mut self, color: [f32; 3]) {
        for vertex in &mut self.vertices {
            vertex.color = color;
        }
    }

    /// Overwrite the texture array layer of every vertex
    pub fn set_texture_layer(&mut self, layer: i32) {
        for vertex in &mut self.vertices {
            vertex.texture_layer = layer;
        }
    }

    /// Arithmetic mean of all vertex positions, `None` for an empty mesh
    pub fn centroid(&self) -> Option<Vec3> {
        if self.vertices.is_empty() {
            return None;
        }

        let sum = self
            .vertices
            .iter()
            .fold(Vec3::zeros(), |acc, v| acc + Vec3::from(v.position));
        Some(sum / self.vertices.len() as f32)
    }

    /// Rotate the mesh by `angle` radians about `axis` through its centroid
    ///
    /// Positions rotate about the centroid; normals are directions and rotate
    /// about the origin. A zero-length axis leaves the mesh untouched.
    pub fn rotate(&mut self, angle: f32, axis: Vec3) {
        let Some(center) = self.centroid() else {
            return;
        };
        let Some(rotation) = rotation_matrix(angle, axis) else {
            log::warn!("Ignoring mesh rotation about a zero-length axis");
            return;
        };

        for vertex in &mut self.vertices {
            let local = Vec3::from(vertex.position) - center;
            vertex.position = (rotation * local + center).into();
            vertex.normal = (rotation * Vec3::from(vertex.normal)).into();
        }
    }

    /// Deep copy that reports allocation failure instead of aborting
    pub fn try_clone(&self) -> Result<Self, MeshError> {
        let mut vertices = Vec::new();
        vertices
            .try_reserve_exact(self.vertices.len())
            .map_err(|_| MeshError::AllocationFailed("mesh vertices"))?;
        vertices.extend_from_slice(&self.vertices);

        let mut indices = Vec::new();
        indices
            .try_reserve_exact(self.indices.len())
            .map_err(|_| MeshError::AllocationFailed("mesh indices"))?;
        indices.extend_from_slice(&self.indices);

        Ok(Self { vertices, indices })
    }

    /// Concatenate two meshes into a new one
    ///
    /// The result holds `self`'s vertices followed by `other`'s, and every
    /// index taken from `other` is shifted by `self.vertex_count()` so it
    /// still addresses the same vertex.
    ///
    /// Fails when the combined mesh has more vertices than a `u32` index can
    /// address. Running out of memory aborts, as for any `Vec` growth.
    pub fn append(&self, other: &Mesh) -> Result<Mesh, MeshError> {
        let total = self.vertices.len() + other.vertices.len();
        if u32::try_from(total).is_err() {
            return Err(MeshError::TooManyVertices(total));
        }
        let base = u32::try_from(self.vertices.len()).map_err(|_| MeshError::TooManyVertices(total))?;

        let mut vertices = Vec::with_capacity(self.vertices.len() + other.vertices.len());
        vertices.extend_from_slice(&self.vertices);
        vertices.extend_from_slice(&other.vertices);

        let mut indices = Vec::with_capacity(self.indices.len() + other.indices.len());
        indices.extend_from_slice(&self.indices);
        for &index in &other.indices {
            indices.push(index.checked_add(base).ok_or(MeshError::TooManyVertices(total))?);
        }

        Ok(Mesh { vertices, indices })
    }

    /// Grow storage and extend the logical element counts
    ///
    /// Adds `extra_vertices` zeroed vertices and `extra_indices` zero indices,
    /// so both counts increase by exactly the requested amounts. Callers fill
    /// the new tail in place afterwards. Use [`Mesh::reserve`] to grow storage
    /// without changing the counts.
    pub fn reallocate(&mut self, extra_vertices: usize, extra_indices: usize) {
        self.vertices.resize(self.vertices.len() + extra_vertices, Vertex::zeroed());
        self.indices.resize(self.indices.len() + extra_indices, 0);
    }

    /// Grow storage for at least the given number of additional elements
    pub fn reserve(&mut self, extra_vertices: usize, extra_indices: usize) {
        self.vertices.reserve(extra_vertices);
        self.indices.reserve(extra_indices);
    }
}

impl fmt::Display for Mesh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mesh has {} vertices and {} indices", self.vertices.len(), self.indices.len())?;

        for (i, v) in self.vertices.iter().enumerate() {
            writeln!(f, "  Vertex {i}:")?;
            writeln!(f, "    Position: ({:.6}, {:.6}, {:.6})", v.position[0], v.position[1], v.position[2])?;
            writeln!(f, "    Normal:   ({:.6}, {:.6}, {:.6})", v.normal[0], v.normal[1], v.normal[2])?;
            writeln!(f, "    Texcoord: ({:.6}, {:.6})", v.tex_coord[0], v.tex_coord[1])?;
            writeln!(f, "    Layer:    {}", v.texture_layer)?;
            writeln!(f, "    3D:       {}", v.dimension)?;
        }

        write!(f, "  Indices:")?;
        for row in self.indices.chunks(12) {
            write!(f, "\n   ")?;
            for index in row {
                write!(f, " {index}")?;
            }
        }
        writeln!(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn triangle() -> Mesh {
        Mesh::new(
            vec![
                Vertex::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
                Vertex::new([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
                Vertex::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
            ],
            vec![0, 1, 2],
        )
    }

    #[test]
    fn test_transform_and_resize() {
        let mut mesh = triangle();
        mesh.transform(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(mesh.vertices[1].position, [2.0, 2.0, 3.0]);

        mesh.resize(Vec3::new(2.0, 0.5, -1.0));
        assert_eq!(mesh.vertices[1].position, [4.0, 1.0, -3.0]);
    }

    #[test]
    fn test_edits_on_empty_mesh_are_noops() {
        let mut mesh = Mesh::empty();
        mesh.transform(Vec3::new(1.0, 1.0, 1.0));
        mesh.resize(Vec3::new(2.0, 2.0, 2.0));
        mesh.rotate(1.0, Vec3::z());
        assert!(mesh.is_empty());
        assert!(mesh.centroid().is_none());
    }

    #[test]
    fn test_uniform_overwrites() {
        let mut mesh = triangle();
        mesh.set_color([0.2, 0.4, 0.6]);
        mesh.set_texture_layer(3);
        assert!(mesh.vertices.iter().all(|v| v.color == [0.2, 0.4, 0.6]));
        assert!(mesh.vertices.iter().all(|v| v.texture_layer == 3));
    }

    #[test]
    fn test_rotation_preserves_centroid_distance() {
        let mut mesh = Mesh::cube(Vec3::new(3.0, -1.0, 2.0), Vec3::new(1.0, 2.0, 0.5), [1.0, 1.0]);
        let center = mesh.centroid().unwrap();
        let before: Vec<f32> = mesh
            .vertices
            .iter()
            .map(|v| (Vec3::from(v.position) - center).norm())
            .collect();

        mesh.rotate(1.234, Vec3::new(0.3, -1.0, 0.7));

        assert_relative_eq!(mesh.centroid().unwrap(), center, epsilon = 1e-4);
        for (vertex, distance) in mesh.vertices.iter().zip(before) {
            assert_relative_eq!((Vec3::from(vertex.position) - center).norm(), distance, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_rotation_turns_normals_about_origin() {
        let mut mesh = triangle();
        mesh.rotate(std::f32::consts::FRAC_PI_2, Vec3::x());
        for vertex in &mesh.vertices {
            assert_relative_eq!(Vec3::from(vertex.normal), Vec3::new(0.0, -1.0, 0.0), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_rotation_with_zero_axis_is_ignored() {
        let mut mesh = triangle();
        let original = mesh.clone();
        mesh.rotate(1.0, Vec3::zeros());
        assert_eq!(mesh, original);
    }

    #[test]
    fn test_clone_is_deep() {
        let original = triangle();
        let mut copy = original.try_clone().unwrap();
        copy.transform(Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(original.vertices[0].position, [0.0, 0.0, 0.0]);
        assert_eq!(copy.indices, original.indices);
    }

    #[test]
    fn test_append_with_empty_is_identity() {
        let mesh = triangle();
        let combined = mesh.append(&Mesh::empty()).unwrap();
        assert_eq!(combined, mesh);

        let combined = Mesh::empty().append(&mesh).unwrap();
        assert_eq!(combined, mesh);
    }

    #[test]
    fn test_append_rebases_second_mesh() {
        let a = Mesh::cube(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0), [1.0, 1.0]);
        let b = triangle();
        let combined = a.append(&b).unwrap();

        assert_eq!(combined.vertex_count(), a.vertex_count() + b.vertex_count());
        assert_eq!(combined.index_count(), a.index_count() + b.index_count());
        assert_eq!(&combined.indices[..a.index_count()], a.indices.as_slice());

        let shift = a.vertex_count() as u32;
        for (rebased, original) in combined.indices[a.index_count()..].iter().zip(&b.indices) {
            assert_eq!(*rebased, original + shift);
        }
        assert!(combined.validate().is_ok());
    }

    #[test]
    fn test_append_rejects_unaddressable_index() {
        let a = triangle();
        let b = Mesh::new(vec![Vertex::default(); 3], vec![0, 1, u32::MAX]);
        assert_eq!(a.append(&b), Err(MeshError::TooManyVertices(6)));
    }

    #[test]
    fn test_reallocate_extends_counts() {
        let mut mesh = triangle();
        mesh.reallocate(3, 3);
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.index_count(), 6);
        assert_eq!(mesh.vertices[0].position, [0.0, 0.0, 0.0]);
        assert_eq!(mesh.vertices[1].position, [1.0, 0.0, 0.0]);
        assert_eq!(mesh.vertices[5], Vertex::zeroed());
        assert_eq!(mesh.indices[3..], [0, 0, 0]);
    }

    #[test]
    fn test_reserve_keeps_counts() {
        let mut mesh = triangle();
        mesh.reserve(100, 300);
        assert_eq!(mesh.vertex_count(), 3);
        assert!(mesh.vertices.capacity() >= 103);
        assert!(mesh.indices.capacity() >= 303);
    }

    #[test]
    fn test_validate() {
        assert!(triangle().validate().is_ok());

        let mut bad = triangle();
        bad.indices[2] = 7;
        assert_eq!(
            bad.validate(),
            Err(MeshError::IndexOutOfBounds { position: 2, index: 7, vertex_count: 3 })
        );

        bad.indices.pop();
        assert_eq!(bad.validate(), Err(MeshError::NotTriangleList(2)));
    }

    #[test]
    fn test_display_lists_vertices_and_indices() {
        let text = triangle().to_string();
        assert!(text.starts_with("Mesh has 3 vertices and 3 indices"));
        assert!(text.contains("Vertex 2:"));
        assert!(text.contains(" 0 1 2"));
    }
}
