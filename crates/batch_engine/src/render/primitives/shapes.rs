//! Primitive mesh constructors
//!
//! Generated meshes are white, sample texture layer 0 and are flagged as 3D.

use std::f32::consts::PI;

use crate::foundation::math::Vec3;
use super::{Mesh, Vertex};

impl Mesh {
    /// Axis-aligned box centred on `center`
    ///
    /// `half_extents` is the distance from the centre to each face. Every face
    /// gets its own four vertices so normals stay flat: 24 vertices, 36 indices.
    /// `tex_repeat` scales the texture coordinates of each face so a texture
    /// can tile across large boxes.
    pub fn cube(center: Vec3, half_extents: Vec3, tex_repeat: [f32; 2]) -> Self {
        let (x, y, z) = (center.x, center.y, center.z);
        let (w, h, l) = (half_extents.x, half_extents.y, half_extents.z);
        let [tx, ty] = tex_repeat;

        // (corner positions, outward normal) per face, corners wound for CCW front faces
        let faces: [([[f32; 3]; 4], [f32; 3]); 6] = [
            // +Z
            ([[x + w, y + h, z + l], [x - w, y + h, z + l], [x - w, y - h, z + l], [x + w, y - h, z + l]], [0.0, 0.0, 1.0]),
            // -Z
            ([[x - w, y + h, z - l], [x + w, y + h, z - l], [x + w, y - h, z - l], [x - w, y - h, z - l]], [0.0, 0.0, -1.0]),
            // +X
            ([[x + w, y + h, z - l], [x + w, y + h, z + l], [x + w, y - h, z + l], [x + w, y - h, z - l]], [1.0, 0.0, 0.0]),
            // -X
            ([[x - w, y + h, z + l], [x - w, y + h, z - l], [x - w, y - h, z - l], [x - w, y - h, z + l]], [-1.0, 0.0, 0.0]),
            // -Y
            ([[x + w, y - h, z + l], [x - w, y - h, z + l], [x - w, y - h, z - l], [x + w, y - h, z - l]], [0.0, -1.0, 0.0]),
            // +Y
            ([[x + w, y + h, z - l], [x - w, y + h, z - l], [x - w, y + h, z + l], [x + w, y + h, z + l]], [0.0, 1.0, 0.0]),
        ];
        let tex_coords = [[0.0, ty], [tx, ty], [tx, 0.0], [0.0, 0.0]];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (corners, normal) in faces {
            let base = vertices.len() as u32;
            for (position, tex_coord) in corners.into_iter().zip(tex_coords) {
                vertices.push(Vertex::new(position, normal, tex_coord));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }

        Self::new(vertices, indices)
    }

    /// UV sphere centred on the origin
    ///
    /// Produces `(stacks + 1) * (sectors + 1)` vertices; the seam column is
    /// duplicated so texture coordinates wrap cleanly. The pole stacks emit a
    /// single triangle per sector, every other stack two.
    pub fn sphere(radius: f32, sectors: u32, stacks: u32) -> Self {
        let sectors = sectors.max(3);
        let stacks = stacks.max(2);

        let sector_step = 2.0 * PI / sectors as f32;
        let stack_step = PI / stacks as f32;
        let inverse_radius = if radius == 0.0 { 0.0 } else { 1.0 / radius };

        let mut vertices = Vec::with_capacity(((stacks + 1) * (sectors + 1)) as usize);
        for i in 0..=stacks {
            let stack_angle = PI / 2.0 - i as f32 * stack_step;
            let ring = radius * stack_angle.cos();
            let y = radius * stack_angle.sin();

            for j in 0..=sectors {
                let sector_angle = j as f32 * sector_step;
                let x = ring * sector_angle.cos();
                let z = ring * sector_angle.sin();

                vertices.push(Vertex::new(
                    [x, y, z],
                    [x * inverse_radius, y * inverse_radius, z * inverse_radius],
                    [j as f32 / sectors as f32, i as f32 / stacks as f32],
                ));
            }
        }

        let mut indices = Vec::with_capacity((6 * sectors * (stacks - 1)) as usize);
        for i in 0..stacks {
            let mut k1 = i * (sectors + 1);
            let mut k2 = k1 + sectors + 1;

            for _ in 0..sectors {
                if i != 0 {
                    indices.extend_from_slice(&[k1, k2, k1 + 1]);
                }
                if i != stacks - 1 {
                    indices.extend_from_slice(&[k1 + 1, k2, k2 + 1]);
                }
                k1 += 1;
                k2 += 1;
            }
        }

        Self::new(vertices, indices)
    }
}
