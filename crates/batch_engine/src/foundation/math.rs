//! Math utilities and types
//!
//! Provides the vector and matrix aliases used by the mesh operations.

pub use nalgebra::{Matrix3, Vector3};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// Build a rotation matrix for `angle` radians about `axis`
///
/// Uses the Rodrigues form with `c = cos θ`, `s = sin θ`, `t = 1 - c`:
///
/// ```text
/// | t·x·x + c    t·x·y - s·z  t·x·z + s·y |
/// | t·x·y + s·z  t·y·y + c    t·y·z - s·x |
/// | t·x·z - s·y  t·y·z + s·x  t·z·z + c   |
/// ```
///
/// Returns `None` when the axis has zero length, since it cannot be normalized.
pub fn rotation_matrix(angle: f32, axis: Vec3) -> Option<Mat3> {
    let length = axis.norm();
    if length == 0.0 || !length.is_finite() {
        return None;
    }
    let (x, y, z) = (axis.x / length, axis.y / length, axis.z / length);

    let c = angle.cos();
    let s = angle.sin();
    let t = 1.0 - c;

    Some(Mat3::new(
        t * x * x + c,     t * x * y - s * z, t * x * z + s * y,
        t * x * y + s * z, t * y * y + c,     t * y * z - s * x,
        t * x * z - s * y, t * y * z + s * x, t * z * z + c,
    ))
}
