//! robovis core types shared across crates.
//!
//! Provides the rigid [`Pose`] type, coordinate conversion between nalgebra
//! (physics, Z-up) and glam (render, Y-up), and the shape/mesh types that
//! travel from the URDF loader through the physics scene to the viewer.

pub mod shape;

use nalgebra as na;
use thiserror::Error;

// Re-export key types so downstream crates don't repeat use-declarations
pub use na::{Isometry3, Matrix3, Point3, Translation3, UnitQuaternion, Vector3};
pub use shape::{ShapeGeometry, TriMesh, VisualShape};

/// Gravitational acceleration (m/s²), pointing -Z (Z-up world convention).
/// The renderer uses Y-up, so [`to_y_up`] is applied for display.
pub const GRAVITY: Vector3<f64> = Vector3::new(0.0, 0.0, -9.81);

/// Errors raised when building a [`Pose`] from raw arrays.
#[derive(Debug, Error, PartialEq)]
pub enum PoseError {
    /// The quaternion has (near) zero norm and cannot describe a rotation.
    #[error("quaternion {0:?} has zero norm")]
    ZeroQuaternion([f64; 4]),
    /// A position or quaternion component is NaN or infinite.
    #[error("pose contains a non-finite component")]
    NonFinite,
}

/// Rigid transform: position `p` and orientation `q`.
///
/// Quaternions are given in `[w, x, y, z]` order when built from arrays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub p: Vector3<f64>,
    pub q: UnitQuaternion<f64>,
}

impl Pose {
    /// Build a pose from a position and a `wxyz` quaternion.
    ///
    /// Non-unit quaternions are normalized.
    pub fn new(p: [f64; 3], q: [f64; 4]) -> Result<Self, PoseError> {
        if p.iter().chain(q.iter()).any(|v| !v.is_finite()) {
            return Err(PoseError::NonFinite);
        }
        let quat = na::Quaternion::new(q[0], q[1], q[2], q[3]);
        if quat.norm() < 1e-12 {
            return Err(PoseError::ZeroQuaternion(q));
        }
        Ok(Self {
            p: Vector3::from(p),
            q: UnitQuaternion::from_quaternion(quat),
        })
    }

    pub fn identity() -> Self {
        Self {
            p: Vector3::zeros(),
            q: UnitQuaternion::identity(),
        }
    }

    pub fn from_position(p: Vector3<f64>) -> Self {
        Self {
            p,
            q: UnitQuaternion::identity(),
        }
    }

    pub fn from_isometry(iso: &Isometry3<f64>) -> Self {
        Self {
            p: iso.translation.vector,
            q: iso.rotation,
        }
    }

    pub fn to_isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::from(self.p), self.q)
    }

    /// Orientation as `[w, x, y, z]`.
    pub fn quat_wxyz(&self) -> [f64; 4] {
        [self.q.w, self.q.i, self.q.j, self.q.k]
    }

    pub fn inverse(&self) -> Self {
        Self::from_isometry(&self.to_isometry().inverse())
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::ops::Mul for Pose {
    type Output = Pose;

    fn mul(self, rhs: Pose) -> Pose {
        Pose::from_isometry(&(self.to_isometry() * rhs.to_isometry()))
    }
}

/// Basis change from the Z-up physics frame to the Y-up render frame:
/// `(x, y, z) → (x, z, -y)`.
pub fn z_up_to_y_up() -> glam::Mat4 {
    glam::Mat4::from_cols(
        glam::Vec4::new(1.0, 0.0, 0.0, 0.0),
        glam::Vec4::new(0.0, 0.0, -1.0, 0.0),
        glam::Vec4::new(0.0, 1.0, 0.0, 0.0),
        glam::Vec4::new(0.0, 0.0, 0.0, 1.0),
    )
}

/// Map a Z-up physics vector into render (Y-up) space.
pub fn to_y_up(v: &Vector3<f64>) -> glam::Vec3 {
    glam::Vec3::new(v.x as f32, v.z as f32, -v.y as f32)
}

/// Inverse of [`to_y_up`].
pub fn from_y_up(v: glam::Vec3) -> Vector3<f64> {
    Vector3::new(v.x as f64, -v.z as f64, v.y as f64)
}

/// Convert nalgebra Isometry3<f64> → glam Mat4 (for GPU upload).
pub fn isometry_to_glam(iso: &Isometry3<f64>) -> glam::Mat4 {
    let m = iso.to_homogeneous();
    glam::Mat4::from_cols_array(&[
        m[(0, 0)] as f32,
        m[(1, 0)] as f32,
        m[(2, 0)] as f32,
        m[(3, 0)] as f32,
        m[(0, 1)] as f32,
        m[(1, 1)] as f32,
        m[(2, 1)] as f32,
        m[(3, 1)] as f32,
        m[(0, 2)] as f32,
        m[(1, 2)] as f32,
        m[(2, 2)] as f32,
        m[(3, 2)] as f32,
        m[(0, 3)] as f32,
        m[(1, 3)] as f32,
        m[(2, 3)] as f32,
        m[(3, 3)] as f32,
    ])
}

/// Model matrix for a Z-up world pose, already expressed in render space.
pub fn render_model_matrix(world: &Isometry3<f64>) -> glam::Mat4 {
    z_up_to_y_up() * isometry_to_glam(world)
}

/// GPU-uploadable vertex for mesh rendering.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy)]
pub struct Aabb {
    pub min: Vector3<f64>,
    pub max: Vector3<f64>,
}

impl Aabb {
    pub fn new(min: Vector3<f64>, max: Vector3<f64>) -> Self {
        Self { min, max }
    }

    /// An inverted box that any call to [`Aabb::expand`] will replace.
    pub fn empty() -> Self {
        Self {
            min: Vector3::repeat(f64::INFINITY),
            max: Vector3::repeat(f64::NEG_INFINITY),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn contains(&self, p: &Vector3<f64>) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    pub fn center(&self) -> Vector3<f64> {
        (self.min + self.max) * 0.5
    }

    pub fn half_extents(&self) -> Vector3<f64> {
        (self.max - self.min) * 0.5
    }

    /// Expand to include a point.
    pub fn expand(&mut self, p: &Vector3<f64>) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    /// Expand by a margin on all sides.
    pub fn padded(&self, margin: f64) -> Self {
        Self {
            min: self.min - Vector3::repeat(margin),
            max: self.max + Vector3::repeat(margin),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_isometry_roundtrip() {
        let iso = Isometry3::translation(1.0, 2.0, 3.0);
        let g = isometry_to_glam(&iso);
        let col3 = g.col(3);
        assert!((col3.x - 1.0).abs() < 1e-6);
        assert!((col3.y - 2.0).abs() < 1e-6);
        assert!((col3.z - 3.0).abs() < 1e-6);

        let pose = Pose::from_isometry(&iso);
        assert_relative_eq!(pose.to_isometry().translation.vector, iso.translation.vector);
    }

    #[test]
    fn test_pose_normalizes_quaternion() {
        let pose = Pose::new([0.0, 0.0, 0.06205], [2.0, 0.0, 0.0, 0.0]).unwrap();
        assert_eq!(pose.quat_wxyz(), [1.0, 0.0, 0.0, 0.0]);
        assert_relative_eq!(pose.p.z, 0.06205);
    }

    #[test]
    fn test_pose_rejects_degenerate_input() {
        assert_eq!(
            Pose::new([0.0; 3], [0.0; 4]),
            Err(PoseError::ZeroQuaternion([0.0; 4]))
        );
        assert_eq!(
            Pose::new([f64::NAN, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0]),
            Err(PoseError::NonFinite)
        );
    }

    #[test]
    fn test_pose_compose_and_inverse() {
        let a = Pose::new([1.0, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0]).unwrap(); // 180° about Z
        let b = Pose::from_position(Vector3::new(1.0, 0.0, 0.0));
        let ab = a * b;
        assert_relative_eq!(ab.p, Vector3::new(0.0, 0.0, 0.0), epsilon = 1e-12);

        let id = a * a.inverse();
        assert_relative_eq!(id.p, Vector3::zeros(), epsilon = 1e-12);
        assert_relative_eq!(id.q.angle(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_z_up_maps_to_y_up() {
        let up = Vector3::new(0.0, 0.0, 1.0);
        assert_eq!(to_y_up(&up), glam::Vec3::Y);

        let m = z_up_to_y_up();
        let v = m.transform_vector3(glam::Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(v, glam::Vec3::new(1.0, 3.0, -2.0));
        assert_eq!(from_y_up(v), Vector3::new(1.0, 2.0, 3.0));
        assert!((m.determinant() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_aabb_expand() {
        let mut b = Aabb::empty();
        assert!(b.is_empty());
        b.expand(&Vector3::new(-1.0, 0.0, 2.0));
        b.expand(&Vector3::new(1.0, 2.0, 0.0));
        assert!(!b.is_empty());
        assert_eq!(b.center(), Vector3::new(0.0, 1.0, 1.0));
        assert_eq!(b.half_extents(), Vector3::new(1.0, 1.0, 1.0));
        assert!(b.contains(&Vector3::new(0.5, 0.5, 0.5)));
        assert!(!b.contains(&Vector3::new(0.5, 3.0, 0.5)));
        assert!(b.padded(1.0).contains(&Vector3::new(0.5, 3.0, 0.5)));
    }
}
