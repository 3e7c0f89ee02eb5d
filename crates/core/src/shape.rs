//! Visual and collision shape descriptions attached to articulation links.

use std::sync::Arc;

use nalgebra::{Isometry3, Vector3};

use crate::{Aabb, Vertex};

/// Flat-shaded triangle mesh in link-local coordinates (meters).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriMesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl TriMesh {
    /// Build a flat-shaded mesh from triangle corner triples.
    ///
    /// Normals are recomputed from the winding; file-provided normals are
    /// often wrong and are ignored.
    pub fn from_triangles(triangles: &[[Vector3<f32>; 3]]) -> Self {
        let mut mesh = Self {
            positions: Vec::with_capacity(triangles.len() * 3),
            normals: Vec::with_capacity(triangles.len() * 3),
            indices: Vec::with_capacity(triangles.len() * 3),
        };
        for [a, b, c] in triangles {
            let n = (b - a).cross(&(c - a));
            let n = if n.norm() > 1e-12 { n.normalize() } else { Vector3::z() };
            for v in [a, b, c] {
                mesh.indices.push(mesh.positions.len() as u32);
                mesh.positions.push([v.x, v.y, v.z]);
                mesh.normals.push([n.x, n.y, n.z]);
            }
        }
        mesh
    }

    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Interleave positions and normals for GPU upload.
    pub fn vertices(&self) -> Vec<Vertex> {
        self.positions
            .iter()
            .zip(self.normals.iter())
            .map(|(p, n)| Vertex {
                position: *p,
                normal: *n,
            })
            .collect()
    }

    pub fn bounds(&self) -> Aabb {
        let mut aabb = Aabb::empty();
        for p in &self.positions {
            aabb.expand(&Vector3::new(p[0] as f64, p[1] as f64, p[2] as f64));
        }
        aabb
    }
}

/// Geometry of a link shape. Primitives are centered on the shape origin;
/// cylinders run along the local Z axis (URDF convention).
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeGeometry {
    Box { half_extents: Vector3<f64> },
    Cylinder { radius: f64, length: f64 },
    Sphere { radius: f64 },
    Mesh(Arc<TriMesh>),
}

/// A shape rigidly attached to a link.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualShape {
    /// Shape origin in the link frame.
    pub local_pose: Isometry3<f64>,
    pub geometry: ShapeGeometry,
    /// RGBA tint.
    pub color: [f32; 4],
}

impl VisualShape {
    pub const DEFAULT_COLOR: [f32; 4] = [0.7, 0.7, 0.72, 1.0];

    pub fn new(local_pose: Isometry3<f64>, geometry: ShapeGeometry) -> Self {
        Self {
            local_pose,
            geometry,
            color: Self::DEFAULT_COLOR,
        }
    }

    pub fn with_color(mut self, color: [f32; 4]) -> Self {
        self.color = color;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_normals_follow_winding() {
        let tri = [[
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
        ]];
        let mesh = TriMesh::from_triangles(&tri);
        assert_eq!(mesh.num_triangles(), 1);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        for n in &mesh.normals {
            assert_eq!(*n, [0.0, 0.0, 1.0]);
        }
        let b = mesh.bounds();
        assert_eq!(b.max, Vector3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_degenerate_triangle_gets_fallback_normal() {
        let p = Vector3::new(1.0, 1.0, 1.0);
        let mesh = TriMesh::from_triangles(&[[p, p, p]]);
        assert_eq!(mesh.normals[0], [0.0, 0.0, 1.0]);
    }
}
