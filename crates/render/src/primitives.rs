//! Triangle meshes for link shapes and the ground plane.
//!
//! All meshes are built in the shape's own Z-up frame; the model matrix
//! carries them into render space.

use nalgebra::{Isometry3, Point3, Vector3};
use robovis_core::{Aabb, ShapeGeometry, Vertex};

const CYLINDER_SEGMENTS: u32 = 24;
const SPHERE_STACKS: u32 = 12;
const SPHERE_SECTORS: u32 = 24;

/// Generate a cylinder mesh along the Z axis, centered at the origin.
pub fn generate_cylinder(radius: f32, height: f32, segments: u32) -> (Vec<Vertex>, Vec<u32>) {
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    let half_h = height / 2.0;

    // Side
    for i in 0..=segments {
        let angle = (i as f32 / segments as f32) * std::f32::consts::TAU;
        let (sin_a, cos_a) = angle.sin_cos();
        let normal = [cos_a, sin_a, 0.0];
        vertices.push(Vertex {
            position: [radius * cos_a, radius * sin_a, -half_h],
            normal,
        });
        vertices.push(Vertex {
            position: [radius * cos_a, radius * sin_a, half_h],
            normal,
        });
    }
    for i in 0..segments {
        let base = i * 2;
        indices.extend_from_slice(&[base, base + 2, base + 1, base + 1, base + 2, base + 3]);
    }

    // Caps: +Z wound counter-clockwise seen from above, -Z reversed.
    for (z, nz) in [(half_h, 1.0f32), (-half_h, -1.0)] {
        let center = vertices.len() as u32;
        vertices.push(Vertex {
            position: [0.0, 0.0, z],
            normal: [0.0, 0.0, nz],
        });
        for i in 0..=segments {
            let angle = (i as f32 / segments as f32) * std::f32::consts::TAU;
            let (sin_a, cos_a) = angle.sin_cos();
            vertices.push(Vertex {
                position: [radius * cos_a, radius * sin_a, z],
                normal: [0.0, 0.0, nz],
            });
        }
        for i in 0..segments {
            if nz > 0.0 {
                indices.extend_from_slice(&[center, center + 1 + i, center + 2 + i]);
            } else {
                indices.extend_from_slice(&[center, center + 2 + i, center + 1 + i]);
            }
        }
    }

    (vertices, indices)
}

/// Generate a box mesh with given half-extents, centered at origin.
pub fn generate_box(hx: f32, hy: f32, hz: f32) -> (Vec<Vertex>, Vec<u32>) {
    let positions = [
        // +Z
        ([-hx, -hy, hz], [0.0, 0.0, 1.0]),
        ([hx, -hy, hz], [0.0, 0.0, 1.0]),
        ([hx, hy, hz], [0.0, 0.0, 1.0]),
        ([-hx, hy, hz], [0.0, 0.0, 1.0]),
        // -Z
        ([hx, -hy, -hz], [0.0, 0.0, -1.0]),
        ([-hx, -hy, -hz], [0.0, 0.0, -1.0]),
        ([-hx, hy, -hz], [0.0, 0.0, -1.0]),
        ([hx, hy, -hz], [0.0, 0.0, -1.0]),
        // +Y
        ([-hx, hy, hz], [0.0, 1.0, 0.0]),
        ([hx, hy, hz], [0.0, 1.0, 0.0]),
        ([hx, hy, -hz], [0.0, 1.0, 0.0]),
        ([-hx, hy, -hz], [0.0, 1.0, 0.0]),
        // -Y
        ([-hx, -hy, -hz], [0.0, -1.0, 0.0]),
        ([hx, -hy, -hz], [0.0, -1.0, 0.0]),
        ([hx, -hy, hz], [0.0, -1.0, 0.0]),
        ([-hx, -hy, hz], [0.0, -1.0, 0.0]),
        // +X
        ([hx, -hy, hz], [1.0, 0.0, 0.0]),
        ([hx, -hy, -hz], [1.0, 0.0, 0.0]),
        ([hx, hy, -hz], [1.0, 0.0, 0.0]),
        ([hx, hy, hz], [1.0, 0.0, 0.0]),
        // -X
        ([-hx, -hy, -hz], [-1.0, 0.0, 0.0]),
        ([-hx, -hy, hz], [-1.0, 0.0, 0.0]),
        ([-hx, hy, hz], [-1.0, 0.0, 0.0]),
        ([-hx, hy, -hz], [-1.0, 0.0, 0.0]),
    ];

    let vertices: Vec<Vertex> = positions
        .iter()
        .map(|(p, n)| Vertex {
            position: *p,
            normal: *n,
        })
        .collect();

    let mut indices = Vec::new();
    for face in 0..6 {
        let base = face * 4;
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    (vertices, indices)
}

/// UV sphere centered at the origin.
pub fn generate_sphere(radius: f32, stacks: u32, sectors: u32) -> (Vec<Vertex>, Vec<u32>) {
    let mut vertices = Vec::with_capacity(((stacks + 1) * (sectors + 1)) as usize);
    let mut indices = Vec::new();

    for i in 0..=stacks {
        // Polar angle from +Z.
        let theta = std::f32::consts::PI * i as f32 / stacks as f32;
        let (sin_t, cos_t) = theta.sin_cos();
        for j in 0..=sectors {
            let phi = std::f32::consts::TAU * j as f32 / sectors as f32;
            let (sin_p, cos_p) = phi.sin_cos();
            let n = [sin_t * cos_p, sin_t * sin_p, cos_t];
            vertices.push(Vertex {
                position: [radius * n[0], radius * n[1], radius * n[2]],
                normal: n,
            });
        }
    }

    let row = sectors + 1;
    for i in 0..stacks {
        for j in 0..sectors {
            let a = i * row + j;
            let b = a + row;
            if i != 0 {
                indices.extend_from_slice(&[a, b, a + 1]);
            }
            if i != stacks - 1 {
                indices.extend_from_slice(&[a + 1, b, b + 1]);
            }
        }
    }

    (vertices, indices)
}

/// Square ground quad at height `altitude`, facing +Z.
pub fn generate_ground_plane(half_size: f32, altitude: f32) -> (Vec<Vertex>, Vec<u32>) {
    let n = [0.0, 0.0, 1.0];
    let vertices = vec![
        Vertex { position: [-half_size, -half_size, altitude], normal: n },
        Vertex { position: [half_size, -half_size, altitude], normal: n },
        Vertex { position: [half_size, half_size, altitude], normal: n },
        Vertex { position: [-half_size, half_size, altitude], normal: n },
    ];
    (vertices, vec![0, 1, 2, 0, 2, 3])
}

/// Triangulate a link shape.
pub fn shape_mesh(geometry: &ShapeGeometry) -> (Vec<Vertex>, Vec<u32>) {
    match geometry {
        ShapeGeometry::Box { half_extents: h } => generate_box(h.x as f32, h.y as f32, h.z as f32),
        ShapeGeometry::Cylinder { radius, length } => {
            generate_cylinder(*radius as f32, *length as f32, CYLINDER_SEGMENTS)
        }
        ShapeGeometry::Sphere { radius } => {
            generate_sphere(*radius as f32, SPHERE_STACKS, SPHERE_SECTORS)
        }
        ShapeGeometry::Mesh(mesh) => (mesh.vertices(), mesh.indices.clone()),
    }
}

/// Bounding box of a shape in its own frame.
pub fn shape_bounds(geometry: &ShapeGeometry) -> Aabb {
    match geometry {
        ShapeGeometry::Box { half_extents } => Aabb::new(-half_extents, *half_extents),
        ShapeGeometry::Cylinder { radius, length } => {
            let h = Vector3::new(*radius, *radius, length * 0.5);
            Aabb::new(-h, h)
        }
        ShapeGeometry::Sphere { radius } => {
            Aabb::new(Vector3::repeat(-radius), Vector3::repeat(*radius))
        }
        ShapeGeometry::Mesh(mesh) => mesh.bounds(),
    }
}

/// Render-space bounds of a shape-local box placed at a Z-up world pose.
pub fn render_bounds(world: &Isometry3<f64>, local: &Aabb) -> Aabb {
    let mut out = Aabb::empty();
    if local.is_empty() {
        return out;
    }
    for i in 0..8 {
        let corner = Point3::new(
            if i & 1 == 0 { local.min.x } else { local.max.x },
            if i & 2 == 0 { local.min.y } else { local.max.y },
            if i & 4 == 0 { local.min.z } else { local.max.z },
        );
        let w = world * corner;
        out.expand(&Vector3::new(w.x, w.z, -w.y));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Vec3;
    use robovis_core::TriMesh;
    use std::sync::Arc;

    fn v(a: [f32; 3]) -> Vec3 {
        Vec3::from_array(a)
    }

    /// Every triangle's winding normal agrees with its vertex normals.
    fn assert_outward(vertices: &[Vertex], indices: &[u32]) {
        for tri in indices.chunks(3) {
            let [a, b, c] = [0, 1, 2].map(|k| vertices[tri[k] as usize]);
            let face = (v(b.position) - v(a.position)).cross(v(c.position) - v(a.position));
            if face.length() < 1e-9 {
                continue;
            }
            let avg = v(a.normal) + v(b.normal) + v(c.normal);
            assert!(face.dot(avg) > 0.0, "inward triangle {tri:?}");
        }
    }

    #[test]
    fn test_box() {
        let (verts, idx) = generate_box(0.1, 0.2, 0.3);
        assert_eq!(verts.len(), 24);
        assert_eq!(idx.len(), 36);
        assert_outward(&verts, &idx);
        for vert in &verts {
            assert_relative_eq!(vert.position[2].abs(), 0.3);
        }
    }

    #[test]
    fn test_cylinder_runs_along_z() {
        let (verts, idx) = generate_cylinder(0.05, 0.4, 16);
        assert_outward(&verts, &idx);
        let max_z = verts.iter().map(|v| v.position[2]).fold(f32::MIN, f32::max);
        assert_relative_eq!(max_z, 0.2);
        for vert in &verts {
            let r = (vert.position[0].powi(2) + vert.position[1].powi(2)).sqrt();
            assert!(r <= 0.05 + 1e-6);
        }
        assert_eq!(idx.iter().max().copied(), Some(verts.len() as u32 - 1));
    }

    #[test]
    fn test_sphere() {
        let (verts, idx) = generate_sphere(0.5, 8, 16);
        assert_outward(&verts, &idx);
        for vert in &verts {
            assert_relative_eq!(v(vert.position).length(), 0.5, epsilon = 1e-5);
        }
        // Poles contribute one triangle per sector, other bands two.
        assert_eq!(idx.len() / 3, 16 * (2 * 8 - 2));
    }

    #[test]
    fn test_ground_plane_faces_up() {
        let (verts, idx) = generate_ground_plane(10.0, 0.0);
        assert_outward(&verts, &idx);
        assert!(verts.iter().all(|v| v.position[2] == 0.0));
    }

    #[test]
    fn test_shape_mesh_and_bounds() {
        let tri = TriMesh::from_triangles(&[[
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 2.0, 0.0),
        ]]);
        let mesh = ShapeGeometry::Mesh(Arc::new(tri));
        let (verts, idx) = shape_mesh(&mesh);
        assert_eq!((verts.len(), idx.len()), (3, 3));
        let b = shape_bounds(&mesh);
        assert_eq!(b.max, Vector3::new(1.0, 2.0, 0.0));

        let cyl = shape_bounds(&ShapeGeometry::Cylinder { radius: 0.1, length: 1.0 });
        assert_eq!(cyl.max, Vector3::new(0.1, 0.1, 0.5));
        assert_eq!(cyl.min, Vector3::new(-0.1, -0.1, -0.5));
    }

    #[test]
    fn test_render_bounds_swaps_axes() {
        let local = Aabb::new(Vector3::new(-0.1, -0.2, 0.0), Vector3::new(0.1, 0.2, 1.0));
        let world = Isometry3::translation(1.0, 2.0, 3.0);
        let b = render_bounds(&world, &local);
        // Z-up (x, y, z) is render (x, z, -y).
        assert_relative_eq!(b.min, Vector3::new(0.9, 3.0, -2.2), epsilon = 1e-12);
        assert_relative_eq!(b.max, Vector3::new(1.1, 4.0, -1.8), epsilon = 1e-12);
        assert!(render_bounds(&world, &Aabb::empty()).is_empty());
    }
}
