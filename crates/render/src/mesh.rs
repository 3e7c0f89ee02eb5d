//! GPU mesh buffers, uploaded once per distinct shape.

use std::collections::HashMap;
use std::sync::Arc;

use robovis_core::{ShapeGeometry, Vertex};
use wgpu::util::DeviceExt;

use crate::primitives::{generate_ground_plane, shape_mesh};

/// Index and vertex buffers for one mesh.
pub struct GpuMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_indices: u32,
}

impl GpuMesh {
    pub fn upload(device: &wgpu::Device, label: &str, vertices: &[Vertex], indices: &[u32]) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Vertices")),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Indices")),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex_buffer,
            index_buffer,
            num_indices: indices.len() as u32,
        }
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.num_indices, 0, 0..1);
    }
}

/// Identity of a shape's triangulation. Primitives compare by dimensions,
/// loaded meshes by allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshKey {
    Box([u64; 3]),
    Cylinder(u64, u64),
    Sphere(u64),
    Mesh(usize),
    Ground(u32, u32),
}

impl MeshKey {
    pub fn for_geometry(geometry: &ShapeGeometry) -> Self {
        match geometry {
            ShapeGeometry::Box { half_extents: h } => {
                MeshKey::Box([h.x.to_bits(), h.y.to_bits(), h.z.to_bits()])
            }
            ShapeGeometry::Cylinder { radius, length } => {
                MeshKey::Cylinder(radius.to_bits(), length.to_bits())
            }
            ShapeGeometry::Sphere { radius } => MeshKey::Sphere(radius.to_bits()),
            ShapeGeometry::Mesh(mesh) => MeshKey::Mesh(Arc::as_ptr(mesh) as usize),
        }
    }
}

/// Shared GPU meshes. Links with identical shapes draw from one buffer pair.
#[derive(Default)]
pub struct MeshCache {
    meshes: HashMap<MeshKey, GpuMesh>,
}

impl MeshCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upload `geometry` unless an identical shape is already cached.
    /// Returns `None` for shapes with no triangles.
    pub fn upload_shape(&mut self, device: &wgpu::Device, geometry: &ShapeGeometry) -> Option<MeshKey> {
        let key = MeshKey::for_geometry(geometry);
        if !self.meshes.contains_key(&key) {
            let (vertices, indices) = shape_mesh(geometry);
            if indices.is_empty() {
                return None;
            }
            self.meshes
                .insert(key, GpuMesh::upload(device, &format!("{key:?}"), &vertices, &indices));
        }
        Some(key)
    }

    pub fn upload_ground(&mut self, device: &wgpu::Device, half_size: f32, altitude: f32) -> MeshKey {
        let key = MeshKey::Ground(half_size.to_bits(), altitude.to_bits());
        self.meshes.entry(key).or_insert_with(|| {
            let (vertices, indices) = generate_ground_plane(half_size, altitude);
            GpuMesh::upload(device, "Ground", &vertices, &indices)
        });
        key
    }

    pub fn get(&self, key: &MeshKey) -> Option<&GpuMesh> {
        self.meshes.get(key)
    }

    pub fn clear(&mut self) {
        self.meshes.clear();
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Total number of triangles across all cached meshes.
    pub fn total_triangles(&self) -> u32 {
        self.meshes.values().map(|m| m.num_indices / 3).sum()
    }
}

/// Vertex buffer layout for Vertex struct.
pub fn vertex_buffer_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            // position
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            },
            // normal
            wgpu::VertexAttribute {
                offset: 12,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x3,
            },
        ],
    }
}
