//! Lit mesh pipeline: Blinn-Phong shading with per-draw model matrix and
//! colour, plus a procedural grid for the ground plane.

use crate::camera::CameraUniform;
use crate::context::{RenderContext, DEPTH_FORMAT};
use crate::mesh::vertex_buffer_layout;

/// Light uniform data.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    /// Direction the light travels (render space, normalized).
    pub direction: [f32; 4],
    /// Directional light colour.
    pub color: [f32; 4],
    /// Ambient light colour.
    pub ambient: [f32; 4],
    /// Camera/eye position (render space).
    pub eye_pos: [f32; 4],
}

const IDENTITY_MAT4: [[f32; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Per-draw material (must match Material in pbr.wgsl).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    /// Base colour (RGB) + alpha.
    pub base_color: [f32; 4],
    /// Roughness, specular strength, unused, grid flag.
    pub params: [f32; 4],
    /// Model matrix (object → render space).
    pub model: [[f32; 4]; 4],
}

impl MaterialUniform {
    /// Plastic-like material for link shapes.
    pub fn shape(color: [f32; 4]) -> Self {
        Self {
            base_color: color,
            params: [0.5, 0.4, 0.0, 0.0],
            model: IDENTITY_MAT4,
        }
    }

    /// Translucent overlay for collision shapes.
    pub fn collision() -> Self {
        Self {
            base_color: [0.1, 0.8, 0.3, 0.45],
            params: [0.9, 0.0, 0.0, 0.0],
            model: IDENTITY_MAT4,
        }
    }

    /// Ground plane material with grid flag.
    pub fn ground() -> Self {
        Self {
            base_color: [0.25, 0.27, 0.30, 1.0],
            params: [0.9, 0.0, 0.0, -1.0], // params.w < 0 triggers grid in shader
            model: IDENTITY_MAT4,
        }
    }

    /// Set model matrix, returning modified copy.
    pub fn with_model(mut self, model: [[f32; 4]; 4]) -> Self {
        self.model = model;
        self
    }
}

/// A material buffer and the bind group that reads it.
pub struct MaterialBind {
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl MaterialBind {
    pub fn update(&self, queue: &wgpu::Queue, uniform: &MaterialUniform) {
        queue.write_buffer(&self.buffer, 0, bytemuck::bytes_of(uniform));
    }
}

/// Render pipeline and shared camera/light buffers.
pub struct PbrPipeline {
    pub pipeline: wgpu::RenderPipeline,
    /// Alpha-blended variant for collision overlays.
    pub overlay_pipeline: wgpu::RenderPipeline,
    pub camera_buffer: wgpu::Buffer,
    pub light_buffer: wgpu::Buffer,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl PbrPipeline {
    pub fn new(ctx: &RenderContext) -> Self {
        let shader = ctx.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("PBR Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/pbr.wgsl").into()),
        });

        let camera_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Camera Uniform"),
            size: std::mem::size_of::<CameraUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let light_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Light Uniform"),
            size: std::mem::size_of::<LightUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_entry = |binding: u32, visibility: wgpu::ShaderStages| wgpu::BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        // Group 0: camera, light, material
        let bind_group_layout = ctx.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("PBR Bind Group Layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT),
                uniform_entry(1, wgpu::ShaderStages::FRAGMENT),
                uniform_entry(2, wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT),
            ],
        });

        let pipeline_layout = ctx.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("PBR Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let build = |label: &str, blend: wgpu::BlendState, depth_write: bool| {
            ctx.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[vertex_buffer_layout()],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: ctx.config.format,
                        blend: Some(blend),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    // Robot meshes are often not closed; shade both sides.
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: depth_write,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        let pipeline = build("PBR Pipeline", wgpu::BlendState::REPLACE, true);
        let overlay_pipeline = build("PBR Overlay Pipeline", wgpu::BlendState::ALPHA_BLENDING, false);

        Self {
            pipeline,
            overlay_pipeline,
            camera_buffer,
            light_buffer,
            bind_group_layout,
        }
    }

    /// Update camera uniform.
    pub fn update_camera(&self, queue: &wgpu::Queue, uniform: &CameraUniform) {
        queue.write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(uniform));
    }

    /// Update light uniform.
    pub fn update_light(&self, queue: &wgpu::Queue, uniform: &LightUniform) {
        queue.write_buffer(&self.light_buffer, 0, bytemuck::bytes_of(uniform));
    }

    /// Create a material bind group sharing the camera and light buffers.
    pub fn create_material_bind(&self, device: &wgpu::Device, label: &str) -> MaterialBind {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<MaterialUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.light_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: buffer.as_entire_binding(),
                },
            ],
        });
        MaterialBind { buffer, bind_group }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_sizes_match_wgsl_layout() {
        assert_eq!(std::mem::size_of::<CameraUniform>(), 208);
        assert_eq!(std::mem::size_of::<LightUniform>(), 64);
        assert_eq!(std::mem::size_of::<MaterialUniform>(), 96);
    }

    #[test]
    fn test_ground_sets_grid_flag() {
        assert!(MaterialUniform::ground().params[3] < 0.0);
        assert_eq!(MaterialUniform::shape([1.0; 4]).params[3], 0.0);
        let m = MaterialUniform::shape([1.0; 4]).with_model([[2.0; 4]; 4]);
        assert_eq!(m.model[3][3], 2.0);
    }
}
