//! Interactive viewer window for a [`Scene`].
//!
//! Controls: left drag orbits, middle or right drag pans, the wheel zooms,
//! `C` toggles collision shapes, `F` frames the robot, Escape closes.

use nalgebra::Isometry3;
use robovis_core::{render_model_matrix, to_y_up, z_up_to_y_up, Aabb};
use robovis_physics::{ArticulationId, RenderSnapshot, Scene};
use winit::event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{Key, NamedKey};

use crate::camera::{CameraUniform, OrbitCamera};
use crate::context::{RenderContext, RenderError};
use crate::mesh::{MeshCache, MeshKey};
use crate::pipelines::pbr::{LightUniform, MaterialBind, MaterialUniform, PbrPipeline};
use crate::primitives::{render_bounds, shape_bounds};

const GROUND_HALF_SIZE: f32 = 25.0;

/// One link shape to draw each frame.
struct ShapeDraw {
    articulation: ArticulationId,
    link: usize,
    local_pose: Isometry3<f64>,
    local_bounds: Aabb,
    mesh: MeshKey,
    material: MaterialUniform,
    bind: MaterialBind,
    collision: bool,
}

#[derive(Debug, Default)]
struct MouseState {
    left: bool,
    pan: bool,
    last: Option<(f64, f64)>,
}

pub struct Viewer {
    ctx: RenderContext,
    pbr: PbrPipeline,
    camera: OrbitCamera,
    meshes: MeshCache,
    shapes: Vec<ShapeDraw>,
    ground: Option<(MeshKey, MaterialBind)>,
    light: LightUniform,
    background: wgpu::Color,
    last_snapshot: RenderSnapshot,
    show_collisions: bool,
    mouse: MouseState,
    closed: bool,
}

impl Viewer {
    pub fn new(ctx: RenderContext) -> Self {
        let pbr = PbrPipeline::new(&ctx);
        Self {
            ctx,
            pbr,
            camera: OrbitCamera::new(),
            meshes: MeshCache::new(),
            shapes: Vec::new(),
            ground: None,
            light: light_uniform(&Scene::default()),
            background: wgpu::Color {
                r: 0.15,
                g: 0.17,
                b: 0.22,
                a: 1.0,
            },
            last_snapshot: RenderSnapshot::default(),
            show_collisions: false,
            mouse: MouseState::default(),
            closed: false,
        }
    }

    /// Upload the scene's ground, lights and link shapes. Call again after
    /// adding articulations.
    pub fn set_scene(&mut self, scene: &Scene, snapshot: &RenderSnapshot) {
        self.meshes.clear();
        self.shapes.clear();
        self.light = light_uniform(scene);

        self.ground = scene.ground().map(|ground| {
            let key = self
                .meshes
                .upload_ground(&self.ctx.device, GROUND_HALF_SIZE, ground.altitude as f32);
            let bind = self.pbr.create_material_bind(&self.ctx.device, "Ground Material");
            bind.update(
                &self.ctx.queue,
                &MaterialUniform::ground().with_model(z_up_to_y_up().to_cols_array_2d()),
            );
            (key, bind)
        });

        for (id, articulation) in scene.articulations() {
            for (li, link) in articulation.links().iter().enumerate() {
                let visuals = link.visuals.iter().map(|s| (s, false));
                let collisions = link.collisions.iter().map(|s| (s, true));
                for (shape, collision) in visuals.chain(collisions) {
                    let Some(mesh) = self.meshes.upload_shape(&self.ctx.device, &shape.geometry) else {
                        continue;
                    };
                    let material = if collision {
                        MaterialUniform::collision()
                    } else {
                        MaterialUniform::shape(shape.color)
                    };
                    let label = format!("{} Material", link.name);
                    self.shapes.push(ShapeDraw {
                        articulation: id,
                        link: li,
                        local_pose: shape.local_pose,
                        local_bounds: shape_bounds(&shape.geometry),
                        mesh,
                        material,
                        bind: self.pbr.create_material_bind(&self.ctx.device, &label),
                        collision,
                    });
                }
            }
        }

        self.last_snapshot = snapshot.clone();
        log::info!(
            "Viewer scene: {} shapes, {} meshes, {} triangles",
            self.shapes.len(),
            self.meshes.mesh_count(),
            self.meshes.total_triangles()
        );
    }

    /// Place the camera at a Z-up world position.
    pub fn set_camera_xyz(&mut self, x: f64, y: f64, z: f64) {
        self.camera.set_camera_xyz(x, y, z);
    }

    /// Orient the camera from Z-up roll/pitch/yaw (roll is ignored).
    pub fn set_camera_rpy(&mut self, roll: f64, pitch: f64, yaw: f64) {
        self.camera.set_camera_rpy(roll, pitch, yaw);
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut OrbitCamera {
        &mut self.camera
    }

    pub fn set_show_collisions(&mut self, show: bool) {
        self.show_collisions = show;
    }

    pub fn closed(&self) -> bool {
        self.closed
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Fit every visual shape in view.
    pub fn frame_robot(&mut self) {
        let mut bounds = Aabb::empty();
        for shape in self.shapes.iter().filter(|s| !s.collision) {
            if let Some(pose) = link_pose(&self.last_snapshot, shape.articulation, shape.link) {
                let b = render_bounds(&(pose * shape.local_pose), &shape.local_bounds);
                if !b.is_empty() {
                    bounds.expand(&b.min);
                    bounds.expand(&b.max);
                }
            }
        }
        self.camera.frame_aabb(&bounds);
    }

    /// Draw one frame with the given link poses.
    pub fn render(&mut self, snapshot: &RenderSnapshot) -> Result<(), RenderError> {
        self.last_snapshot.clone_from(snapshot);

        let output = match self.ctx.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("Surface lost; reconfiguring");
                self.ctx.reconfigure();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Surface timeout; skipping frame");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let ctx = &self.ctx;

        let cam_uniform = CameraUniform::from_camera(&self.camera, ctx.aspect());
        self.pbr.update_camera(&ctx.queue, &cam_uniform);
        self.light.eye_pos = cam_uniform.eye_pos;
        self.pbr.update_light(&ctx.queue, &self.light);

        let mut visible = vec![false; self.shapes.len()];
        for (i, shape) in self.shapes.iter().enumerate() {
            if shape.collision && !self.show_collisions {
                continue;
            }
            let Some(pose) = link_pose(snapshot, shape.articulation, shape.link) else {
                continue;
            };
            let model = render_model_matrix(&(pose * shape.local_pose));
            shape
                .bind
                .update(&ctx.queue, &shape.material.with_model(model.to_cols_array_2d()));
            visible[i] = true;
        }

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.background),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &ctx.depth_texture,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            render_pass.set_pipeline(&self.pbr.pipeline);
            if let Some((key, bind)) = &self.ground {
                if let Some(mesh) = self.meshes.get(key) {
                    render_pass.set_bind_group(0, &bind.bind_group, &[]);
                    mesh.draw(&mut render_pass);
                }
            }

            // Opaque visuals first, then translucent collision overlays.
            for overlay in [false, true] {
                if overlay {
                    render_pass.set_pipeline(&self.pbr.overlay_pipeline);
                }
                for (shape, _) in self
                    .shapes
                    .iter()
                    .zip(&visible)
                    .filter(|(s, v)| **v && s.collision == overlay)
                {
                    if let Some(mesh) = self.meshes.get(&shape.mesh) {
                        render_pass.set_bind_group(0, &shape.bind.bind_group, &[]);
                        mesh.draw(&mut render_pass);
                    }
                }
            }
        }

        ctx.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    /// Update viewer state from a window event. Returns `true` when the
    /// window needs a redraw it would not otherwise get.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::CloseRequested => {
                self.closed = true;
            }

            WindowEvent::Resized(new_size) => {
                self.ctx.resize(*new_size);
                return true;
            }

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key,
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => match logical_key.as_ref() {
                Key::Named(NamedKey::Escape) => {
                    self.closed = true;
                }
                Key::Character("c") | Key::Character("C") => {
                    self.show_collisions = !self.show_collisions;
                    log::info!(
                        "Collision shapes {}",
                        if self.show_collisions { "shown" } else { "hidden" }
                    );
                }
                Key::Character("f") | Key::Character("F") => {
                    self.frame_robot();
                }
                _ => {}
            },

            WindowEvent::MouseInput { state, button, .. } => {
                let pressed = *state == ElementState::Pressed;
                match button {
                    MouseButton::Left => self.mouse.left = pressed,
                    MouseButton::Middle | MouseButton::Right => self.mouse.pan = pressed,
                    _ => {}
                }
                if !pressed {
                    self.mouse.last = None;
                }
            }

            WindowEvent::CursorMoved { position, .. } => {
                if let Some((lx, ly)) = self.mouse.last {
                    let dx = (position.x - lx) as f32;
                    let dy = (position.y - ly) as f32;

                    if self.mouse.left {
                        self.camera.rotate(dx * 0.005, -dy * 0.005);
                    }
                    if self.mouse.pan {
                        self.camera.pan(-dx, dy);
                    }
                }
                self.mouse.last = Some((position.x, position.y));
            }

            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 * 0.01,
                };
                self.camera.zoom(scroll);
            }

            _ => {}
        }
        false
    }
}

fn link_pose(snapshot: &RenderSnapshot, id: ArticulationId, link: usize) -> Option<Isometry3<f64>> {
    snapshot.poses(id).and_then(|p| p.get(link)).copied()
}

/// Shader light parameters from the scene. The shader lights with the first
/// directional light only.
fn light_uniform(scene: &Scene) -> LightUniform {
    let lights = scene.lights();
    if lights.directional.len() > 1 {
        log::warn!(
            "{} directional lights in scene; only the first is rendered",
            lights.directional.len()
        );
    }
    let (direction, color) = match lights.directional.first() {
        Some(light) => (to_y_up(&light.direction).normalize_or_zero(), light.color),
        None => (glam::Vec3::NEG_Y, [0.0; 3]),
    };
    let a = lights.ambient;
    LightUniform {
        direction: [direction.x, direction.y, direction.z, 0.0],
        color: [color[0], color[1], color[2], 1.0],
        ambient: [a[0], a[1], a[2], 1.0],
        eye_pos: [0.0, 0.0, 0.0, 1.0],
    }
}
