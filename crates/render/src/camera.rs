//! Orbit camera with projection matrices.
//!
//! The camera lives in render (Y-up) space. [`OrbitCamera::set_camera_xyz`]
//! and [`OrbitCamera::set_camera_rpy`] accept Z-up world coordinates: yaw
//! turns about +Z and positive pitch looks up.

use glam::{Mat4, Vec3};
use nalgebra::Vector3;
use robovis_core::{to_y_up, Aabb};

const PITCH_LIMIT: f32 = 1.5;
const MIN_DISTANCE: f32 = 0.1;
const MAX_DISTANCE: f32 = 50.0;

/// Orbit camera that revolves around a target point.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitCamera {
    /// Target point (render space).
    pub target: Vec3,
    /// Distance from target.
    pub distance: f32,
    /// Azimuth angle (rad), horizontal rotation.
    pub yaw: f32,
    /// Elevation angle (rad); positive places the eye above the target.
    pub pitch: f32,
    /// Vertical FOV (rad).
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl OrbitCamera {
    pub fn new() -> Self {
        Self {
            target: Vec3::new(0.0, 0.4, 0.0),
            distance: 2.0,
            yaw: 0.7,
            pitch: 0.35,
            fov: std::f32::consts::FRAC_PI_4,
            near: 0.01,
            far: 100.0,
        }
    }

    /// Camera position in render space.
    pub fn eye(&self) -> Vec3 {
        self.target + self.eye_offset()
    }

    fn eye_offset(&self) -> Vec3 {
        let x = self.distance * self.pitch.cos() * self.yaw.sin();
        let y = self.distance * self.pitch.sin();
        let z = self.distance * self.pitch.cos() * self.yaw.cos();
        Vec3::new(x, y, z)
    }

    /// Unit view direction in render space.
    pub fn forward(&self) -> Vec3 {
        (self.target - self.eye()).normalize_or_zero()
    }

    /// View matrix (world → camera).
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov, aspect, self.near, self.far)
    }

    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    /// Rotate camera by delta yaw/pitch (from mouse drag).
    pub fn rotate(&mut self, delta_yaw: f32, delta_pitch: f32) {
        self.yaw += delta_yaw;
        self.pitch = (self.pitch + delta_pitch).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Zoom (change distance).
    pub fn zoom(&mut self, delta: f32) {
        self.distance = (self.distance * (1.0 - delta * 0.1)).clamp(MIN_DISTANCE, MAX_DISTANCE);
    }

    /// Pan (move target) in the view plane.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        let right = Vec3::new(self.yaw.cos(), 0.0, -self.yaw.sin());
        let up = Vec3::Y;
        self.target += right * dx * self.distance * 0.002;
        self.target += up * dy * self.distance * 0.002;
    }

    /// Move the eye to `eye` (render space), keeping the view direction.
    pub fn set_eye(&mut self, eye: Vec3) {
        let forward = self.forward();
        self.target = eye + forward * self.distance;
    }

    /// Point the camera along `forward` (render space), keeping the eye fixed.
    pub fn look_along(&mut self, forward: Vec3) {
        let f = forward.normalize_or_zero();
        if f == Vec3::ZERO {
            return;
        }
        let eye = self.eye();
        self.pitch = (-f.y).clamp(-1.0, 1.0).asin().clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.yaw = (-f.x).atan2(-f.z);
        self.target = eye - self.eye_offset();
    }

    /// Place the eye at a Z-up world position.
    pub fn set_camera_xyz(&mut self, x: f64, y: f64, z: f64) {
        self.set_eye(to_y_up(&Vector3::new(x, y, z)));
    }

    /// Orient the camera from Z-up roll/pitch/yaw. Roll is ignored: the
    /// orbit camera always keeps the horizon level.
    pub fn set_camera_rpy(&mut self, _roll: f64, pitch: f64, yaw: f64) {
        let forward = Vector3::new(pitch.cos() * yaw.cos(), pitch.cos() * yaw.sin(), pitch.sin());
        self.look_along(to_y_up(&forward));
    }

    /// Fit a render-space bounding box in view, keeping the current angles.
    pub fn frame_aabb(&mut self, bounds: &Aabb) {
        if bounds.is_empty() {
            return;
        }
        let c = bounds.center();
        let radius = bounds.half_extents().norm().max(0.05) as f32;
        self.target = Vec3::new(c.x as f32, c.y as f32, c.z as f32);
        self.distance = (radius / (self.fov * 0.5).sin() * 1.1).clamp(MIN_DISTANCE, MAX_DISTANCE);
    }
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new()
    }
}

/// GPU-uploadable camera uniform.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub eye_pos: [f32; 4], // w unused, for alignment
}

impl CameraUniform {
    pub fn from_camera(camera: &OrbitCamera, aspect: f32) -> Self {
        let view = camera.view_matrix();
        let proj = camera.projection_matrix(aspect);
        let eye = camera.eye();

        Self {
            view_proj: camera.view_projection(aspect).to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            proj: proj.to_cols_array_2d(),
            eye_pos: [eye.x, eye.y, eye.z, 1.0],
        }
    }
}
