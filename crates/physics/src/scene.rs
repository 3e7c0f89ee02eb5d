//! Simulation scene: timestep, gravity, lights, ground and articulations.

use nalgebra::{Isometry3, Vector3};
use robovis_core::GRAVITY;

use crate::articulation::Articulation;
use crate::error::{PhysicsError, Result};

/// Scene construction parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneConfig {
    pub gravity: Vector3<f64>,
    pub default_timestep: f64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            gravity: GRAVITY,
            default_timestep: 1.0 / 240.0,
        }
    }
}

/// Handle to an articulation added to a [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArticulationId(usize);

impl ArticulationId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Infinite horizontal ground plane. Visual only: nothing collides with it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ground {
    pub altitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Direction the light travels, in the Z-up world frame (not normalized).
    pub direction: Vector3<f64>,
    pub color: [f32; 3],
}

/// Scene lighting.
#[derive(Debug, Clone, PartialEq)]
pub struct Lighting {
    pub ambient: [f32; 3],
    pub directional: Vec<DirectionalLight>,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            ambient: [0.0; 3],
            directional: Vec::new(),
        }
    }
}

/// World poses of every link, captured for rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderSnapshot {
    /// Simulated time at capture (s).
    pub time: f64,
    /// Link world poses, one list per articulation in id order.
    pub link_poses: Vec<Vec<Isometry3<f64>>>,
}

impl RenderSnapshot {
    pub fn poses(&self, id: ArticulationId) -> Option<&[Isometry3<f64>]> {
        self.link_poses.get(id.0).map(Vec::as_slice)
    }
}

#[derive(Debug)]
pub struct Scene {
    gravity: Vector3<f64>,
    timestep: f64,
    time: f64,
    steps: u64,
    ground: Option<Ground>,
    lighting: Lighting,
    articulations: Vec<Articulation>,
}

impl Scene {
    pub fn new(config: SceneConfig) -> Self {
        Self {
            gravity: config.gravity,
            timestep: config.default_timestep,
            time: 0.0,
            steps: 0,
            ground: None,
            lighting: Lighting::default(),
            articulations: Vec::new(),
        }
    }

    pub fn gravity(&self) -> Vector3<f64> {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vector3<f64>) {
        self.gravity = gravity;
    }

    pub fn timestep(&self) -> f64 {
        self.timestep
    }

    pub fn set_timestep(&mut self, dt: f64) -> Result<()> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(PhysicsError::InvalidTimestep(dt));
        }
        self.timestep = dt;
        Ok(())
    }

    /// Simulated time (s).
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn step_count(&self) -> u64 {
        self.steps
    }

    pub fn add_ground(&mut self, altitude: f64) {
        self.ground = Some(Ground { altitude });
    }

    pub fn ground(&self) -> Option<Ground> {
        self.ground
    }

    pub fn set_ambient_light(&mut self, color: [f32; 3]) {
        self.lighting.ambient = color;
    }

    pub fn add_directional_light(&mut self, direction: Vector3<f64>, color: [f32; 3]) {
        self.lighting.directional.push(DirectionalLight { direction, color });
    }

    pub fn lights(&self) -> &Lighting {
        &self.lighting
    }

    pub fn add_articulation(&mut self, articulation: Articulation) -> ArticulationId {
        log::debug!(
            "Adding articulation {} ({} links, {} dof)",
            articulation.name(),
            articulation.links().len(),
            articulation.dof()
        );
        self.articulations.push(articulation);
        ArticulationId(self.articulations.len() - 1)
    }

    pub fn articulation(&self, id: ArticulationId) -> Result<&Articulation> {
        self.articulations
            .get(id.0)
            .ok_or(PhysicsError::UnknownArticulation(id.0))
    }

    pub fn articulation_mut(&mut self, id: ArticulationId) -> Result<&mut Articulation> {
        self.articulations
            .get_mut(id.0)
            .ok_or(PhysicsError::UnknownArticulation(id.0))
    }

    pub fn articulations(&self) -> impl Iterator<Item = (ArticulationId, &Articulation)> {
        self.articulations
            .iter()
            .enumerate()
            .map(|(i, a)| (ArticulationId(i), a))
    }

    /// Advance every articulation by one timestep.
    pub fn step(&mut self) -> Result<()> {
        let dt = self.timestep;
        let g = self.gravity;
        for art in &mut self.articulations {
            art.step(dt, &g)?;
        }
        self.time += dt;
        self.steps += 1;
        Ok(())
    }

    /// Capture the current link poses for the renderer.
    pub fn update_render(&self) -> RenderSnapshot {
        RenderSnapshot {
            time: self.time,
            link_poses: self.articulations.iter().map(Articulation::link_poses).collect(),
        }
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(SceneConfig::default())
    }
}
