//! Articulated rigid-body dynamics for robovis.
//!
//! Links form a tree rooted at link 0. Forward dynamics uses Featherstone's
//! Articulated Body Algorithm with implicit drive terms; passive forces come
//! from Recursive Newton-Euler.

pub mod articulation;
pub mod dynamics;
pub mod error;
pub mod joint;
pub mod scene;
pub mod spatial;

pub use articulation::{Articulation, Link, DEFAULT_LINK_INERTIA, DEFAULT_LINK_MASS};
pub use dynamics::ForwardDynamics;
pub use error::{PhysicsError, Result};
pub use joint::{Joint, JointDrive, JointKind, JointLimits};
pub use scene::{
    ArticulationId, DirectionalLight, Ground, Lighting, RenderSnapshot, Scene, SceneConfig,
};
