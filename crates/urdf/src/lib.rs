//! URDF loading for robovis.
//!
//! Parses a URDF document, validates its kinematic tree and builds a
//! [`robovis_physics::Articulation`] with visual and collision shapes.
//!
//! ```no_run
//! use robovis_physics::Scene;
//! use robovis_urdf::UrdfLoader;
//!
//! let mut scene = Scene::default();
//! let robot = UrdfLoader::new()
//!     .with_fix_root_link(true)
//!     .load(&mut scene, "robot/urdf/robot.urdf")?;
//! # Ok::<(), robovis_urdf::UrdfError>(())
//! ```

pub mod error;
pub mod loader;
pub mod mesh;
pub mod parser;
pub mod types;
pub mod validation;

pub use error::{Result, UrdfError};
pub use loader::{resolve_mesh_path, UrdfLoader};
pub use mesh::{load_mesh, MeshError};
pub use parser::parse_urdf_str;
pub use types::{
    UrdfCollision, UrdfGeometry, UrdfInertia, UrdfInertial, UrdfJoint, UrdfJointDynamics,
    UrdfJointLimit, UrdfJointType, UrdfLink, UrdfMaterial, UrdfOrigin, UrdfRobot, UrdfVisual,
};
pub use validation::{validate, KinematicTree};
