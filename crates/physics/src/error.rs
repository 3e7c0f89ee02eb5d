//! Error types for articulation building and simulation.

use thiserror::Error;

/// Result alias for physics operations.
pub type Result<T> = std::result::Result<T, PhysicsError>;

/// Errors raised by articulation setters, builders and the scene.
#[derive(Debug, Error, PartialEq)]
pub enum PhysicsError {
    /// A joint-space vector has the wrong length.
    #[error("expected {expected} values for {what}, got {got}")]
    DimensionMismatch {
        /// The quantity being set (qpos, qvel, ...).
        what: &'static str,
        /// Number of active joints.
        expected: usize,
        /// Length of the supplied vector.
        got: usize,
    },

    /// A value that must be finite was NaN or infinite.
    #[error("non-finite value in {0}")]
    NonFinite(&'static str),

    /// No active joint with the given name.
    #[error("no active joint named {0}")]
    UnknownJoint(String),

    /// A link refers to a parent that has not been added yet.
    #[error("link {name} references parent index {parent}, which is not defined before it")]
    InvalidParent {
        /// Offending link.
        name: String,
        /// Parent index it referenced.
        parent: usize,
    },

    /// The articulation has no links, or more than one root.
    #[error("articulation {name} must have exactly one root link, found {roots}")]
    RootCount {
        /// Articulation name.
        name: String,
        /// Number of parentless links.
        roots: usize,
    },

    /// The timestep must be positive and finite.
    #[error("timestep must be positive and finite, got {0}")]
    InvalidTimestep(f64),

    /// The floating root's articulated inertia could not be inverted.
    #[error("singular articulated inertia at the root of {0}")]
    SingularRootInertia(String),

    /// The articulation id does not belong to this scene.
    #[error("unknown articulation id {0}")]
    UnknownArticulation(usize),
}
