//! Error types for URDF parsing and loading.

use std::path::PathBuf;

use robovis_physics::PhysicsError;
use thiserror::Error;

use crate::mesh::MeshError;

/// Errors that can occur during URDF parsing and loading.
#[derive(Debug, Error)]
pub enum UrdfError {
    /// XML parsing error.
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// Missing required element.
    #[error("missing required element: {element} in {context}")]
    MissingElement {
        /// The missing element name.
        element: &'static str,
        /// Where the element was expected.
        context: String,
    },

    /// Missing required attribute.
    #[error("missing required attribute: {attribute} on {element}")]
    MissingAttribute {
        /// The missing attribute name.
        attribute: &'static str,
        /// The element that should have the attribute.
        element: String,
    },

    /// Invalid attribute value.
    #[error("invalid value for {attribute} on {element}: {message}")]
    InvalidAttribute {
        /// The attribute with the invalid value.
        attribute: &'static str,
        /// The element containing the attribute.
        element: String,
        /// Why the value was rejected.
        message: String,
    },

    /// Unknown joint type.
    #[error("unknown joint type: {0}")]
    UnknownJointType(String),

    /// Reference to undefined link.
    #[error("reference to undefined link: {link_name} in joint {joint_name}")]
    UndefinedLink {
        /// The link name that was referenced.
        link_name: String,
        /// The joint that referenced it.
        joint_name: String,
    },

    /// Duplicate link name.
    #[error("duplicate link name: {0}")]
    DuplicateLink(String),

    /// Duplicate joint name.
    #[error("duplicate joint name: {0}")]
    DuplicateJoint(String),

    /// A link is the child of two or more joints.
    #[error("link {0} has more than one parent joint")]
    MultipleParents(String),

    /// Links that cannot be reached from the root sit on a cycle.
    #[error("kinematic loop detected involving links {0:?}")]
    KinematicLoop(Vec<String>),

    /// No root link found.
    #[error("no root link found (all links are children of joints)")]
    NoRootLink,

    /// Multiple root links found.
    #[error("multiple root links found: {0:?}")]
    MultipleRootLinks(Vec<String>),

    /// Negative or non-finite link mass.
    #[error("invalid mass for link {link_name}: {mass}")]
    InvalidMass {
        /// The link with the invalid mass.
        link_name: String,
        /// The mass as written in the file.
        mass: f64,
    },

    /// A joint type or option the loader cannot simulate.
    #[error("unsupported URDF feature: {0}")]
    Unsupported(String),

    /// The URDF file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Path of the URDF file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A referenced mesh file could not be loaded.
    #[error("failed to load mesh {}: {source}", path.display())]
    Mesh {
        /// Resolved mesh path.
        path: PathBuf,
        /// Why loading failed.
        source: MeshError,
    },

    /// The converted articulation was rejected by the simulator.
    #[error(transparent)]
    Physics(#[from] PhysicsError),
}

impl UrdfError {
    /// Create a missing element error.
    pub fn missing_element(element: &'static str, context: impl Into<String>) -> Self {
        Self::MissingElement {
            element,
            context: context.into(),
        }
    }

    /// Create a missing attribute error.
    pub fn missing_attribute(attribute: &'static str, element: impl Into<String>) -> Self {
        Self::MissingAttribute {
            attribute,
            element: element.into(),
        }
    }

    /// Create an invalid attribute error.
    pub fn invalid_attribute(
        attribute: &'static str,
        element: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidAttribute {
            attribute,
            element: element.into(),
            message: message.into(),
        }
    }

    /// Create an undefined link error.
    pub fn undefined_link(link_name: impl Into<String>, joint_name: impl Into<String>) -> Self {
        Self::UndefinedLink {
            link_name: link_name.into(),
            joint_name: joint_name.into(),
        }
    }
}

/// Result type for URDF operations.
pub type Result<T> = std::result::Result<T, UrdfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = UrdfError::missing_element("parent", "joint 'j1'");
        assert!(err.to_string().contains("parent"));
        assert!(err.to_string().contains("j1"));

        let err = UrdfError::Io {
            path: PathBuf::from("/nope/robot.urdf"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.to_string().contains("/nope/robot.urdf"));
    }
}
