//! Parsed URDF document.
//!
//! These types mirror the XML schema; [`crate::loader`] turns them into an
//! [`robovis_physics::Articulation`].

use nalgebra::{Isometry3, Matrix3, Translation3, UnitQuaternion, Vector3};

/// `<origin xyz=".." rpy=".."/>`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UrdfOrigin {
    pub xyz: Vector3<f64>,
    /// Roll-pitch-yaw in radians.
    pub rpy: Vector3<f64>,
}

impl Default for UrdfOrigin {
    fn default() -> Self {
        Self {
            xyz: Vector3::zeros(),
            rpy: Vector3::zeros(),
        }
    }
}

impl UrdfOrigin {
    pub fn new(xyz: Vector3<f64>, rpy: Vector3<f64>) -> Self {
        Self { xyz, rpy }
    }

    /// URDF uses fixed-axis XYZ: roll about X, then pitch about Y, then yaw about Z.
    pub fn rotation(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_euler_angles(self.rpy.x, self.rpy.y, self.rpy.z)
    }

    /// Rigid transform with the translation multiplied by `scale`.
    pub fn to_isometry(&self, scale: f64) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::from(self.xyz * scale), self.rotation())
    }
}

/// `<inertial>`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UrdfInertial {
    /// Center of mass frame in the link frame.
    pub origin: UrdfOrigin,
    pub mass: f64,
    pub inertia: UrdfInertia,
}

/// Upper triangle of the symmetric inertia tensor, about the COM in the
/// inertial frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UrdfInertia {
    pub ixx: f64,
    pub ixy: f64,
    pub ixz: f64,
    pub iyy: f64,
    pub iyz: f64,
    pub izz: f64,
}

impl UrdfInertia {
    pub fn to_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.ixx, self.ixy, self.ixz, //
            self.ixy, self.iyy, self.iyz, //
            self.ixz, self.iyz, self.izz,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UrdfGeometry {
    /// Full edge lengths.
    Box { size: Vector3<f64> },
    /// Cylinder along the local Z axis.
    Cylinder { radius: f64, length: f64 },
    Sphere { radius: f64 },
    Mesh {
        filename: String,
        scale: Option<Vector3<f64>>,
    },
}

/// `<material>`, either defined inline or referenced by name.
#[derive(Debug, Clone, PartialEq)]
pub struct UrdfMaterial {
    pub name: String,
    /// RGBA in `[0, 1]`.
    pub color: Option<[f64; 4]>,
}

impl UrdfMaterial {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UrdfVisual {
    pub name: Option<String>,
    pub origin: UrdfOrigin,
    pub geometry: UrdfGeometry,
    pub material: Option<UrdfMaterial>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UrdfCollision {
    pub name: Option<String>,
    pub origin: UrdfOrigin,
    pub geometry: UrdfGeometry,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UrdfLink {
    pub name: String,
    pub inertial: Option<UrdfInertial>,
    pub visuals: Vec<UrdfVisual>,
    pub collisions: Vec<UrdfCollision>,
}

impl UrdfLink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inertial: None,
            visuals: Vec::new(),
            collisions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrdfJointType {
    Fixed,
    Revolute,
    Continuous,
    Prismatic,
    Floating,
    Planar,
}

impl std::str::FromStr for UrdfJointType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(Self::Fixed),
            "revolute" => Ok(Self::Revolute),
            "continuous" => Ok(Self::Continuous),
            "prismatic" => Ok(Self::Prismatic),
            "floating" => Ok(Self::Floating),
            "planar" => Ok(Self::Planar),
            _ => Err(()),
        }
    }
}

/// `<limit>`. Missing attributes default to zero as in the URDF schema.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UrdfJointLimit {
    pub lower: f64,
    pub upper: f64,
    pub effort: f64,
    pub velocity: f64,
}

/// `<dynamics>`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UrdfJointDynamics {
    pub damping: f64,
    pub friction: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UrdfJoint {
    pub name: String,
    pub joint_type: UrdfJointType,
    pub parent: String,
    pub child: String,
    /// Joint frame in the parent link frame.
    pub origin: UrdfOrigin,
    /// Axis in the joint frame. Defaults to +X per the URDF schema.
    pub axis: Vector3<f64>,
    pub limit: Option<UrdfJointLimit>,
    pub dynamics: Option<UrdfJointDynamics>,
}

/// A parsed `<robot>`.
#[derive(Debug, Clone, PartialEq)]
pub struct UrdfRobot {
    pub name: String,
    pub links: Vec<UrdfLink>,
    pub joints: Vec<UrdfJoint>,
    /// Materials declared at robot level, referenced by name from visuals.
    pub materials: Vec<UrdfMaterial>,
}

impl UrdfRobot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            links: Vec::new(),
            joints: Vec::new(),
            materials: Vec::new(),
        }
    }

    pub fn link(&self, name: &str) -> Option<&UrdfLink> {
        self.links.iter().find(|l| l.name == name)
    }

    pub fn joint(&self, name: &str) -> Option<&UrdfJoint> {
        self.joints.iter().find(|j| j.name == name)
    }

    pub fn material(&self, name: &str) -> Option<&UrdfMaterial> {
        self.materials.iter().find(|m| m.name == name)
    }

    /// Colour for a visual: its inline colour, else the robot-level material
    /// of the same name.
    pub fn resolve_color(&self, visual: &UrdfVisual) -> Option<[f64; 4]> {
        let material = visual.material.as_ref()?;
        material
            .color
            .or_else(|| self.material(&material.name).and_then(|m| m.color))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rpy_is_fixed_axis_xyz() {
        let origin = UrdfOrigin::new(Vector3::zeros(), Vector3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2));
        assert_relative_eq!(origin.rotation() * Vector3::x(), Vector3::y(), epsilon = 1e-12);

        let origin = UrdfOrigin::new(Vector3::new(1.0, 2.0, 3.0), Vector3::zeros());
        assert_relative_eq!(origin.to_isometry(0.5).translation.vector, Vector3::new(0.5, 1.0, 1.5));
    }

    #[test]
    fn test_inertia_matrix_symmetric() {
        let i = UrdfInertia {
            ixx: 1.0,
            ixy: 0.1,
            ixz: 0.2,
            iyy: 2.0,
            iyz: 0.3,
            izz: 3.0,
        };
        let m = i.to_matrix();
        assert_eq!(m, m.transpose());
        assert_eq!(m[(2, 1)], 0.3);
    }

    #[test]
    fn test_resolve_robot_level_material() {
        let mut robot = UrdfRobot::new("r");
        robot.materials.push(UrdfMaterial {
            name: "blue".into(),
            color: Some([0.0, 0.0, 1.0, 1.0]),
        });
        let visual = UrdfVisual {
            name: None,
            origin: UrdfOrigin::default(),
            geometry: UrdfGeometry::Sphere { radius: 0.1 },
            material: Some(UrdfMaterial::named("blue")),
        };
        assert_eq!(robot.resolve_color(&visual), Some([0.0, 0.0, 1.0, 1.0]));
    }
}
