//! Joint model (fixed, revolute, prismatic) with limits, friction and a PD drive.

use nalgebra::{Isometry3, Translation3, Unit, UnitQuaternion, Vector3};

use crate::spatial::{prismatic_motion_subspace, revolute_motion_subspace, SpatialVector};

/// Kind of joint connecting a link to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointKind {
    /// Welded; contributes no degree of freedom.
    Fixed,
    /// Rotation about the joint axis (continuous joints have infinite limits).
    Revolute,
    /// Translation along the joint axis.
    Prismatic,
}

/// Position limits. Continuous joints use `[-inf, inf]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointLimits {
    pub lower: f64,
    pub upper: f64,
}

impl JointLimits {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn unlimited() -> Self {
        Self {
            lower: f64::NEG_INFINITY,
            upper: f64::INFINITY,
        }
    }

    pub fn is_limited(&self) -> bool {
        self.lower.is_finite() || self.upper.is_finite()
    }
}

impl Default for JointLimits {
    fn default() -> Self {
        Self::unlimited()
    }
}

/// PD drive acting on a joint: `stiffness * (target - q) + damping * (velocity_target - qd)`.
///
/// The drive is integrated implicitly, so very stiff gains stay stable on
/// light links.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointDrive {
    pub stiffness: f64,
    pub damping: f64,
    /// Maximum drive force magnitude (Nm or N).
    pub force_limit: f64,
    pub target: f64,
    pub velocity_target: f64,
}

impl Default for JointDrive {
    fn default() -> Self {
        Self {
            stiffness: 0.0,
            damping: 0.0,
            force_limit: f64::INFINITY,
            target: 0.0,
            velocity_target: 0.0,
        }
    }
}

/// Generalized force produced for one step, split into the explicit force and
/// the extra joint-space inertia contributed by the implicit terms.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Actuation {
    pub force: f64,
    pub implicit_inertia: f64,
}

/// A joint with its state, passive properties and drive.
#[derive(Debug, Clone)]
pub struct Joint {
    pub name: String,
    pub kind: JointKind,
    /// Unit axis in the joint frame.
    pub axis: Vector3<f64>,
    /// Joint frame in the parent link frame (URDF `<origin>`).
    pub origin: Isometry3<f64>,
    pub limits: JointLimits,
    /// Viscous damping coefficient (Nm·s/rad).
    pub damping: f64,
    /// Coulomb (dry) friction force (Nm).
    pub friction: f64,
    pub drive: JointDrive,

    /// Current position (rad or m).
    pub position: f64,
    /// Current velocity.
    pub velocity: f64,
    /// Externally applied generalized force (`qf`), held until replaced.
    pub force: f64,
}

impl Joint {
    /// A welded joint, also used as the placeholder joint of a root link.
    pub fn fixed(name: impl Into<String>, origin: Isometry3<f64>) -> Self {
        Self::new(name, JointKind::Fixed, origin, Vector3::x())
    }

    pub fn revolute(name: impl Into<String>, origin: Isometry3<f64>, axis: Vector3<f64>) -> Self {
        Self::new(name, JointKind::Revolute, origin, axis)
    }

    pub fn prismatic(name: impl Into<String>, origin: Isometry3<f64>, axis: Vector3<f64>) -> Self {
        Self::new(name, JointKind::Prismatic, origin, axis)
    }

    fn new(name: impl Into<String>, kind: JointKind, origin: Isometry3<f64>, axis: Vector3<f64>) -> Self {
        let n = axis.norm();
        let axis = if n > 1e-10 { axis / n } else { Vector3::x() };
        Self {
            name: name.into(),
            kind,
            axis,
            origin,
            limits: JointLimits::unlimited(),
            damping: 0.0,
            friction: 0.0,
            drive: JointDrive::default(),
            position: 0.0,
            velocity: 0.0,
            force: 0.0,
        }
    }

    /// Set position limits (builder pattern).
    pub fn with_limits(mut self, limits: JointLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set viscous damping and coulomb friction (builder pattern).
    pub fn with_friction(mut self, damping: f64, friction: f64) -> Self {
        self.damping = damping;
        self.friction = friction;
        self
    }

    /// Whether the joint contributes a degree of freedom.
    pub fn is_active(&self) -> bool {
        self.kind != JointKind::Fixed
    }

    /// Motion of the joint at position `q`, in the joint frame.
    pub fn motion(&self, q: f64) -> Isometry3<f64> {
        match self.kind {
            JointKind::Fixed => Isometry3::identity(),
            JointKind::Revolute => Isometry3::from_parts(
                Translation3::identity(),
                UnitQuaternion::from_axis_angle(&Unit::new_unchecked(self.axis), q),
            ),
            JointKind::Prismatic => Isometry3::from_parts(
                Translation3::from(self.axis * q),
                UnitQuaternion::identity(),
            ),
        }
    }

    /// Child link frame in the parent link frame at the current position.
    pub fn transform(&self) -> Isometry3<f64> {
        self.origin * self.motion(self.position)
    }

    /// Joint motion subspace in child coordinates.
    ///
    /// The axis is invariant under the joint's own motion, so the subspace
    /// is constant.
    pub fn motion_subspace(&self) -> SpatialVector {
        match self.kind {
            JointKind::Fixed => SpatialVector::zeros(),
            JointKind::Revolute => revolute_motion_subspace(&self.axis),
            JointKind::Prismatic => prismatic_motion_subspace(&self.axis),
        }
    }

    /// Coulomb friction opposing motion.
    pub fn friction_force(&self) -> f64 {
        if self.velocity.abs() > 1e-6 {
            -self.friction * self.velocity.signum()
        } else {
            0.0
        }
    }

    /// Drive, damping and friction force for a step of length `dt`.
    ///
    /// Spring and damper terms are evaluated at the end of the step
    /// (backward Euler): the explicit part goes to `force` and the
    /// `stiffness*dt² + damping*dt` part to `implicit_inertia`.
    /// A saturated drive falls back to the explicit clamped force.
    pub fn actuation(&self, dt: f64) -> Actuation {
        let d = &self.drive;
        let mut drive_force = d.stiffness * (d.target - self.position - dt * self.velocity)
            + d.damping * (d.velocity_target - self.velocity);
        let mut implicit = d.stiffness * dt * dt + d.damping * dt;
        if drive_force.abs() > d.force_limit {
            drive_force = drive_force.clamp(-d.force_limit, d.force_limit);
            implicit = 0.0;
        }

        Actuation {
            force: drive_force - self.damping * self.velocity + self.friction_force(),
            implicit_inertia: implicit + self.damping * dt,
        }
    }

    /// Integrate joint state forward by dt given acceleration (semi-implicit Euler).
    pub fn integrate(&mut self, acceleration: f64, dt: f64) {
        self.velocity += acceleration * dt;
        self.position += self.velocity * dt;
    }

    /// Clamp position to limits (hard clamp), zeroing velocity into the limit.
    pub fn clamp_to_limits(&mut self) {
        if self.position < self.limits.lower {
            self.position = self.limits.lower;
            if self.velocity < 0.0 {
                self.velocity = 0.0;
            }
        } else if self.position > self.limits.upper {
            self.position = self.limits.upper;
            if self.velocity > 0.0 {
                self.velocity = 0.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_joint_limits() {
        let mut joint = Joint::revolute("j", Isometry3::identity(), Vector3::z())
            .with_limits(JointLimits::new(-1.0, 1.0));
        joint.position = 1.2;
        joint.velocity = 0.5;
        joint.clamp_to_limits();
        assert_eq!(joint.position, 1.0);
        assert_eq!(joint.velocity, 0.0);

        let mut free = Joint::revolute("c", Isometry3::identity(), Vector3::z());
        free.position = 100.0;
        free.clamp_to_limits();
        assert_eq!(free.position, 100.0);
        assert!(!free.limits.is_limited());
    }

    #[test]
    fn test_friction_opposes_motion() {
        let mut joint = Joint::revolute("j", Isometry3::identity(), Vector3::z()).with_friction(0.0, 2.0);
        joint.velocity = 1.0;
        assert!(joint.friction_force() < 0.0, "Friction should oppose positive velocity");

        joint.velocity = -1.0;
        assert!(joint.friction_force() > 0.0, "Friction should oppose negative velocity");
    }

    #[test]
    fn test_revolute_motion() {
        let joint = Joint::revolute("j", Isometry3::translation(0.0, 0.0, 1.0), Vector3::new(0.0, 0.0, 2.0));
        assert_relative_eq!(joint.axis.norm(), 1.0);
        let m = joint.motion(std::f64::consts::FRAC_PI_2);
        assert_relative_eq!(m * Vector3::x(), Vector3::y(), epsilon = 1e-12);
    }

    #[test]
    fn test_prismatic_transform() {
        let mut joint = Joint::prismatic("p", Isometry3::translation(1.0, 0.0, 0.0), Vector3::y());
        joint.position = 0.25;
        let t = joint.transform();
        assert_relative_eq!(t.translation.vector, Vector3::new(1.0, 0.25, 0.0));
        assert_eq!(joint.motion_subspace(), SpatialVector::new(0.0, 0.0, 0.0, 0.0, 1.0, 0.0));
    }

    #[test]
    fn test_actuation_implicit_terms() {
        let mut joint = Joint::revolute("j", Isometry3::identity(), Vector3::z());
        joint.drive.stiffness = 1e5;
        joint.drive.damping = 1e3;
        joint.drive.target = 0.1;
        let dt = 0.002;
        let a = joint.actuation(dt);
        assert_relative_eq!(a.force, 1e5 * 0.1);
        assert_relative_eq!(a.implicit_inertia, 1e5 * dt * dt + 1e3 * dt);

        joint.drive.force_limit = 10.0;
        let a = joint.actuation(dt);
        assert_eq!(a.force, 10.0);
        assert_eq!(a.implicit_inertia, 0.0);
    }
}
