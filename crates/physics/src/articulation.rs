//! Articulated robot model: a tree of links joined by fixed, revolute and
//! prismatic joints, rooted either to the world or as a free-floating body.

use nalgebra::{Isometry3, Matrix3, Translation3, UnitQuaternion, Vector3};
use robovis_core::{Pose, VisualShape};

use crate::dynamics::{self, ForwardDynamics};
use crate::error::{PhysicsError, Result};
use crate::joint::{Joint, JointLimits};
use crate::spatial::{angular, linear, spatial_inertia, SpatialMatrix, SpatialVector};

/// Mass given to links that declare no inertial properties (kg).
pub const DEFAULT_LINK_MASS: f64 = 1e-3;
/// Principal inertia given to links that declare no inertial properties (kg·m²).
pub const DEFAULT_LINK_INERTIA: f64 = 1e-6;

/// A rigid link and the joint connecting it to its parent.
#[derive(Debug, Clone)]
pub struct Link {
    pub name: String,
    /// Index of the parent link; `None` only for the root.
    pub parent: Option<usize>,
    /// Joint from the parent; a fixed placeholder on the root.
    pub joint: Joint,
    pub mass: f64,
    /// Spatial inertia about the link origin, in link coordinates.
    pub spatial_inertia: SpatialMatrix,
    pub visuals: Vec<VisualShape>,
    pub collisions: Vec<VisualShape>,
}

impl Link {
    pub fn new(name: impl Into<String>, parent: Option<usize>, joint: Joint) -> Self {
        let inertia = Matrix3::identity() * DEFAULT_LINK_INERTIA;
        Self {
            name: name.into(),
            parent,
            joint,
            mass: DEFAULT_LINK_MASS,
            spatial_inertia: spatial_inertia(DEFAULT_LINK_MASS, &Vector3::zeros(), &inertia),
            visuals: Vec::new(),
            collisions: Vec::new(),
        }
    }

    /// A root link with a placeholder fixed joint.
    pub fn root(name: impl Into<String>) -> Self {
        let name = name.into();
        let joint = Joint::fixed(format!("{name}_root"), Isometry3::identity());
        Self::new(name, None, joint)
    }

    /// Set mass properties: `com` in link coordinates, `inertia` about the COM
    /// in link axes.
    pub fn with_inertial(mut self, mass: f64, com: Vector3<f64>, inertia: Matrix3<f64>) -> Self {
        self.mass = mass;
        self.spatial_inertia = spatial_inertia(mass, &com, &inertia);
        self
    }

    pub fn with_visuals(mut self, visuals: Vec<VisualShape>) -> Self {
        self.visuals = visuals;
        self
    }

    pub fn with_collisions(mut self, collisions: Vec<VisualShape>) -> Self {
        self.collisions = collisions;
        self
    }
}

/// A robot: links in topological order (every parent precedes its children).
///
/// Joint-space vectors (`qpos`, `qvel`, `qf`, drive targets) are indexed by
/// active joint in link order.
#[derive(Debug, Clone)]
pub struct Articulation {
    name: String,
    links: Vec<Link>,
    /// Link index of each active joint.
    active: Vec<usize>,
    /// Active-joint index of each link, if its joint is active.
    dof_index: Vec<Option<usize>>,
    root_fixed: bool,
    root_pose: Pose,
    /// Root spatial velocity in root coordinates (floating roots only).
    root_velocity: SpatialVector,
}

impl Articulation {
    /// Assemble an articulation. Link 0 must be the only root and every
    /// parent must precede its child.
    pub fn new(name: impl Into<String>, links: Vec<Link>, root_fixed: bool) -> Result<Self> {
        let name = name.into();
        let roots = links.iter().filter(|l| l.parent.is_none()).count();
        if roots != 1 || links[0].parent.is_some() {
            return Err(PhysicsError::RootCount { name, roots });
        }
        for (i, link) in links.iter().enumerate().skip(1) {
            match link.parent {
                Some(p) if p < i => {}
                Some(p) => {
                    return Err(PhysicsError::InvalidParent {
                        name: link.name.clone(),
                        parent: p,
                    })
                }
                None => unreachable!("root count checked above"),
            }
        }

        let mut active = Vec::new();
        let mut dof_index = vec![None; links.len()];
        for (i, link) in links.iter().enumerate().skip(1) {
            if link.joint.is_active() {
                dof_index[i] = Some(active.len());
                active.push(i);
            }
        }

        Ok(Self {
            name,
            links,
            active,
            dof_index,
            root_fixed,
            root_pose: Pose::identity(),
            root_velocity: SpatialVector::zeros(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn link_names(&self) -> Vec<&str> {
        self.links.iter().map(|l| l.name.as_str()).collect()
    }

    pub fn find_link(&self, name: &str) -> Option<usize> {
        self.links.iter().position(|l| l.name == name)
    }

    /// Number of active joints.
    pub fn dof(&self) -> usize {
        self.active.len()
    }

    pub fn active_joints(&self) -> impl Iterator<Item = &Joint> {
        self.active.iter().map(|&i| &self.links[i].joint)
    }

    fn active_joints_mut(&mut self) -> impl Iterator<Item = &mut Joint> {
        let links = &mut self.links;
        let dof_index = &self.dof_index;
        links
            .iter_mut()
            .zip(dof_index.iter())
            .filter(|(_, d)| d.is_some())
            .map(|(l, _)| &mut l.joint)
    }

    pub fn active_joint_names(&self) -> Vec<&str> {
        self.active_joints().map(|j| j.name.as_str()).collect()
    }

    /// Active-joint index of the link at `link`, if its joint is active.
    pub fn dof_index(&self, link: usize) -> Option<usize> {
        self.dof_index.get(link).copied().flatten()
    }

    pub fn root_fixed(&self) -> bool {
        self.root_fixed
    }

    pub fn root_pose(&self) -> Pose {
        self.root_pose
    }

    pub fn set_root_pose(&mut self, pose: Pose) {
        self.root_pose = pose;
    }

    /// Root spatial velocity `[angular; linear]` in root coordinates.
    pub fn root_velocity(&self) -> SpatialVector {
        self.root_velocity
    }

    /// Set the root velocity from world-frame angular and linear velocity.
    /// Ignored for a fixed root.
    pub fn set_root_velocity(&mut self, angular_world: Vector3<f64>, linear_world: Vector3<f64>) {
        if self.root_fixed {
            return;
        }
        let inv = self.root_pose.q.inverse();
        self.root_velocity = crate::spatial::spatial_vec(&(inv * angular_world), &(inv * linear_world));
    }

    fn check_len(&self, what: &'static str, values: &[f64]) -> Result<()> {
        if values.len() != self.dof() {
            return Err(PhysicsError::DimensionMismatch {
                what,
                expected: self.dof(),
                got: values.len(),
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(PhysicsError::NonFinite(what));
        }
        Ok(())
    }

    pub fn qpos(&self) -> Vec<f64> {
        self.active_joints().map(|j| j.position).collect()
    }

    pub fn set_qpos(&mut self, qpos: &[f64]) -> Result<()> {
        self.check_len("qpos", qpos)?;
        for (j, &q) in self.active_joints_mut().zip(qpos) {
            j.position = q;
        }
        Ok(())
    }

    pub fn qvel(&self) -> Vec<f64> {
        self.active_joints().map(|j| j.velocity).collect()
    }

    pub fn set_qvel(&mut self, qvel: &[f64]) -> Result<()> {
        self.check_len("qvel", qvel)?;
        for (j, &qd) in self.active_joints_mut().zip(qvel) {
            j.velocity = qd;
        }
        Ok(())
    }

    /// Applied generalized forces. They persist across steps until replaced.
    pub fn qf(&self) -> Vec<f64> {
        self.active_joints().map(|j| j.force).collect()
    }

    pub fn set_qf(&mut self, qf: &[f64]) -> Result<()> {
        self.check_len("qf", qf)?;
        for (j, &f) in self.active_joints_mut().zip(qf) {
            j.force = f;
        }
        Ok(())
    }

    /// `[lower, upper]` per active joint; continuous joints are `[-inf, inf]`.
    pub fn qlimits(&self) -> Vec<[f64; 2]> {
        self.active_joints()
            .map(|j| [j.limits.lower, j.limits.upper])
            .collect()
    }

    pub fn set_joint_limits(&mut self, joint: &str, limits: JointLimits) -> Result<()> {
        self.active_joint_mut(joint)?.limits = limits;
        Ok(())
    }

    fn active_joint_mut(&mut self, name: &str) -> Result<&mut Joint> {
        self.active_joints_mut()
            .find(|j| j.name == name)
            .ok_or_else(|| PhysicsError::UnknownJoint(name.to_string()))
    }

    /// Configure the PD drive of one active joint.
    pub fn set_drive_property(
        &mut self,
        joint: &str,
        stiffness: f64,
        damping: f64,
        force_limit: f64,
    ) -> Result<()> {
        let j = self.active_joint_mut(joint)?;
        j.drive.stiffness = stiffness;
        j.drive.damping = damping;
        j.drive.force_limit = force_limit;
        Ok(())
    }

    /// Configure the PD drive of every active joint.
    pub fn set_drive_property_all(&mut self, stiffness: f64, damping: f64, force_limit: f64) {
        for j in self.active_joints_mut() {
            j.drive.stiffness = stiffness;
            j.drive.damping = damping;
            j.drive.force_limit = force_limit;
        }
    }

    pub fn drive_target(&self) -> Vec<f64> {
        self.active_joints().map(|j| j.drive.target).collect()
    }

    pub fn set_drive_target(&mut self, target: &[f64]) -> Result<()> {
        self.check_len("drive target", target)?;
        for (j, &t) in self.active_joints_mut().zip(target) {
            j.drive.target = t;
        }
        Ok(())
    }

    pub fn drive_velocity_target(&self) -> Vec<f64> {
        self.active_joints().map(|j| j.drive.velocity_target).collect()
    }

    pub fn set_drive_velocity_target(&mut self, target: &[f64]) -> Result<()> {
        self.check_len("drive velocity target", target)?;
        for (j, &t) in self.active_joints_mut().zip(target) {
            j.drive.velocity_target = t;
        }
        Ok(())
    }

    /// World pose of every link, in link order.
    pub fn link_poses(&self) -> Vec<Isometry3<f64>> {
        let mut poses: Vec<Isometry3<f64>> = Vec::with_capacity(self.links.len());
        for link in &self.links {
            let pose = match link.parent {
                None => self.root_pose.to_isometry(),
                Some(p) => poses[p] * link.joint.transform(),
            };
            poses.push(pose);
        }
        poses
    }

    /// Generalized force that balances gravity and/or velocity-product terms
    /// at zero joint acceleration. Setting it as `qf` holds the robot still.
    ///
    /// The root is treated as held in place, also for a floating root.
    pub fn compute_passive_force(
        &self,
        gravity: bool,
        coriolis_and_centrifugal: bool,
        g: &Vector3<f64>,
    ) -> Vec<f64> {
        dynamics::passive_force(self, gravity, coriolis_and_centrifugal, g)
    }

    /// Joint accelerations (and root acceleration) under generalized forces
    /// `tau`, without drives.
    pub fn forward_dynamics(&self, tau: &[f64], g: &Vector3<f64>) -> Result<ForwardDynamics> {
        self.check_len("tau", tau)?;
        dynamics::forward_dynamics(self, tau, &vec![0.0; self.dof()], g)
    }

    /// Generalized forces producing joint accelerations `qdd` with the root
    /// held still.
    pub fn inverse_dynamics(&self, qdd: &[f64], g: &Vector3<f64>) -> Result<Vec<f64>> {
        self.check_len("qdd", qdd)?;
        Ok(dynamics::inverse_dynamics(self, qdd, Some(g), true))
    }

    /// Advance the articulation by `dt`: drives, applied `qf`, joint damping
    /// and friction go through ABA, then semi-implicit Euler and limit clamping.
    pub fn step(&mut self, dt: f64, g: &Vector3<f64>) -> Result<()> {
        let n = self.dof();
        let mut tau = Vec::with_capacity(n);
        let mut implicit = Vec::with_capacity(n);
        for j in self.active_joints() {
            let act = j.actuation(dt);
            tau.push(j.force + act.force);
            implicit.push(act.implicit_inertia);
        }

        let fd = dynamics::forward_dynamics(self, &tau, &implicit, g)?;

        for (j, &qdd) in self.active_joints_mut().zip(fd.qdd.iter()) {
            j.integrate(qdd, dt);
            j.clamp_to_limits();
        }
        if !self.root_fixed {
            self.integrate_root(&fd.root_acceleration, dt);
        }

        if self.active_joints().any(|j| !j.position.is_finite() || !j.velocity.is_finite())
            || !self.root_pose.p.iter().all(|v| v.is_finite())
        {
            return Err(PhysicsError::NonFinite("articulation state"));
        }
        Ok(())
    }

    /// Body-frame semi-implicit Euler for the floating root.
    fn integrate_root(&mut self, accel: &SpatialVector, dt: f64) {
        self.root_velocity += accel * dt;
        let omega = angular(&self.root_velocity);
        let lin = linear(&self.root_velocity);
        let q = self.root_pose.q;
        let p = self.root_pose.p + q * lin * dt;
        let q = q * UnitQuaternion::from_scaled_axis(omega * dt);
        self.root_pose = Pose::from_isometry(&Isometry3::from_parts(Translation3::from(p), q));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use robovis_core::GRAVITY;

    /// base → (revolute Y) upper → (fixed) flange → (prismatic X) finger
    fn chain() -> Articulation {
        let links = vec![
            Link::root("base"),
            Link::new(
                "upper",
                Some(0),
                Joint::revolute("shoulder", Isometry3::translation(0.0, 0.0, 0.1), Vector3::y())
                    .with_limits(JointLimits::new(-1.0, 1.0)),
            )
            .with_inertial(1.0, Vector3::new(0.2, 0.0, 0.0), Matrix3::identity() * 0.01),
            Link::new(
                "flange",
                Some(1),
                Joint::fixed("flange_joint", Isometry3::translation(0.4, 0.0, 0.0)),
            ),
            Link::new(
                "finger",
                Some(2),
                Joint::prismatic("slide", Isometry3::identity(), Vector3::x()),
            )
            .with_inertial(0.2, Vector3::new(0.02, 0.0, 0.0), Matrix3::identity() * 1e-4),
        ];
        Articulation::new("chain", links, true).unwrap()
    }

    #[test]
    fn test_active_joint_indexing() {
        let art = chain();
        assert_eq!(art.dof(), 2);
        assert_eq!(art.active_joint_names(), vec!["shoulder", "slide"]);
        assert_eq!(art.link_names(), vec!["base", "upper", "flange", "finger"]);
        assert_eq!(art.dof_index(2), None);
        assert_eq!(art.dof_index(3), Some(1));
    }

    #[test]
    fn test_qpos_length_checked() {
        let mut art = chain();
        let err = art.set_qpos(&[0.1, 0.2, 0.3]).unwrap_err();
        assert_eq!(
            err,
            PhysicsError::DimensionMismatch {
                what: "qpos",
                expected: 2,
                got: 3
            }
        );
        assert!(art.set_qpos(&[0.1, f64::NAN]).is_err());
        art.set_qpos(&[0.1, 0.02]).unwrap();
        assert_eq!(art.qpos(), vec![0.1, 0.02]);
    }

    #[test]
    fn test_invalid_topology_rejected() {
        let links = vec![
            Link::root("a"),
            Link::new("b", Some(2), Joint::fixed("j", Isometry3::identity())),
            Link::new("c", Some(0), Joint::fixed("k", Isometry3::identity())),
        ];
        assert!(matches!(
            Articulation::new("bad", links, true),
            Err(PhysicsError::InvalidParent { .. })
        ));

        let links = vec![Link::root("a"), Link::root("b")];
        assert!(matches!(
            Articulation::new("bad", links, true),
            Err(PhysicsError::RootCount { roots: 2, .. })
        ));
    }

    #[test]
    fn test_link_poses_follow_joints() {
        let mut art = chain();
        art.set_root_pose(Pose::new([0.0, 0.0, 0.06205], [1.0, 0.0, 0.0, 0.0]).unwrap());
        art.set_qpos(&[std::f64::consts::FRAC_PI_2, 0.05]).unwrap();
        let poses = art.link_poses();
        // Rotating +90° about Y swings the +X flange offset down to -Z.
        assert_relative_eq!(
            poses[2].translation.vector,
            Vector3::new(0.0, 0.0, 0.06205 + 0.1 - 0.4),
            epsilon = 1e-9
        );
        assert_relative_eq!(
            poses[3].translation.vector,
            Vector3::new(0.0, 0.0, 0.06205 + 0.1 - 0.45),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_drive_properties() {
        let mut art = chain();
        art.set_drive_property_all(1e5, 1e3, f64::INFINITY);
        assert!(art.active_joints().all(|j| j.drive.stiffness == 1e5 && j.drive.damping == 1e3));
        art.set_drive_property("slide", 10.0, 1.0, 5.0).unwrap();
        assert_eq!(
            art.set_drive_property("flange_joint", 1.0, 1.0, 1.0),
            Err(PhysicsError::UnknownJoint("flange_joint".into()))
        );
        art.set_drive_target(&[0.3, 0.01]).unwrap();
        assert_eq!(art.drive_target(), vec![0.3, 0.01]);
    }

    #[test]
    fn test_passive_force_holds_position() {
        let mut art = chain();
        art.set_qpos(&[0.4, 0.03]).unwrap();
        let dt = 1.0 / 500.0;
        for _ in 0..500 {
            let qf = art.compute_passive_force(true, true, &GRAVITY);
            art.set_qf(&qf).unwrap();
            art.step(dt, &GRAVITY).unwrap();
        }
        let q = art.qpos();
        assert_relative_eq!(q[0], 0.4, epsilon = 1e-6);
        assert_relative_eq!(q[1], 0.03, epsilon = 1e-6);
    }

    #[test]
    fn test_unbalanced_chain_falls() {
        let mut art = chain();
        art.step(1.0 / 500.0, &GRAVITY).unwrap();
        // COM along +X, gravity -Z: positive rotation about +Y.
        assert!(art.qvel()[0] > 0.0);
    }

    #[test]
    fn test_stiff_drive_on_light_link_is_stable() {
        let links = vec![
            Link::root("base"),
            Link::new(
                "tip",
                Some(0),
                Joint::revolute("j", Isometry3::identity(), Vector3::z()),
            ),
        ];
        let mut art = Articulation::new("light", links, true).unwrap();
        art.set_drive_property_all(1e5, 1e3, f64::INFINITY);
        art.set_drive_target(&[0.5]).unwrap();
        for _ in 0..1000 {
            art.step(1.0 / 500.0, &GRAVITY).unwrap();
        }
        assert_relative_eq!(art.qpos()[0], 0.5, epsilon = 1e-4);
        assert!(art.qvel()[0].abs() < 1e-3);
    }

    #[test]
    fn test_limits_clamp_during_step() {
        let mut art = chain();
        art.set_qvel(&[50.0, 0.0]).unwrap();
        for _ in 0..100 {
            art.step(1.0 / 500.0, &GRAVITY).unwrap();
        }
        assert!(art.qpos()[0] <= 1.0);
    }

    #[test]
    fn test_floating_body_free_fall() {
        let links = vec![Link::root("box").with_inertial(
            2.0,
            Vector3::zeros(),
            Matrix3::identity() * 0.02,
        )];
        let mut art = Articulation::new("box", links, false).unwrap();
        art.set_root_pose(Pose::new([0.0, 0.0, 1.0], [0.9238795, 0.0, 0.3826834, 0.0]).unwrap());
        let dt = 1.0 / 500.0;
        let steps = 250;
        for _ in 0..steps {
            art.step(dt, &GRAVITY).unwrap();
        }
        let t = dt * steps as f64;
        let p = art.root_pose().p;
        assert_relative_eq!(p.z, 1.0 - 0.5 * 9.81 * t * t, epsilon = 0.01);
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-9);
        // Free fall leaves the orientation untouched.
        assert_relative_eq!(art.root_pose().q.angle(), std::f64::consts::FRAC_PI_4, epsilon = 1e-6);
    }

    #[test]
    fn test_fixed_root_ignores_root_velocity() {
        let mut art = chain();
        art.set_root_velocity(Vector3::z(), Vector3::x());
        assert_eq!(art.root_velocity(), SpatialVector::zeros());
    }
}
