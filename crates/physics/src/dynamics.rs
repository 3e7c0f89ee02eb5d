//! Featherstone's Articulated Body Algorithm (ABA) and Recursive Newton-Euler
//! (RNEA) over a link tree.
//!
//! Links are visited in index order, which is topological: every parent has a
//! lower index than its children. Gravity enters as a fictitious upward
//! acceleration of the world, `[0; -g]`.

use nalgebra::Vector3;

use crate::articulation::Articulation;
use crate::error::{PhysicsError, Result};
use crate::spatial::{
    spatial_cross_force, spatial_cross_motion, spatial_transform, spatial_vec, SpatialMatrix,
    SpatialVector,
};

/// Result of a forward-dynamics pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardDynamics {
    /// Joint accelerations, one per active joint.
    pub qdd: Vec<f64>,
    /// Spatial acceleration of the root in root coordinates, gravity included.
    /// Zero for a fixed root.
    pub root_acceleration: SpatialVector,
}

/// Per-link transforms from parent coordinates into link coordinates.
/// The root entry maps world coordinates into root coordinates.
fn link_transforms(art: &Articulation) -> Vec<SpatialMatrix> {
    art.links()
        .iter()
        .map(|link| match link.parent {
            None => spatial_transform(&art.root_pose().to_isometry()),
            Some(_) => spatial_transform(&link.joint.transform()),
        })
        .collect()
}

/// Forward dynamics using the Articulated Body Algorithm.
///
/// `tau` holds the generalized force at each active joint. `implicit` is added
/// to the joint-space diagonal `d_i` and carries the implicit spring/damper
/// terms of the drives.
///
/// A floating root is solved without gravity; uniform gravity accelerates every
/// body equally, so it is added to the root acceleration afterwards and does
/// not change the joint accelerations.
pub fn forward_dynamics(
    art: &Articulation,
    tau: &[f64],
    implicit: &[f64],
    gravity: &Vector3<f64>,
) -> Result<ForwardDynamics> {
    let links = art.links();
    let n = links.len();
    let floating = !art.root_fixed();
    debug_assert_eq!(tau.len(), art.dof());
    debug_assert_eq!(implicit.len(), art.dof());

    let x = link_transforms(art);
    let a_grav = spatial_vec(&Vector3::zeros(), &(-gravity));

    let zero_sv = SpatialVector::zeros();
    let mut v = vec![zero_sv; n];
    let mut c = vec![zero_sv; n];
    let mut s = vec![zero_sv; n];
    let mut i_a: Vec<SpatialMatrix> = links.iter().map(|l| l.spatial_inertia).collect();
    let mut p_a = vec![zero_sv; n];

    // ----- Pass 1: Outward: velocities and bias terms -----
    for i in 0..n {
        match links[i].parent {
            None => {
                if floating {
                    v[i] = art.root_velocity();
                }
            }
            Some(p) => {
                let joint = &links[i].joint;
                s[i] = joint.motion_subspace();
                let v_j = s[i] * joint.velocity;
                v[i] = x[i] * v[p] + v_j;
                c[i] = spatial_cross_motion(&v[i], &v_j);
            }
        }
        p_a[i] = spatial_cross_force(&v[i], &(links[i].spatial_inertia * v[i]));
    }

    // ----- Pass 2: Inward: articulated inertias and bias forces -----
    let mut u_vec = vec![zero_sv; n];
    let mut d = vec![0.0; n];
    let mut u = vec![0.0; n];

    for i in (1..n).rev() {
        let Some(p) = links[i].parent else { continue };

        let (ia_proj, pa_proj) = match art.dof_index(i) {
            Some(k) => {
                u_vec[i] = i_a[i] * s[i];
                d[i] = s[i].dot(&u_vec[i]) + implicit[k];
                u[i] = tau[k] - s[i].dot(&p_a[i]);
                if d[i].abs() < 1e-12 {
                    // Degenerate: treat as welded
                    (i_a[i], p_a[i] + i_a[i] * c[i])
                } else {
                    let u_over_d = u_vec[i] / d[i];
                    let ia = i_a[i] - u_over_d * u_vec[i].transpose();
                    let pa = p_a[i] + ia * c[i] + u_over_d * u[i];
                    (ia, pa)
                }
            }
            None => (i_a[i], p_a[i] + i_a[i] * c[i]),
        };

        let xt = x[i].transpose();
        i_a[p] += xt * ia_proj * x[i];
        p_a[p] += xt * pa_proj;
    }

    // ----- Pass 3: Outward: accelerations -----
    let mut a = vec![zero_sv; n];
    let mut qdd = vec![0.0; art.dof()];

    let root_acceleration = if floating {
        let inv = i_a[0]
            .try_inverse()
            .ok_or_else(|| PhysicsError::SingularRootInertia(art.name().to_string()))?;
        a[0] = -(inv * p_a[0]);
        a[0] - x[0] * a_grav
    } else {
        a[0] = x[0] * a_grav;
        zero_sv
    };

    for i in 1..n {
        let Some(p) = links[i].parent else { continue };
        let a_prime = x[i] * a[p] + c[i];
        a[i] = a_prime;
        if let Some(k) = art.dof_index(i) {
            if d[i].abs() < 1e-12 {
                continue;
            }
            qdd[k] = (u[i] - u_vec[i].dot(&a_prime)) / d[i];
            a[i] += s[i] * qdd[k];
        }
    }

    Ok(ForwardDynamics {
        qdd,
        root_acceleration,
    })
}

/// Inverse dynamics using Recursive Newton-Euler with the root held still.
///
/// Returns the generalized force at each active joint that produces `qdd`.
/// `gravity: None` drops gravity; `velocity_terms: false` treats all joint
/// velocities as zero, removing Coriolis and centrifugal forces.
pub fn inverse_dynamics(
    art: &Articulation,
    qdd: &[f64],
    gravity: Option<&Vector3<f64>>,
    velocity_terms: bool,
) -> Vec<f64> {
    let links = art.links();
    let n = links.len();
    debug_assert_eq!(qdd.len(), art.dof());

    let x = link_transforms(art);
    let zero_sv = SpatialVector::zeros();
    let a_grav = match gravity {
        Some(g) => spatial_vec(&Vector3::zeros(), &(-g)),
        None => zero_sv,
    };

    // Forward pass: velocities, accelerations and link forces
    let mut v = vec![zero_sv; n];
    let mut a = vec![zero_sv; n];
    let mut f = vec![zero_sv; n];
    let mut s = vec![zero_sv; n];

    for i in 0..n {
        match links[i].parent {
            None => a[i] = x[i] * a_grav,
            Some(p) => {
                let joint = &links[i].joint;
                s[i] = joint.motion_subspace();
                let (qd, qdd_i) = match art.dof_index(i) {
                    Some(k) => (if velocity_terms { joint.velocity } else { 0.0 }, qdd[k]),
                    None => (0.0, 0.0),
                };
                let v_j = s[i] * qd;
                v[i] = x[i] * v[p] + v_j;
                a[i] = x[i] * a[p] + s[i] * qdd_i + spatial_cross_motion(&v[i], &v_j);
            }
        }
        let inertia = &links[i].spatial_inertia;
        f[i] = inertia * a[i] + spatial_cross_force(&v[i], &(inertia * v[i]));
    }

    // Backward pass: project onto joint axes and propagate to parents
    let mut tau = vec![0.0; art.dof()];
    for i in (1..n).rev() {
        if let Some(k) = art.dof_index(i) {
            tau[k] = s[i].dot(&f[i]);
        }
        if let Some(p) = links[i].parent {
            let propagated = x[i].transpose() * f[i];
            f[p] += propagated;
        }
    }

    tau
}

/// Generalized force cancelling gravity and/or velocity-product terms at zero
/// joint acceleration.
pub fn passive_force(
    art: &Articulation,
    gravity: bool,
    coriolis_and_centrifugal: bool,
    g: &Vector3<f64>,
) -> Vec<f64> {
    let zero = vec![0.0; art.dof()];
    inverse_dynamics(art, &zero, gravity.then_some(g), coriolis_and_centrifugal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::articulation::Link;
    use crate::joint::Joint;
    use approx::assert_relative_eq;
    use nalgebra::{Isometry3, Matrix3};
    use robovis_core::{Pose, GRAVITY};

    fn pendulum(mass: f64, l: f64, i_com: f64) -> Articulation {
        let links = vec![
            Link::root("base"),
            Link::new("bob", Some(0), Joint::revolute("hinge", Isometry3::identity(), Vector3::y()))
                .with_inertial(mass, Vector3::new(l, 0.0, 0.0), Matrix3::identity() * i_com),
        ];
        Articulation::new("pendulum", links, true).unwrap()
    }

    /// Mixed revolute/prismatic tree with a branch and a fixed joint.
    fn tree() -> Articulation {
        let links = vec![
            Link::root("base").with_inertial(3.0, Vector3::zeros(), Matrix3::identity() * 0.1),
            Link::new(
                "l1",
                Some(0),
                Joint::revolute("j1", Isometry3::translation(0.0, 0.0, 0.2), Vector3::z()),
            )
            .with_inertial(2.0, Vector3::new(0.05, 0.01, 0.1), Matrix3::new(0.02, 0.001, 0.0, 0.001, 0.03, 0.0, 0.0, 0.0, 0.01)),
            Link::new(
                "l2",
                Some(1),
                Joint::revolute(
                    "j2",
                    Isometry3::new(Vector3::new(0.0, 0.05, 0.3), Vector3::new(0.3, 0.0, 0.0)),
                    Vector3::new(0.0, 1.0, 0.2),
                ),
            )
            .with_inertial(1.5, Vector3::new(0.2, 0.0, 0.0), Matrix3::identity() * 0.015),
            Link::new(
                "l3",
                Some(2),
                Joint::prismatic("j3", Isometry3::translation(0.4, 0.0, 0.0), Vector3::x()),
            )
            .with_inertial(0.5, Vector3::new(0.0, 0.02, 0.0), Matrix3::identity() * 0.002),
            Link::new(
                "tool",
                Some(3),
                Joint::fixed("tool_mount", Isometry3::new(Vector3::new(0.1, 0.0, 0.0), Vector3::new(0.0, 0.0, 0.5))),
            )
            .with_inertial(0.3, Vector3::new(0.03, 0.0, 0.0), Matrix3::identity() * 0.001),
            Link::new(
                "side",
                Some(1),
                Joint::revolute("j4", Isometry3::translation(0.0, -0.1, 0.1), Vector3::x()),
            )
            .with_inertial(0.8, Vector3::new(0.0, -0.1, 0.0), Matrix3::identity() * 0.004),
        ];
        let mut art = Articulation::new("tree", links, true).unwrap();
        art.set_root_pose(Pose::new([0.1, 0.0, 0.06205], [0.98, 0.0, 0.2, 0.0]).unwrap());
        art.set_qpos(&[0.3, -0.7, 0.05, 1.1]).unwrap();
        art.set_qvel(&[0.5, -1.2, 0.3, 2.0]).unwrap();
        art
    }

    #[test]
    fn test_pendulum_matches_closed_form() {
        let (m, l, i) = (2.0, 0.5, 0.01);
        let art = pendulum(m, l, i);
        let fd = forward_dynamics(&art, &[0.0], &[0.0], &GRAVITY).unwrap();
        let expected = m * 9.81 * l / (i + m * l * l);
        assert_relative_eq!(fd.qdd[0], expected, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_gravity_at_rest() {
        let art = pendulum(1.0, 0.3, 0.01);
        let fd = forward_dynamics(&art, &[0.0], &[0.0], &Vector3::zeros()).unwrap();
        assert_relative_eq!(fd.qdd[0], 0.0);
    }

    #[test]
    fn test_rnea_inverts_aba() {
        let art = tree();
        let tau = [1.5, -0.4, 2.0, 0.25];
        let fd = forward_dynamics(&art, &tau, &[0.0; 4], &GRAVITY).unwrap();
        let back = inverse_dynamics(&art, &fd.qdd, Some(&GRAVITY), true);
        for (t, b) in tau.iter().zip(back.iter()) {
            assert_relative_eq!(*t, *b, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_passive_force_gives_zero_acceleration() {
        let art = tree();
        let qf = passive_force(&art, true, true, &GRAVITY);
        let fd = forward_dynamics(&art, &qf, &[0.0; 4], &GRAVITY).unwrap();
        for qdd in fd.qdd {
            assert_relative_eq!(qdd, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_passive_force_terms_are_separable() {
        let art = tree();
        let both = passive_force(&art, true, true, &GRAVITY);
        let grav = passive_force(&art, true, false, &GRAVITY);
        let vel = passive_force(&art, false, true, &GRAVITY);
        for k in 0..4 {
            assert_relative_eq!(both[k], grav[k] + vel[k], epsilon = 1e-9);
        }
        assert!(passive_force(&art, false, false, &GRAVITY).iter().all(|f| *f == 0.0));
    }

    #[test]
    fn test_fixed_joint_equals_merged_body() {
        // A point mass welded one link further out behaves like the same mass
        // folded into the parent's inertia.
        let welded = {
            let links = vec![
                Link::root("base"),
                Link::new("arm", Some(0), Joint::revolute("j", Isometry3::identity(), Vector3::y()))
                    .with_inertial(1.0, Vector3::new(0.2, 0.0, 0.0), Matrix3::identity() * 0.01),
                Link::new("weight", Some(1), Joint::fixed("w", Isometry3::translation(0.5, 0.0, 0.0)))
                    .with_inertial(0.5, Vector3::zeros(), Matrix3::identity() * 0.002),
            ];
            Articulation::new("welded", links, true).unwrap()
        };
        let merged = {
            let com = (Vector3::new(0.2, 0.0, 0.0) * 1.0 + Vector3::new(0.5, 0.0, 0.0) * 0.5) / 1.5;
            let mut links = vec![
                Link::root("base"),
                Link::new("arm", Some(0), Joint::revolute("j", Isometry3::identity(), Vector3::y())),
            ];
            // Parallel-axis shift of both bodies onto the combined COM.
            let d1 = 0.2 - com.x;
            let d2 = 0.5 - com.x;
            let shift = 1.0 * d1 * d1 + 0.5 * d2 * d2;
            let inertia = Matrix3::from_diagonal(&Vector3::new(0.012, 0.012 + shift, 0.012 + shift));
            links[1] = links[1].clone().with_inertial(1.5, com, inertia);
            Articulation::new("merged", links, true).unwrap()
        };
        let a = forward_dynamics(&welded, &[0.3], &[0.0], &GRAVITY).unwrap();
        let b = forward_dynamics(&merged, &[0.3], &[0.0], &GRAVITY).unwrap();
        assert_relative_eq!(a.qdd[0], b.qdd[0], epsilon = 1e-9);
    }

    #[test]
    fn test_implicit_term_slows_joint() {
        let art = pendulum(1.0, 0.3, 0.01);
        let free = forward_dynamics(&art, &[1.0], &[0.0], &Vector3::zeros()).unwrap();
        let damped = forward_dynamics(&art, &[1.0], &[0.1], &Vector3::zeros()).unwrap();
        assert_relative_eq!(free.qdd[0], 1.0 / 0.1, epsilon = 1e-9);
        assert_relative_eq!(damped.qdd[0], 1.0 / 0.2, epsilon = 1e-9);
    }

    #[test]
    fn test_floating_root_with_limb_falls_freely() {
        let links = vec![
            Link::root("body").with_inertial(5.0, Vector3::zeros(), Matrix3::identity() * 0.1),
            Link::new("limb", Some(0), Joint::revolute("hip", Isometry3::translation(0.2, 0.0, 0.0), Vector3::y()))
                .with_inertial(1.0, Vector3::new(0.3, 0.0, 0.0), Matrix3::identity() * 0.01),
        ];
        let art = Articulation::new("floater", links, false).unwrap();
        let fd = forward_dynamics(&art, &[0.0], &[0.0], &GRAVITY).unwrap();
        // Uniform gravity produces no relative motion.
        assert_relative_eq!(fd.qdd[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(fd.root_acceleration, spatial_vec(&Vector3::zeros(), &GRAVITY), epsilon = 1e-12);
    }
}
