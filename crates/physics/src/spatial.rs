//! Spatial vector algebra for Featherstone's articulated-body algorithms.
//!
//! Spatial vectors combine angular and linear components into 6D vectors.
//! Convention: [angular (3); linear (3)] (Featherstone "Motion" convention).

use nalgebra::{Isometry3, Matrix3, Matrix6, Vector3, Vector6};

/// Spatial velocity / acceleration / force vector.
pub type SpatialVector = Vector6<f64>;

/// 6×6 spatial inertia or spatial transform matrix.
pub type SpatialMatrix = Matrix6<f64>;

/// Extract angular part (top 3) of a spatial vector.
pub fn angular(v: &SpatialVector) -> Vector3<f64> {
    Vector3::new(v[0], v[1], v[2])
}

/// Extract linear part (bottom 3) of a spatial vector.
pub fn linear(v: &SpatialVector) -> Vector3<f64> {
    Vector3::new(v[3], v[4], v[5])
}

/// Construct a spatial vector from angular and linear parts.
pub fn spatial_vec(ang: &Vector3<f64>, lin: &Vector3<f64>) -> SpatialVector {
    SpatialVector::new(ang.x, ang.y, ang.z, lin.x, lin.y, lin.z)
}

/// Skew-symmetric (cross-product) matrix for vector v.
pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Spatial cross product for motion vectors: v ×_m w
/// [ω×  0 ] [ω_w]
/// [v×  ω×] [v_w]
pub fn spatial_cross_motion(v: &SpatialVector, w: &SpatialVector) -> SpatialVector {
    let omega = angular(v);
    let vel = linear(v);
    let omega_w = angular(w);
    let vel_w = linear(w);

    let ang = omega.cross(&omega_w);
    let lin = omega.cross(&vel_w) + vel.cross(&omega_w);
    spatial_vec(&ang, &lin)
}

/// Spatial cross product for force vectors: v ×_f f = -(v ×_m)^T f
pub fn spatial_cross_force(v: &SpatialVector, f: &SpatialVector) -> SpatialVector {
    let omega = angular(v);
    let vel = linear(v);
    let tau = angular(f);
    let force = linear(f);

    let ang = omega.cross(&tau) + vel.cross(&force);
    let lin = omega.cross(&force);
    spatial_vec(&ang, &lin)
}

/// Build spatial inertia matrix from mass, center of mass (in body frame), and
/// rotational inertia about the center of mass.
///
/// I_sp = [ I_rot + m*cx*cx^T   m*cx ]
///        [ m*cx^T               m*I  ]
///
/// where cx = skew(com)
pub fn spatial_inertia(mass: f64, com: &Vector3<f64>, inertia: &Matrix3<f64>) -> SpatialMatrix {
    let cx = skew(com);
    let m_cx = cx * mass;

    let top_left = inertia + m_cx * cx.transpose();
    let bot_right = Matrix3::identity() * mass;

    let mut result = SpatialMatrix::zeros();
    result.fixed_view_mut::<3, 3>(0, 0).copy_from(&top_left);
    result.fixed_view_mut::<3, 3>(0, 3).copy_from(&m_cx);
    result.fixed_view_mut::<3, 3>(3, 0).copy_from(&m_cx.transpose());
    result.fixed_view_mut::<3, 3>(3, 3).copy_from(&bot_right);
    result
}

/// Spatial transform for a child frame whose pose in the parent frame is `child`.
///
/// The result maps motion vectors from parent coordinates into child
/// coordinates: X = [E, 0; -E*rx, E] with E = R^T and rx = skew(r).
/// Its transpose maps child forces back into the parent.
pub fn spatial_transform(child: &Isometry3<f64>) -> SpatialMatrix {
    let e = child.rotation.to_rotation_matrix().into_inner().transpose();
    let rx = skew(&child.translation.vector);

    let mut x = SpatialMatrix::zeros();
    x.fixed_view_mut::<3, 3>(0, 0).copy_from(&e);
    x.fixed_view_mut::<3, 3>(3, 0).copy_from(&(-e * rx));
    x.fixed_view_mut::<3, 3>(3, 3).copy_from(&e);
    x
}

/// Motion subspace of a revolute joint about unit `axis` (joint frame).
pub fn revolute_motion_subspace(axis: &Vector3<f64>) -> SpatialVector {
    spatial_vec(axis, &Vector3::zeros())
}

/// Motion subspace of a prismatic joint along unit `axis` (joint frame).
pub fn prismatic_motion_subspace(axis: &Vector3<f64>) -> SpatialVector {
    spatial_vec(&Vector3::zeros(), axis)
}
