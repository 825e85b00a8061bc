use nalgebra as na;

use crate::collision::types::{Iso, Quat, Vec3};
use crate::constants::DIST_EPS;

/// Component of `v` lying in the plane orthogonal to `up`.
#[inline]
pub fn planar(v: &Vec3, up: &Vec3) -> Vec3 {
    v - up * v.dot(up)
}

/// Signed component of `v` along `up`.
#[inline]
pub fn vertical(v: &Vec3, up: &Vec3) -> f32 {
    v.dot(up)
}

/// Angle between a surface normal and `up`, in degrees.
pub fn slope_angle_deg(normal: &Vec3, up: &Vec3) -> f32 {
    let Some(n) = normal.try_normalize(DIST_EPS) else {
        return 90.0;
    };
    n.dot(up).clamp(-1.0, 1.0).acos().to_degrees()
}

/// Rotation of `angle` radians about `up`.
pub fn yaw_rotation(up: &Vec3, angle: f32) -> Quat {
    match na::Unit::try_new(*up, DIST_EPS) {
        Some(axis) => Quat::from_axis_angle(&axis, angle),
        None => Quat::identity(),
    }
}

/// Twist part of `q` about `axis` (swing-twist decomposition).
pub fn twist_about(q: &Quat, axis: &Vec3) -> Quat {
    let v = q.imag();
    let projected = axis * v.dot(axis);
    let twist = na::Quaternion::new(q.w, projected.x, projected.y, projected.z);
    if twist.norm_squared() <= DIST_EPS {
        return Quat::identity();
    }
    Quat::from_quaternion(twist)
}

/// `iso` moved by a world-space `delta`.
#[inline]
pub fn translated(iso: &Iso, delta: &Vec3) -> Iso {
    Iso::from_parts(na::Translation3::from(iso.translation.vector + delta), iso.rotation)
}

#[inline]
pub fn is_finite_vec(v: &Vec3) -> bool {
    v.iter().all(|c| c.is_finite())
}

#[inline]
pub fn is_finite_quat(q: &Quat) -> bool {
    q.coords.iter().all(|c| c.is_finite())
}
