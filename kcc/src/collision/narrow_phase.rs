use nalgebra as na;
use rapier3d::parry::{
    query::{self, Ray, RayCast, ShapeCastOptions},
    shape::{HalfSpace, Shape, SupportMap},
};

use super::types::{Iso, Penetration, Vec3};
use crate::constants::DIST_EPS;
use crate::scene::{ColliderHandle, SceneCollider};

/// Result of sweeping one shape against one collider.
#[derive(Clone, Copy, Debug)]
pub struct CastHit {
    /// Distance travelled along the unit cast direction before contact.
    pub distance: f32,
    /// World-space point on the collider.
    pub point: Vec3,
    /// World-space collider normal, facing against the motion.
    pub normal: Vec3,
}

/// Cast a moving shape against a single collider and return the hit (if any).
///
/// - `pose`: the moving shape's starting isometry in world space.
/// - `dir`: unit world-space direction of travel.
/// - `max_distance`: how far along `dir` to search (meters).
///
/// Overlaps at the start of the cast report a distance of zero.
pub fn cast_against(
    pose: &Iso,
    shape: &dyn Shape,
    dir: &Vec3,
    max_distance: f32,
    collider: &SceneCollider,
) -> Option<CastHit> {
    let collider_pose = collider.shape_pose();
    let mut opts = ShapeCastOptions::with_max_time_of_impact(max_distance);
    opts.stop_at_penetration = true;

    let hit = query::cast_shapes(
        pose,
        dir,
        shape,
        &collider_pose,
        &na::Vector3::zeros(),
        collider.shape(),
        opts,
    )
    .ok()??;

    let point = collider_pose * hit.witness2;
    let mut normal = collider_pose.rotation * hit.normal2.into_inner();
    // Keep the normal opposing the motion.
    if normal.dot(dir) > 0.0 {
        normal = -normal;
    }

    Some(CastHit {
        distance: hit.time_of_impact.max(0.0),
        point: point.coords,
        normal,
    })
}

/// Separating direction and depth between a shape and a collider, if they overlap.
pub fn penetration(
    pose: &Iso,
    shape: &dyn Shape,
    handle: ColliderHandle,
    collider: &SceneCollider,
) -> Option<Penetration> {
    let collider_pose = collider.shape_pose();
    if let Some(half_space) = collider.shape().as_shape::<HalfSpace>() {
        return half_space_penetration(pose, shape, handle, &collider_pose, half_space);
    }

    let contact = query::contact(pose, shape, &collider_pose, collider.shape(), 0.0).ok()??;
    if contact.dist >= 0.0 {
        return None;
    }
    // `normal1` points out of the moving shape toward the collider.
    let direction = -contact.normal1.into_inner();
    Some(Penetration {
        collider: handle,
        direction,
        depth: -contact.dist,
    })
}

/// Depth below a plane, measured at the shape's deepest support point.
fn half_space_penetration(
    pose: &Iso,
    shape: &dyn Shape,
    handle: ColliderHandle,
    plane_pose: &Iso,
    half_space: &HalfSpace,
) -> Option<Penetration> {
    let support = shape.as_support_map()?;
    let normal = plane_pose.rotation * half_space.normal.into_inner();
    let deepest = support.support_point(pose, &-normal);
    let depth = (plane_pose.translation.vector - deepest.coords).dot(&normal);
    (depth > 0.0).then_some(Penetration {
        collider: handle,
        direction: normal,
        depth,
    })
}

/// Boolean overlap test.
pub fn intersects(pose: &Iso, shape: &dyn Shape, collider: &SceneCollider) -> bool {
    query::intersection_test(pose, shape, &collider.shape_pose(), collider.shape()).unwrap_or(false)
}

/// Straight-line probe against one collider, returning the hit distance and surface normal.
pub fn ray_normal(
    collider: &SceneCollider,
    origin: &Vec3,
    dir: &Vec3,
    max_distance: f32,
) -> Option<(f32, Vec3)> {
    let dir = dir.try_normalize(DIST_EPS)?;
    let ray = Ray::new(na::Point3::from(*origin), dir);
    let hit = collider
        .shape()
        .cast_ray_and_get_normal(&collider.shape_pose(), &ray, max_distance, true)?;
    Some((hit.time_of_impact, hit.normal))
}
