use nalgebra as na;
use rapier3d::parry::{
    bounding_volume::Aabb,
    partitioning::{Bvh, BvhBuildStrategy},
    shape::Shape,
};

use crate::collision::types::{Iso, Vec3};
use crate::scene::ColliderHandle;

/// Broad-phase acceleration over the scene's colliders.
///
/// Notes:
/// - Finite shapes are stored as world-space AABBs in a BVH. Planes are kept in `unbounded`
///   because they have no finite box and must always be tested.
/// - `leaves` maps each BVH leaf index back to its collider handle.
/// - Any scene mutation marks the structure dirty; a dirty broad phase answers queries with
///   every collider until [`BroadPhase::rebuild`] runs.
pub struct BroadPhase {
    bvh: Bvh,
    leaves: Vec<ColliderHandle>,
    unbounded: Vec<ColliderHandle>,
    dirty: bool,
}

impl Default for BroadPhase {
    fn default() -> Self {
        Self {
            bvh: Bvh::from_leaves(BvhBuildStrategy::Binned, &[]),
            leaves: Vec::new(),
            unbounded: Vec::new(),
            dirty: false,
        }
    }
}

impl BroadPhase {
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Number of finite entries in the BVH.
    #[inline]
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty() && self.unbounded.is_empty()
    }

    /// Rebuild from `(handle, aabb)` pairs; `None` boxes are unbounded shapes.
    pub fn rebuild(&mut self, entries: impl IntoIterator<Item = (ColliderHandle, Option<Aabb>)>) {
        let mut aabbs: Vec<Aabb> = Vec::new();
        self.leaves.clear();
        self.unbounded.clear();

        for (handle, aabb) in entries {
            match aabb {
                Some(aabb) => {
                    aabbs.push(aabb);
                    self.leaves.push(handle);
                }
                None => self.unbounded.push(handle),
            }
        }

        self.bvh = Bvh::from_leaves(BvhBuildStrategy::Binned, &aabbs);
        self.dirty = false;
    }

    /// Collider handles whose AABB intersects `region`, followed by every unbounded collider.
    ///
    /// Must not be called while dirty; the scene falls back to a linear scan in that case.
    pub fn candidates(&self, region: &Aabb) -> Vec<ColliderHandle> {
        let mut out: Vec<ColliderHandle> = self
            .bvh
            .intersect_aabb(region)
            .filter_map(|leaf_idx| self.leaves.get(leaf_idx as usize).copied())
            .collect();
        out.extend_from_slice(&self.unbounded);
        out
    }
}

/// AABB covering `shape` swept from `pose` by `translation`, inflated by `margin`.
pub fn swept_aabb(shape: &dyn Shape, pose: &Iso, translation: &Vec3, margin: f32) -> Aabb {
    let start = shape.compute_aabb(pose);
    let end_pose = Iso::from_parts(
        na::Translation3::from(pose.translation.vector + translation),
        pose.rotation,
    );
    let end = shape.compute_aabb(&end_pose);
    aabb_inflate(&aabb_union(&start, &end), margin)
}

/// Compute the union of two AABBs.
pub fn aabb_union(a: &Aabb, b: &Aabb) -> Aabb {
    let min = na::Point3::new(
        a.mins.x.min(b.mins.x),
        a.mins.y.min(b.mins.y),
        a.mins.z.min(b.mins.z),
    );
    let max = na::Point3::new(
        a.maxs.x.max(b.maxs.x),
        a.maxs.y.max(b.maxs.y),
        a.maxs.z.max(b.maxs.z),
    );
    Aabb {
        mins: min,
        maxs: max,
    }
}

/// Inflate an AABB by `margin` on all sides.
pub fn aabb_inflate(a: &Aabb, margin: f32) -> Aabb {
    if margin <= 0.0 {
        return *a;
    }
    let delta = na::Vector3::new(margin, margin, margin);
    Aabb {
        mins: a.mins - delta,
        maxs: a.maxs + delta,
    }
}

/// Test two AABBs for intersection.
pub fn aabb_intersects(a: &Aabb, b: &Aabb) -> bool {
    !(a.maxs.x < b.mins.x
        || a.mins.x > b.maxs.x
        || a.maxs.y < b.mins.y
        || a.mins.y > b.maxs.y
        || a.maxs.z < b.mins.z
        || a.mins.z > b.maxs.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapier3d::parry::shape::Ball;
    use slotmap::SlotMap;

    #[test]
    fn swept_box_covers_both_ends_and_margin() {
        let ball = Ball::new(0.5);
        let aabb = swept_aabb(&ball, &Iso::identity(), &Vec3::new(2.0, 0.0, 0.0), 0.1);
        assert!((aabb.mins.x - -0.6).abs() < 1.0e-6);
        assert!((aabb.maxs.x - 2.6).abs() < 1.0e-6);
        assert!((aabb.maxs.y - 0.6).abs() < 1.0e-6);
    }

    #[test]
    fn candidates_include_overlapping_leaves_and_all_unbounded() {
        let mut keys: SlotMap<ColliderHandle, ()> = SlotMap::with_key();
        let near = keys.insert(());
        let far = keys.insert(());
        let plane = keys.insert(());

        let ball = Ball::new(0.5);
        let mut broad = BroadPhase::default();
        broad.rebuild([
            (near, Some(ball.compute_aabb(&Iso::translation(1.0, 0.0, 0.0)))),
            (far, Some(ball.compute_aabb(&Iso::translation(50.0, 0.0, 0.0)))),
            (plane, None),
        ]);
        assert!(!broad.is_dirty());
        assert_eq!(broad.len(), 2);

        let region = ball.compute_aabb(&Iso::identity());
        let found = broad.candidates(&region);
        assert!(found.contains(&near));
        assert!(found.contains(&plane));
        assert!(!found.contains(&far));
    }

    #[test]
    fn aabb_intersection_is_inclusive() {
        let ball = Ball::new(0.5);
        let a = ball.compute_aabb(&Iso::identity());
        let b = ball.compute_aabb(&Iso::translation(1.0, 0.0, 0.0));
        let c = ball.compute_aabb(&Iso::translation(1.5, 0.0, 0.0));
        assert!(aabb_intersects(&a, &b));
        assert!(!aabb_intersects(&a, &c));
    }
}
