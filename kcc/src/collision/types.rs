/*!
Core collision types and math aliases shared by the collision submodules.

This module contains no algorithms. It defines the data exchanged between:
- narrow_phase (single collider casts, contacts, rays)
- query (multi-volume body casts, overlaps, penetration resolution)
- the movement stages (horizontal, ground, rotation)
*/

use nalgebra as na;

use crate::scene::ColliderHandle;

/// Common math aliases for clarity and consistency.
pub type Vec3 = na::Vector3<f32>;
pub type Quat = na::UnitQuaternion<f32>;
pub type Iso = na::Isometry3<f32>;

/// A single hit reported by a swept body query.
///
/// `distance` is measured along the cast direction. A distance of zero means the volume was
/// already overlapping the collider at the start of the cast.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapeHit {
    pub collider: ColliderHandle,
    /// Index of the movement volume that produced this hit.
    pub volume: usize,
    pub distance: f32,
    /// World-space contact point on the collider.
    pub point: Vec3,
    /// World-space surface normal of the collider, facing the body.
    pub normal: Vec3,
}

impl ShapeHit {
    #[inline]
    pub fn is_overlap(&self) -> bool {
        self.distance <= 0.0
    }
}

/// A contact retained across ticks (ground or horizontal surface).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactRecord {
    pub collider: ColliderHandle,
    pub distance: f32,
    pub point: Vec3,
    pub normal: Vec3,
    /// Body origin the query was issued from.
    pub origin: Vec3,
}

impl ContactRecord {
    pub fn from_hit(hit: &ShapeHit, normal: Vec3, origin: Vec3) -> Self {
        Self {
            collider: hit.collider,
            distance: hit.distance,
            point: hit.point,
            normal,
            origin,
        }
    }
}

/// Separating information for one overlapping pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Penetration {
    pub collider: ColliderHandle,
    /// Unit direction the body must move to separate.
    pub direction: Vec3,
    /// Overlap depth along `direction` (positive when penetrating).
    pub depth: f32,
}

/// Outcome of iterative penetration resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PenetrationOutcome {
    /// The tentative pose did not overlap anything.
    Clear,
    /// The pose separates after applying the offset.
    Resolved(Vec3),
    /// The iteration budget ran out while still overlapping.
    Unresolved,
}
