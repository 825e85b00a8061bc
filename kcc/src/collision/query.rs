/*!
Body-level shape queries.

Every query runs each movement volume of a [`Body`] against the scene's broad-phase candidates
and merges the per-volume results:
- sweeps are deduplicated by collider, keeping the nearest hit and the volume that produced it
- hits are ordered lazily: [`HitList::nearest`] selects the i-th smallest distance on demand
- overlaps and penetrations are reported for the body as a whole
*/

use rapier3d::parry::shape::Shape;

use super::narrow_phase;
use super::types::{Iso, Penetration, PenetrationOutcome, ShapeHit, Vec3};
use crate::bitmask_flags::LayerMask;
use crate::body::Body;
use crate::constants::{GROUND_PROBE_NUDGE, NORMAL_PROBE_BACKOFF};
use crate::scene::{ColliderHandle, Scene, SceneCollider, broad};
use crate::utils::{planar, translated};

/// Which colliders a query may report.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QueryFilter {
    pub mask: LayerMask,
    /// A single collider to skip regardless of its layer.
    pub exclude: Option<ColliderHandle>,
}

impl Default for QueryFilter {
    fn default() -> Self {
        Self::new(LayerMask::solid())
    }
}

impl QueryFilter {
    pub fn new(mask: LayerMask) -> Self {
        Self {
            mask,
            exclude: None,
        }
    }

    pub fn excluding(mut self, handle: ColliderHandle) -> Self {
        self.exclude = Some(handle);
        self
    }

    #[inline]
    pub fn accepts(&self, handle: ColliderHandle, collider: &SceneCollider) -> bool {
        self.exclude != Some(handle) && self.mask.accepts(collider.layer())
    }
}

/// Hits from a swept body query, extracted nearest-first on demand.
#[derive(Clone, Debug, Default)]
pub struct HitList {
    hits: Vec<ShapeHit>,
    /// `hits[..selected]` is sorted and holds the smallest distances.
    selected: usize,
    dropped: usize,
}

impl HitList {
    #[inline]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Hits discarded because the list was full.
    #[inline]
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// The `i`-th nearest hit (0-based).
    ///
    /// Selection is incremental: asking for the nearest hit costs one linear pass, and later
    /// indices only extend the sorted prefix as far as needed.
    pub fn nearest(&mut self, i: usize) -> Option<ShapeHit> {
        while self.selected <= i && self.selected < self.hits.len() {
            let rest = &self.hits[self.selected..];
            let min = rest
                .iter()
                .enumerate()
                .min_by(|a, b| a.1.distance.total_cmp(&b.1.distance))
                .map(|(k, _)| k)?;
            self.hits.swap(self.selected, self.selected + min);
            self.selected += 1;
        }
        if i < self.selected {
            self.hits.get(i).copied()
        } else {
            None
        }
    }

    /// Record a hit, merging with an existing hit on the same collider.
    fn push(&mut self, hit: ShapeHit, capacity: usize) {
        debug_assert_eq!(self.selected, 0, "hits pushed after selection started");
        if let Some(existing) = self.hits.iter_mut().find(|h| h.collider == hit.collider) {
            if hit.distance < existing.distance {
                *existing = hit;
            }
            return;
        }
        if self.hits.len() < capacity {
            self.hits.push(hit);
            return;
        }

        self.dropped += 1;
        // Full: keep the nearest `capacity` hits.
        if let Some(farthest) = self
            .hits
            .iter_mut()
            .max_by(|a, b| a.distance.total_cmp(&b.distance))
        {
            if hit.distance < farthest.distance {
                *farthest = hit;
            }
        }
    }
}

/// Nearest hit of a single shape swept along `dir`.
pub fn cast_volume(
    scene: &Scene,
    shape: &dyn Shape,
    pose: &Iso,
    dir: &Vec3,
    distance: f32,
    filter: &QueryFilter,
) -> Option<(ColliderHandle, narrow_phase::CastHit)> {
    let region = broad::swept_aabb(shape, pose, &(dir * distance), NORMAL_PROBE_BACKOFF);
    let mut best: Option<(ColliderHandle, narrow_phase::CastHit)> = None;
    for handle in scene.candidates(&region) {
        let Some(collider) = scene.collider(handle) else {
            continue;
        };
        if !filter.accepts(handle, collider) {
            continue;
        }
        if let Some(hit) = narrow_phase::cast_against(pose, shape, dir, distance, collider) {
            if best.as_ref().is_none_or(|(_, b)| hit.distance < b.distance) {
                best = Some((handle, hit));
            }
        }
    }
    best
}

/// Sweep every movement volume of `body` from `pose` along the unit direction `dir`.
///
/// At most `max_hits` distinct colliders are kept; extra hits are dropped with a warning.
pub fn cast_body(
    scene: &Scene,
    body: &Body,
    pose: &Iso,
    dir: &Vec3,
    distance: f32,
    filter: &QueryFilter,
    max_hits: usize,
) -> HitList {
    let mut list = HitList::default();
    let travel = dir * distance;

    for (index, volume) in body.volumes().iter().enumerate() {
        let volume_pose = volume.world_pose(pose);
        let region = broad::swept_aabb(volume.shape(), &volume_pose, &travel, NORMAL_PROBE_BACKOFF);
        for handle in scene.candidates(&region) {
            let Some(collider) = scene.collider(handle) else {
                continue;
            };
            if !filter.accepts(handle, collider) {
                continue;
            }
            if let Some(hit) =
                narrow_phase::cast_against(&volume_pose, volume.shape(), dir, distance, collider)
            {
                list.push(
                    ShapeHit {
                        collider: handle,
                        volume: index,
                        distance: hit.distance,
                        point: hit.point,
                        normal: hit.normal,
                    },
                    max_hits.max(1),
                );
            }
        }
    }

    if list.dropped > 0 {
        log::warn!(
            "Shape cast exceeded {} hits; dropped {} farther hits",
            max_hits.max(1),
            list.dropped
        );
    }
    list
}

/// Colliders overlapping a set of volumes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Overlap {
    pub colliders: Vec<ColliderHandle>,
}

impl Overlap {
    #[inline]
    pub fn count(&self) -> usize {
        self.colliders.len()
    }

    #[inline]
    pub fn is_clear(&self) -> bool {
        self.colliders.is_empty()
    }
}

pub fn overlap_volume(
    scene: &Scene,
    shape: &dyn Shape,
    pose: &Iso,
    filter: &QueryFilter,
) -> Overlap {
    let mut out = Overlap::default();
    collect_overlaps(scene, shape, pose, filter, &mut out);
    out
}

pub fn overlap_body(scene: &Scene, body: &Body, pose: &Iso, filter: &QueryFilter) -> Overlap {
    let mut out = Overlap::default();
    for volume in body.volumes() {
        collect_overlaps(scene, volume.shape(), &volume.world_pose(pose), filter, &mut out);
    }
    out
}

fn collect_overlaps(
    scene: &Scene,
    shape: &dyn Shape,
    pose: &Iso,
    filter: &QueryFilter,
    out: &mut Overlap,
) {
    let region = shape.compute_aabb(pose);
    for handle in scene.candidates(&region) {
        if out.colliders.contains(&handle) {
            continue;
        }
        let Some(collider) = scene.collider(handle) else {
            continue;
        };
        if filter.accepts(handle, collider) && narrow_phase::intersects(pose, shape, collider) {
            out.colliders.push(handle);
        }
    }
}

/// Penetrations of one shape against every overlapping collider.
pub fn penetrations(
    scene: &Scene,
    shape: &dyn Shape,
    pose: &Iso,
    filter: &QueryFilter,
) -> Vec<Penetration> {
    let region = shape.compute_aabb(pose);
    scene
        .candidates(&region)
        .into_iter()
        .filter_map(|handle| {
            let collider = scene.collider(handle)?;
            if !filter.accepts(handle, collider) {
                return None;
            }
            narrow_phase::penetration(pose, shape, handle, collider)
        })
        .collect()
}

/// Deepest penetration of any movement volume at `pose`.
pub fn deepest_penetration(
    scene: &Scene,
    body: &Body,
    pose: &Iso,
    filter: &QueryFilter,
) -> Option<Penetration> {
    body.volumes()
        .iter()
        .flat_map(|v| penetrations(scene, v.shape(), &v.world_pose(pose), filter))
        .max_by(|a, b| a.depth.total_cmp(&b.depth))
}

/// Push the body out of whatever it overlaps at `pose`.
///
/// Each iteration moves the tentative pose along the deepest separating vector, plus `skin`.
/// If the body still overlaps after `max_iterations`, the overlap is reported unresolved.
pub fn resolve_penetration(
    scene: &Scene,
    body: &Body,
    pose: &Iso,
    filter: &QueryFilter,
    skin: f32,
    max_iterations: u32,
) -> PenetrationOutcome {
    let mut offset = Vec3::zeros();
    for _ in 0..max_iterations.max(1) {
        let tentative = translated(pose, &offset);
        match deepest_penetration(scene, body, &tentative, filter) {
            None if offset == Vec3::zeros() => return PenetrationOutcome::Clear,
            None => return PenetrationOutcome::Resolved(offset),
            Some(pen) => offset += pen.direction * (pen.depth + skin),
        }
    }

    if deepest_penetration(scene, body, &translated(pose, &offset), filter).is_none() {
        PenetrationOutcome::Resolved(offset)
    } else {
        log::debug!("Penetration unresolved after {max_iterations} iterations");
        PenetrationOutcome::Unresolved
    }
}

/// Re-derive the surface normal of a swept hit with a straight ray along the travel direction.
///
/// Shape casts report the normal at the closest feature, which on edges and corners is an
/// interpolated direction; the ray returns the face normal actually in the way.
pub fn probe_normal(scene: &Scene, hit: &ShapeHit, dir: &Vec3) -> Option<Vec3> {
    let collider = scene.collider(hit.collider)?;
    let origin = hit.point - dir * NORMAL_PROBE_BACKOFF;
    let (_, normal) =
        narrow_phase::ray_normal(collider, &origin, dir, NORMAL_PROBE_BACKOFF * 2.0)?;
    Some(if normal.dot(dir) > 0.0 { -normal } else { normal })
}

/// Re-derive the normal of the surface under a ground hit with a ray cast straight down.
///
/// The ray is nudged toward the supporting side of the contact so ledges report their top face.
pub fn probe_ground_normal(scene: &Scene, hit: &ShapeHit, up: &Vec3) -> Option<Vec3> {
    let collider = scene.collider(hit.collider)?;
    let inward = -planar(&hit.normal, up)
        .try_normalize(1.0e-6)
        .unwrap_or_else(Vec3::zeros);
    let origin = hit.point + inward * GROUND_PROBE_NUDGE + up * NORMAL_PROBE_BACKOFF;
    let (_, normal) =
        narrow_phase::ray_normal(collider, &origin, &-up, NORMAL_PROBE_BACKOFF * 2.0)?;
    Some(if normal.dot(up) < 0.0 { -normal } else { normal })
}
