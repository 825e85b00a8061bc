//! The character body: the ordered set of volumes that sweep through the scene.
//!
//! Body frame conventions
//! - The origin sits at the feet.
//! - Local +Y is the body's up axis; the motor keeps it aligned against gravity.

use nalgebra as na;
use rapier3d::parry::shape::{Shape, SharedShape};
use serde::{Deserialize, Serialize};

use crate::bitmask_flags::CollisionLayer;
use crate::collision::types::{Iso, Quat, Vec3};
use crate::constants::{DIST_EPS, MIN_ROTATION_ANGLE};
use crate::scene::{ColliderHandle, ColliderShapeDef, Scene};

/// Shape of a body volume, in the body frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum VolumeShape {
    /// Up-aligned capsule; `height` is the full tip-to-tip height.
    Capsule { radius: f32, height: f32 },
    Sphere { radius: f32 },
    /// Boxes can be attached as non-movement volumes only.
    Box { half_extents: Vec3 },
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VolumeDesc {
    pub shape: VolumeShape,
    /// Center in the body frame.
    #[serde(default)]
    pub center: Vec3,
}

impl VolumeDesc {
    /// Capsule standing on the body origin.
    pub fn capsule(radius: f32, height: f32) -> Self {
        Self {
            shape: VolumeShape::Capsule { radius, height },
            center: Vec3::new(0.0, height * 0.5, 0.0),
        }
    }

    pub fn sphere(radius: f32, center: Vec3) -> Self {
        Self {
            shape: VolumeShape::Sphere { radius },
            center,
        }
    }

    fn is_valid(&self) -> bool {
        let dims_ok = match self.shape {
            VolumeShape::Capsule { radius, height } => {
                radius.is_finite() && height.is_finite() && radius > 0.0 && height >= 0.0
            }
            VolumeShape::Sphere { radius } => radius.is_finite() && radius > 0.0,
            VolumeShape::Box { half_extents } => {
                half_extents.iter().all(|e| e.is_finite() && *e > 0.0)
            }
        };
        dims_ok && self.center.iter().all(|c| c.is_finite())
    }

    /// Half of the volume's extent along the body up axis.
    fn half_extent_up(&self) -> f32 {
        match self.shape {
            VolumeShape::Capsule { radius, height } => (height * 0.5).max(radius),
            VolumeShape::Sphere { radius } => radius,
            VolumeShape::Box { half_extents } => half_extents.y,
        }
    }

    fn radius(&self) -> f32 {
        match self.shape {
            VolumeShape::Capsule { radius, .. } | VolumeShape::Sphere { radius } => radius,
            VolumeShape::Box { half_extents } => half_extents.x.min(half_extents.z),
        }
    }

    fn collider_def(&self) -> ColliderShapeDef {
        match self.shape {
            VolumeShape::Capsule { radius, height } => {
                let half_height = (height * 0.5 - radius).max(0.0);
                if half_height <= DIST_EPS {
                    ColliderShapeDef::Sphere { radius }
                } else {
                    ColliderShapeDef::CapsuleY {
                        radius,
                        half_height,
                    }
                }
            }
            VolumeShape::Sphere { radius } => ColliderShapeDef::Sphere { radius },
            VolumeShape::Box { half_extents } => ColliderShapeDef::Cuboid { half_extents },
        }
    }

    #[inline]
    fn local_pose(&self) -> Iso {
        Iso::translation(self.center.x, self.center.y, self.center.z)
    }
}

/// A volume that participates in movement queries.
pub struct MovementVolume {
    desc: VolumeDesc,
    shape: SharedShape,
    collider: ColliderHandle,
}

impl MovementVolume {
    #[inline]
    pub fn desc(&self) -> &VolumeDesc {
        &self.desc
    }

    #[inline]
    pub fn shape(&self) -> &dyn Shape {
        &*self.shape
    }

    #[inline]
    pub fn collider(&self) -> ColliderHandle {
        self.collider
    }

    #[inline]
    pub fn world_pose(&self, pose: &Iso) -> Iso {
        pose * self.desc.local_pose()
    }

    /// Does applying `delta` (world space, about the body origin) move or turn this volume?
    pub fn is_displaced_by(&self, rotation: &Quat, delta: &Quat) -> bool {
        let Some((axis, angle)) = delta.axis_angle() else {
            return false;
        };
        if angle.abs() < MIN_ROTATION_ANGLE {
            return false;
        }

        let center = rotation * self.desc.center;
        if (delta * center - center).norm() > DIST_EPS * 10.0 {
            return true;
        }

        match self.desc.shape {
            VolumeShape::Sphere { .. } => false,
            // A capsule only maps onto itself when spun about its own axis.
            _ => (rotation * Vec3::y()).cross(&axis.into_inner()).norm() > 1.0e-4,
        }
    }
}

/// Ordered collection of volumes making up one character.
pub struct Body {
    volumes: Vec<MovementVolume>,
    /// Non-movement volumes: registered in the scene and gated, never swept.
    ignored: Vec<(VolumeDesc, ColliderHandle)>,
    height: f32,
    min_radius: f32,
    /// Layer the volumes sit on outside of movement queries.
    layer: CollisionLayer,
}

impl Default for Body {
    fn default() -> Self {
        Self {
            volumes: Vec::new(),
            ignored: Vec::new(),
            height: 0.0,
            min_radius: 0.0,
            layer: CollisionLayer::Character,
        }
    }
}

impl Body {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a movement volume. Unsupported or invalid shapes are kept as non-movement volumes.
    pub fn add_volume(
        &mut self,
        scene: &mut Scene,
        desc: VolumeDesc,
        pose: &Iso,
    ) -> ColliderHandle {
        if !desc.is_valid() || matches!(desc.shape, VolumeShape::Box { .. }) {
            log::warn!(
                "Unsupported movement volume {desc:?}; attaching it as a non-movement volume"
            );
            return self.add_ignored_volume(scene, desc, pose);
        }

        let def = desc.collider_def();
        let collider = scene.insert_character_volume(def, pose * desc.local_pose());
        scene.set_layer(collider, self.layer);
        self.volumes.push(MovementVolume {
            desc,
            shape: def.to_shared(),
            collider,
        });
        self.recompute_cache();
        collider
    }

    pub fn add_ignored_volume(
        &mut self,
        scene: &mut Scene,
        desc: VolumeDesc,
        pose: &Iso,
    ) -> ColliderHandle {
        let collider = scene.insert_character_volume(desc.collider_def(), pose * desc.local_pose());
        scene.set_layer(collider, self.layer);
        self.ignored.push((desc, collider));
        collider
    }

    /// Remove a movement or non-movement volume by collider handle.
    pub fn remove_volume(&mut self, scene: &mut Scene, collider: ColliderHandle) -> bool {
        let before = self.volumes.len() + self.ignored.len();
        self.volumes.retain(|v| v.collider != collider);
        self.ignored.retain(|(_, h)| *h != collider);
        if self.volumes.len() + self.ignored.len() == before {
            return false;
        }
        scene.remove(collider);
        self.recompute_cache();
        true
    }

    #[inline]
    pub fn volumes(&self) -> &[MovementVolume] {
        &self.volumes
    }

    /// Every collider owned by the body, movement volumes first.
    pub fn collider_handles(&self) -> impl Iterator<Item = ColliderHandle> + '_ {
        self.volumes
            .iter()
            .map(|v| v.collider)
            .chain(self.ignored.iter().map(|(_, h)| *h))
    }

    #[inline]
    pub fn has_movement_volumes(&self) -> bool {
        !self.volumes.is_empty()
    }

    /// Aggregate height of the movement volumes along the body up axis.
    #[inline]
    pub fn height(&self) -> f32 {
        self.height
    }

    #[inline]
    pub fn min_radius(&self) -> f32 {
        self.min_radius
    }

    #[inline]
    pub fn layer(&self) -> CollisionLayer {
        self.layer
    }

    /// Move every body collider to match `pose`.
    pub fn sync(&self, scene: &mut Scene, pose: &Iso) {
        for volume in &self.volumes {
            scene.set_collider_pose(volume.collider, volume.world_pose(pose));
        }
        for (desc, handle) in &self.ignored {
            scene.set_collider_pose(*handle, pose * desc.local_pose());
        }
    }

    /// True when no movement volume is displaced by `delta`.
    pub fn is_symmetric_under(&self, rotation: &Quat, delta: &Quat) -> bool {
        !self.volumes.iter().any(|v| v.is_displaced_by(rotation, delta))
    }

    fn recompute_cache(&mut self) {
        let mut top = f32::MIN;
        let mut bottom = f32::MAX;
        let mut min_radius = f32::MAX;
        for volume in &self.volumes {
            let half = volume.desc.half_extent_up();
            top = top.max(volume.desc.center.y + half);
            bottom = bottom.min(volume.desc.center.y - half);
            min_radius = min_radius.min(volume.desc.radius());
        }
        if self.volumes.is_empty() {
            self.height = 0.0;
            self.min_radius = 0.0;
        } else {
            self.height = top - bottom;
            self.min_radius = min_radius;
        }
    }
}

/// Rotation taking the body's local +Y onto `up`, preserving as much of `current` as possible.
pub fn align_up(current: &Quat, up: &Vec3) -> Quat {
    let body_up = current * Vec3::y();
    match na::UnitQuaternion::rotation_between(&body_up, up) {
        Some(swing) => swing * current,
        // Opposite vectors: flip about the body's forward axis.
        None => {
            let forward = na::Unit::new_normalize(current * Vec3::z());
            Quat::from_axis_angle(&forward, std::f32::consts::PI) * current
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::yaw_rotation;
    use approx::assert_relative_eq;

    #[test]
    fn capsule_volume_stands_on_the_origin() {
        let mut scene = Scene::new();
        let mut body = Body::new();
        let handle = body.add_volume(&mut scene, VolumeDesc::capsule(0.3, 1.8), &Iso::identity());

        assert_eq!(body.volumes().len(), 1);
        assert_relative_eq!(body.height(), 1.8, epsilon = 1.0e-6);
        assert_relative_eq!(body.min_radius(), 0.3, epsilon = 1.0e-6);

        let collider = scene.collider(handle).unwrap();
        assert_eq!(collider.layer(), CollisionLayer::Character);
        let ColliderShapeDef::CapsuleY {
            radius,
            half_height,
        } = collider.def()
        else {
            panic!("expected a capsule, got {:?}", collider.def());
        };
        assert_relative_eq!(*radius, 0.3, epsilon = 1.0e-6);
        assert_relative_eq!(*half_height, 0.6, epsilon = 1.0e-6);
        assert_relative_eq!(collider.pose().translation.vector.y, 0.9, epsilon = 1.0e-6);
    }

    #[test]
    fn short_capsule_degrades_to_a_sphere() {
        let desc = VolumeDesc::capsule(0.5, 0.8);
        assert_eq!(desc.collider_def(), ColliderShapeDef::Sphere { radius: 0.5 });
        assert_relative_eq!(desc.half_extent_up(), 0.5);
    }

    #[test]
    fn box_volumes_are_not_used_for_movement() {
        let mut scene = Scene::new();
        let mut body = Body::new();
        let desc = VolumeDesc {
            shape: VolumeShape::Box {
                half_extents: Vec3::new(0.2, 0.2, 0.2),
            },
            center: Vec3::new(0.0, 1.0, 0.0),
        };
        let handle = body.add_volume(&mut scene, desc, &Iso::identity());
        assert!(!body.has_movement_volumes());
        assert!(body.collider_handles().any(|h| h == handle));

        assert!(body.remove_volume(&mut scene, handle));
        assert!(!scene.contains(handle));
        assert!(!body.remove_volume(&mut scene, handle));
    }

    #[test]
    fn yaw_leaves_a_centered_capsule_in_place() {
        let mut scene = Scene::new();
        let mut body = Body::new();
        body.add_volume(&mut scene, VolumeDesc::capsule(0.3, 1.8), &Iso::identity());
        let yaw = yaw_rotation(&Vec3::y(), 1.2);
        assert!(body.is_symmetric_under(&Quat::identity(), &yaw));

        let tilt = Quat::from_axis_angle(&Vec3::x_axis(), 0.4);
        assert!(!body.is_symmetric_under(&Quat::identity(), &tilt));

        body.add_volume(
            &mut scene,
            VolumeDesc::sphere(0.2, Vec3::new(0.0, 1.0, 0.5)),
            &Iso::identity(),
        );
        assert!(!body.is_symmetric_under(&Quat::identity(), &yaw));
    }

    #[test]
    fn sync_moves_every_collider() {
        let mut scene = Scene::new();
        let mut body = Body::new();
        let handle = body.add_volume(&mut scene, VolumeDesc::capsule(0.3, 2.0), &Iso::identity());
        body.sync(&mut scene, &Iso::translation(4.0, 0.0, -1.0));
        let pose = scene.collider(handle).unwrap().pose();
        assert_relative_eq!(pose.translation.vector, Vec3::new(4.0, 1.0, -1.0));
    }

    #[test]
    fn align_up_rotates_local_y_onto_target() {
        let up = Vec3::new(0.0, 0.0, 1.0);
        let aligned = align_up(&Quat::identity(), &up);
        assert_relative_eq!(aligned * Vec3::y(), up, epsilon = 1.0e-5);

        let flipped = align_up(&Quat::identity(), &-Vec3::y());
        assert_relative_eq!(flipped * Vec3::y(), -Vec3::y(), epsilon = 1.0e-5);
    }
}
