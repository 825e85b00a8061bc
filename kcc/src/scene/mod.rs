/*!
Query scene the motor casts against.

The scene is an arena of colliders keyed by generation-tagged handles:
- static level geometry
- colliders attached to moving platform frames
- dynamic props that can be pushed and receive forces
- the character bodies' own volumes

Determinism: [`Scene::from_defs`] sorts its input by id, and the broad phase enumerates
candidates in a stable order for a given scene state.
*/

pub mod broad;
pub mod shape;

use rapier3d::parry::{bounding_volume::Aabb, shape::Shape, shape::SharedShape};
use slotmap::SlotMap;

use crate::bitmask_flags::CollisionLayer;
use crate::collision::types::{Iso, Vec3};
use crate::material::SurfaceMaterial;
use crate::utils::is_finite_vec;

pub use broad::BroadPhase;
pub use shape::{ColliderShapeDef, WorldStaticDef};

slotmap::new_key_type! {
    /// Handle of a collider stored in a [`Scene`].
    pub struct ColliderHandle;
    /// Handle of a moving platform frame.
    pub struct PlatformId;
}

/// A pushable body driven by the motors that touch it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RigidProp {
    pub mass: f32,
    pub velocity: Vec3,
    /// Sum of forces applied since the last [`Scene::take_prop_force`].
    pub accumulated_force: Vec3,
    /// Immovable props never yield when pushed.
    pub immovable: bool,
}

/// Who owns a collider.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ColliderOwner {
    Static,
    Platform(PlatformId),
    Prop(RigidProp),
    Character,
}

pub struct SceneCollider {
    shape: SharedShape,
    def: ColliderShapeDef,
    /// World pose of the collider (before any plane offset).
    pose: Iso,
    /// Pose relative to the owning platform frame.
    local_pose: Iso,
    layer: CollisionLayer,
    material: SurfaceMaterial,
    owner: ColliderOwner,
}

impl SceneCollider {
    fn new(def: ColliderShapeDef, pose: Iso, layer: CollisionLayer, owner: ColliderOwner) -> Self {
        Self {
            shape: def.to_shared(),
            def,
            pose,
            local_pose: Iso::identity(),
            layer,
            material: SurfaceMaterial::default(),
            owner,
        }
    }

    #[inline]
    pub fn shape(&self) -> &dyn Shape {
        &*self.shape
    }

    #[inline]
    pub fn def(&self) -> &ColliderShapeDef {
        &self.def
    }

    #[inline]
    pub fn pose(&self) -> &Iso {
        &self.pose
    }

    /// Pose of the parry shape; differs from [`Self::pose`] only for offset planes.
    #[inline]
    pub fn shape_pose(&self) -> Iso {
        self.def.shape_pose(&self.pose)
    }

    #[inline]
    pub fn layer(&self) -> CollisionLayer {
        self.layer
    }

    #[inline]
    pub fn material(&self) -> &SurfaceMaterial {
        &self.material
    }

    #[inline]
    pub fn owner(&self) -> &ColliderOwner {
        &self.owner
    }

    pub fn platform(&self) -> Option<PlatformId> {
        match self.owner {
            ColliderOwner::Platform(id) => Some(id),
            _ => None,
        }
    }

    pub fn prop(&self) -> Option<&RigidProp> {
        match &self.owner {
            ColliderOwner::Prop(prop) => Some(prop),
            _ => None,
        }
    }

    fn aabb(&self) -> Option<Aabb> {
        if self.def.is_unbounded() {
            return None;
        }
        Some(self.shape.compute_aabb(&self.shape_pose()))
    }
}

/// A kinematic frame that carries attached colliders and the characters standing on them.
#[derive(Clone, Debug)]
pub struct Platform {
    pose: Iso,
    previous_pose: Iso,
    linear_velocity: Vec3,
    /// Scaled-axis angular velocity (radians per second).
    angular_velocity: Vec3,
    colliders: Vec<ColliderHandle>,
}

impl Platform {
    #[inline]
    pub fn pose(&self) -> &Iso {
        &self.pose
    }

    #[inline]
    pub fn previous_pose(&self) -> &Iso {
        &self.previous_pose
    }

    #[inline]
    pub fn linear_velocity(&self) -> Vec3 {
        self.linear_velocity
    }

    #[inline]
    pub fn angular_velocity(&self) -> Vec3 {
        self.angular_velocity
    }

    pub fn colliders(&self) -> &[ColliderHandle] {
        &self.colliders
    }

    /// Velocity of the platform frame at a world point.
    pub fn point_velocity(&self, point: &Vec3) -> Vec3 {
        let arm = point - self.pose.translation.vector;
        self.linear_velocity + self.angular_velocity.cross(&arm)
    }
}

#[derive(Default)]
pub struct Scene {
    colliders: SlotMap<ColliderHandle, SceneCollider>,
    platforms: SlotMap<PlatformId, Platform>,
    broad: BroadPhase,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a scene from static collider definitions.
    ///
    /// The input is sorted by `id` before insertion so identical inputs produce identical scenes.
    pub fn from_defs(mut defs: Vec<WorldStaticDef>) -> Self {
        defs.sort_by_key(|d| d.id);

        let mut scene = Self::new();
        for def in defs.into_iter() {
            let handle = scene.insert_static(def.shape, def.pose());
            scene.set_material(handle, def.material);
        }
        scene.refresh();
        scene
    }

    // --- Insertion ---

    pub fn insert_static(&mut self, def: ColliderShapeDef, pose: Iso) -> ColliderHandle {
        self.insert(SceneCollider::new(
            def,
            pose,
            CollisionLayer::Default,
            ColliderOwner::Static,
        ))
    }

    /// Insert a pushable prop. Non-positive masses are clamped to a small positive value.
    pub fn insert_prop(&mut self, def: ColliderShapeDef, pose: Iso, mass: f32) -> ColliderHandle {
        let prop = RigidProp {
            mass: if mass.is_finite() { mass.max(1.0e-3) } else { 1.0 },
            velocity: Vec3::zeros(),
            accumulated_force: Vec3::zeros(),
            immovable: false,
        };
        self.insert(SceneCollider::new(
            def,
            pose,
            CollisionLayer::Prop,
            ColliderOwner::Prop(prop),
        ))
    }

    /// Insert a collider owned by a character body.
    pub fn insert_character_volume(&mut self, def: ColliderShapeDef, pose: Iso) -> ColliderHandle {
        self.insert(SceneCollider::new(
            def,
            pose,
            CollisionLayer::Character,
            ColliderOwner::Character,
        ))
    }

    pub fn add_platform(&mut self, pose: Iso) -> PlatformId {
        self.platforms.insert(Platform {
            pose,
            previous_pose: pose,
            linear_velocity: Vec3::zeros(),
            angular_velocity: Vec3::zeros(),
            colliders: Vec::new(),
        })
    }

    /// Attach a collider to a platform at `local_pose` in the platform frame.
    pub fn attach_to_platform(
        &mut self,
        platform: PlatformId,
        def: ColliderShapeDef,
        local_pose: Iso,
    ) -> Option<ColliderHandle> {
        let frame = *self.platforms.get(platform)?.pose();
        let mut collider = SceneCollider::new(
            def,
            frame * local_pose,
            CollisionLayer::Platform,
            ColliderOwner::Platform(platform),
        );
        collider.local_pose = local_pose;
        let handle = self.insert(collider);
        if let Some(p) = self.platforms.get_mut(platform) {
            p.colliders.push(handle);
        }
        Some(handle)
    }

    fn insert(&mut self, collider: SceneCollider) -> ColliderHandle {
        self.broad.mark_dirty();
        self.colliders.insert(collider)
    }

    pub fn remove(&mut self, handle: ColliderHandle) -> bool {
        let Some(collider) = self.colliders.remove(handle) else {
            return false;
        };
        if let ColliderOwner::Platform(id) = collider.owner {
            if let Some(p) = self.platforms.get_mut(id) {
                p.colliders.retain(|h| *h != handle);
            }
        }
        self.broad.mark_dirty();
        true
    }

    /// Remove a platform and every collider attached to it.
    pub fn remove_platform(&mut self, id: PlatformId) -> bool {
        let Some(platform) = self.platforms.remove(id) else {
            return false;
        };
        for handle in platform.colliders {
            self.colliders.remove(handle);
        }
        self.broad.mark_dirty();
        true
    }

    // --- Access ---

    #[inline]
    pub fn collider(&self, handle: ColliderHandle) -> Option<&SceneCollider> {
        self.colliders.get(handle)
    }

    #[inline]
    pub fn contains(&self, handle: ColliderHandle) -> bool {
        self.colliders.contains_key(handle)
    }

    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ColliderHandle, &SceneCollider)> {
        self.colliders.iter()
    }

    #[inline]
    pub fn platform(&self, id: PlatformId) -> Option<&Platform> {
        self.platforms.get(id)
    }

    pub fn platform_of(&self, handle: ColliderHandle) -> Option<PlatformId> {
        self.colliders.get(handle).and_then(SceneCollider::platform)
    }

    pub fn prop(&self, handle: ColliderHandle) -> Option<&RigidProp> {
        self.colliders.get(handle).and_then(SceneCollider::prop)
    }

    fn prop_mut(&mut self, handle: ColliderHandle) -> Option<&mut RigidProp> {
        match &mut self.colliders.get_mut(handle)?.owner {
            ColliderOwner::Prop(prop) => Some(prop),
            _ => None,
        }
    }

    // --- Mutation ---

    pub fn layer(&self, handle: ColliderHandle) -> Option<CollisionLayer> {
        self.colliders.get(handle).map(|c| c.layer)
    }

    /// Layer changes do not move anything, so the broad phase stays valid.
    pub fn set_layer(&mut self, handle: ColliderHandle, layer: CollisionLayer) -> bool {
        match self.colliders.get_mut(handle) {
            Some(c) => {
                c.layer = layer;
                true
            }
            None => false,
        }
    }

    pub fn set_material(&mut self, handle: ColliderHandle, material: SurfaceMaterial) -> bool {
        match self.colliders.get_mut(handle) {
            Some(c) => {
                c.material = material;
                true
            }
            None => false,
        }
    }

    pub fn set_collider_pose(&mut self, handle: ColliderHandle, pose: Iso) -> bool {
        match self.colliders.get_mut(handle) {
            Some(c) => {
                c.pose = pose;
                self.broad.mark_dirty();
                true
            }
            None => false,
        }
    }

    pub fn set_prop_immovable(&mut self, handle: ColliderHandle, immovable: bool) -> bool {
        match self.prop_mut(handle) {
            Some(prop) => {
                prop.immovable = immovable;
                true
            }
            None => false,
        }
    }

    /// Accumulate a force on a prop. Returns false if `handle` is not a prop.
    pub fn apply_prop_force(&mut self, handle: ColliderHandle, force: Vec3) -> bool {
        if !is_finite_vec(&force) {
            log::warn!("Ignoring non-finite force on prop {handle:?}");
            return false;
        }
        match self.prop_mut(handle) {
            Some(prop) => {
                prop.accumulated_force += force;
                true
            }
            None => false,
        }
    }

    /// Returns and clears the force accumulated on a prop.
    pub fn take_prop_force(&mut self, handle: ColliderHandle) -> Option<Vec3> {
        let prop = self.prop_mut(handle)?;
        Some(std::mem::replace(&mut prop.accumulated_force, Vec3::zeros()))
    }

    /// Displace a prop and record the velocity it was pushed with.
    pub fn push_prop(&mut self, handle: ColliderHandle, displacement: Vec3, dt: f32) -> bool {
        let Some(collider) = self.colliders.get_mut(handle) else {
            return false;
        };
        let ColliderOwner::Prop(prop) = &mut collider.owner else {
            return false;
        };
        if prop.immovable {
            return false;
        }
        if dt > 0.0 {
            prop.velocity = displacement / dt;
        }
        collider.pose.translation.vector += displacement;
        self.broad.mark_dirty();
        true
    }

    /// Move a platform frame to `pose`, carrying its colliders, and derive its velocity over `dt`.
    pub fn move_platform(&mut self, id: PlatformId, pose: Iso, dt: f32) -> bool {
        let Some(platform) = self.platforms.get_mut(id) else {
            return false;
        };
        platform.previous_pose = platform.pose;
        platform.pose = pose;
        if dt > 0.0 {
            platform.linear_velocity =
                (pose.translation.vector - platform.previous_pose.translation.vector) / dt;
            let delta = pose.rotation * platform.previous_pose.rotation.inverse();
            platform.angular_velocity = delta.scaled_axis() / dt;
        } else {
            platform.linear_velocity = Vec3::zeros();
            platform.angular_velocity = Vec3::zeros();
        }

        for handle in &platform.colliders {
            if let Some(c) = self.colliders.get_mut(*handle) {
                c.pose = pose * c.local_pose;
            }
        }
        self.broad.mark_dirty();
        true
    }

    // --- Broad phase ---

    /// Rebuild the broad phase if anything moved since the last rebuild.
    pub fn refresh(&mut self) {
        if !self.broad.is_dirty() {
            return;
        }
        let entries: Vec<_> = self.colliders.iter().map(|(h, c)| (h, c.aabb())).collect();
        self.broad.rebuild(entries);
    }

    /// Colliders that may touch `region`.
    ///
    /// Falls back to a linear scan while the broad phase is stale.
    pub fn candidates(&self, region: &Aabb) -> Vec<ColliderHandle> {
        if self.broad.is_dirty() {
            return self
                .colliders
                .iter()
                .filter(|(_, c)| c.aabb().is_none_or(|aabb| broad::aabb_intersects(&aabb, region)))
                .map(|(h, _)| h)
                .collect();
        }
        self.broad.candidates(region)
    }
}
