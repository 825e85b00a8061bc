use crate::body::Body;
use crate::collision::query::QueryFilter;
use crate::collision::types::{Quat, Vec3};
use crate::config::ControllerConfig;
use crate::constants::SLOPE_TOLERANCE_DEG;
use crate::scene::{ColliderHandle, Scene};
use crate::utils::slope_angle_deg;

/// Read-only view shared by the movement stages of one tick.
pub struct StageContext<'a> {
    pub scene: &'a Scene,
    pub body: &'a Body,
    pub config: &'a ControllerConfig,
    pub filter: QueryFilter,
    /// Unit up direction of the body.
    pub up: Vec3,
    /// Scaled tick length (seconds).
    pub dt: f32,
}

impl<'a> StageContext<'a> {
    pub fn new(scene: &'a Scene, body: &'a Body, config: &'a ControllerConfig, dt: f32) -> Self {
        Self {
            scene,
            body,
            config,
            filter: QueryFilter::new(config.collision_mask),
            up: config.up(),
            dt,
        }
    }

    /// Is a surface with this normal within the walkable slope limit?
    #[inline]
    pub fn is_walkable(&self, normal: &Vec3) -> bool {
        slope_angle_deg(normal, &self.up) <= self.config.slope_limit + SLOPE_TOLERANCE_DEG
    }
}

/// Context for stage tests: the body is left ungated and filtered out by layer instead.
#[cfg(test)]
pub(crate) fn ungated_context<'a>(
    scene: &'a Scene,
    body: &'a Body,
    config: &'a ControllerConfig,
) -> StageContext<'a> {
    let mut ctx = StageContext::new(scene, body, config, 1.0 / 60.0);
    ctx.filter.mask.remove(crate::bitmask_flags::CollisionLayer::Character);
    ctx
}

/// A push applied to a prop once the stages finish reading the scene.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PropPush {
    pub collider: ColliderHandle,
    pub displacement: Vec3,
}

/// Per-tick accumulators passed explicitly through the stages.
///
/// Everything here is consumed by the end of the tick and reset to identity/zero.
#[derive(Clone, Debug)]
pub struct TickScratch {
    pub rotation_delta: Quat,
    pub move_vector: Vec3,
    /// Reflected force queued by a bounce, applied on the next tick.
    pub bounce: Option<Vec3>,
    pub prop_pushes: Vec<PropPush>,
    pub prop_forces: Vec<(ColliderHandle, Vec3)>,
}

impl Default for TickScratch {
    fn default() -> Self {
        Self {
            rotation_delta: Quat::identity(),
            move_vector: Vec3::zeros(),
            bounce: None,
            prop_pushes: Vec::new(),
            prop_forces: Vec::new(),
        }
    }
}

impl TickScratch {
    pub fn reset(&mut self) {
        self.rotation_delta = Quat::identity();
        self.move_vector = Vec3::zeros();
        self.bounce = None;
        self.prop_pushes.clear();
        self.prop_forces.clear();
    }

    pub fn is_neutral(&self) -> bool {
        self.rotation_delta == Quat::identity()
            && self.move_vector == Vec3::zeros()
            && self.bounce.is_none()
            && self.prop_pushes.is_empty()
            && self.prop_forces.is_empty()
    }
}
