use crate::collision::types::{Iso, Quat, Vec3};
use crate::scene::PlatformId;

/// Snapshot of the motor handed to hooks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HookState {
    pub pose: Iso,
    pub grounded: bool,
    /// Observed velocity from the previous tick (m/s).
    pub velocity: Vec3,
    pub platform: Option<PlatformId>,
    /// Scaled tick length (seconds).
    pub dt: f32,
}

/// Strategy hooks invoked at fixed points of [`crate::motor::CharacterMotor::tick`].
///
/// Every method has a pass-through default, so an implementation only overrides the stages it
/// cares about. Order within a tick:
/// 1) `modify_rotation` before the rotation is validated against the scene
/// 2) `additional_motor_force` while the throttle is updated
/// 3) `modify_move` before the move is deflected
/// 4) `after_tick` once the pose, forces and events are final
pub trait MotorHooks {
    fn modify_rotation(&mut self, _state: &HookState, delta: Quat) -> Quat {
        delta
    }

    /// Extra world-space acceleration (m/s^2) folded into the throttle.
    fn additional_motor_force(&mut self, _state: &HookState) -> Vec3 {
        Vec3::zeros()
    }

    fn modify_move(&mut self, _state: &HookState, movement: Vec3) -> Vec3 {
        movement
    }

    fn after_tick(&mut self, _state: &HookState) {}
}

/// Hooks that change nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHooks;

impl MotorHooks for NoHooks {}
