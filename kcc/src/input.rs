use crate::collision::types::{Quat, Vec3};
use crate::utils::{is_finite_quat, is_finite_vec};

/// Animation-driven motion for one tick, consumed in root-motion mode.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RootMotion {
    /// Body-local translation for this tick.
    pub translation: Vec3,
    pub rotation: Quat,
}

impl RootMotion {
    pub fn is_finite(&self) -> bool {
        is_finite_vec(&self.translation) && is_finite_quat(&self.rotation)
    }
}

/// Input for one [`crate::motor::CharacterMotor::tick`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickInput {
    /// Strafe input in [-1, 1], +1 toward body-local +X.
    pub horizontal: f32,
    /// Forward input in [-1, 1], +1 toward body-local +Z.
    pub forward: f32,
    /// Yaw about the body up axis (radians).
    pub yaw_delta: f32,
    pub root_motion: Option<RootMotion>,
    /// World-space acceleration (m/s^2) added to the throttle this tick.
    pub additional_motor_force: Vec3,
}

impl Default for TickInput {
    fn default() -> Self {
        Self {
            horizontal: 0.0,
            forward: 0.0,
            yaw_delta: 0.0,
            root_motion: None,
            additional_motor_force: Vec3::zeros(),
        }
    }
}

impl TickInput {
    pub fn walk(horizontal: f32, forward: f32) -> Self {
        Self {
            horizontal,
            forward,
            ..Self::default()
        }
    }

    pub fn with_yaw(mut self, yaw_delta: f32) -> Self {
        self.yaw_delta = yaw_delta;
        self
    }

    /// Body-local motor target, clamped to unit length. Non-finite input yields zero.
    pub fn motor_target(&self) -> Vec3 {
        let target = Vec3::new(self.horizontal, 0.0, self.forward);
        if !is_finite_vec(&target) {
            log::warn!("Ignoring non-finite movement input {target:?}");
            return Vec3::zeros();
        }
        let len = target.norm();
        if len > 1.0 { target / len } else { target }
    }
}
