/*!
Motor throttle and external forces.

Units
- Throttle and external force are velocities (m/s); each tick moves the body by `v * dt`.
- The throttle is stored in the body frame, so turning the body turns its momentum with it.
- Damping is exponential: `v *= exp(-rate * dt)`.
*/

use serde::{Deserialize, Serialize};

use crate::collision::types::{Quat, Vec3};
use crate::config::ControllerConfig;
use crate::utils::is_finite_vec;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForceSpace {
    #[default]
    World,
    /// Body frame; rotated into the world by the body's current orientation.
    Local,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForceMode {
    /// Applied to the external force immediately.
    #[default]
    Impulse,
    /// Spread evenly over the next `frames` ticks.
    Soft { frames: usize },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForceOptions {
    pub space: ForceSpace,
    pub mode: ForceMode,
    /// Divide by the body mass.
    pub mass_scaled: bool,
    /// Multiply by the body's time scale.
    pub time_scaled: bool,
}

impl ForceOptions {
    pub fn soft(frames: usize) -> Self {
        Self {
            mode: ForceMode::Soft { frames },
            ..Self::default()
        }
    }

    pub fn local(mut self) -> Self {
        self.space = ForceSpace::Local;
        self
    }
}

/// Fixed-capacity ring of pending force contributions, one slot consumed per tick.
#[derive(Clone, Debug)]
pub struct SoftForceRing {
    slots: Vec<Vec3>,
    head: usize,
}

impl SoftForceRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![Vec3::zeros(); capacity.max(1)],
            head: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Spread `total` over the next `frames` ticks.
    ///
    /// Spans longer than the ring are shortened to the ring's capacity, keeping the total.
    pub fn add(&mut self, total: Vec3, frames: usize) {
        let capacity = self.capacity();
        let frames = if frames > capacity {
            log::warn!(
                "Soft force over {frames} frames exceeds the {capacity}-frame limit; clamping"
            );
            capacity
        } else {
            frames.max(1)
        };

        let share = total / frames as f32;
        for i in 0..frames {
            self.slots[(self.head + i) % capacity] += share;
        }
    }

    /// Contribution for the current tick; advances the ring.
    pub fn consume(&mut self) -> Vec3 {
        let value = std::mem::replace(&mut self.slots[self.head], Vec3::zeros());
        self.head = (self.head + 1) % self.capacity();
        value
    }

    /// Sum of everything still queued.
    pub fn pending(&self) -> Vec3 {
        self.slots.iter().sum()
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = Vec3::zeros());
        self.head = 0;
    }
}

#[derive(Clone, Debug)]
pub struct ForceModel {
    throttle_local: Vec3,
    external: Vec3,
    soft: SoftForceRing,
}

impl ForceModel {
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            throttle_local: Vec3::zeros(),
            external: Vec3::zeros(),
            soft: SoftForceRing::new(config.max_soft_force_frames),
        }
    }

    /// Queue a force. Returns false (and logs) when `force` is not finite.
    pub fn add_force(
        &mut self,
        force: Vec3,
        options: ForceOptions,
        rotation: &Quat,
        config: &ControllerConfig,
        time_scale: f32,
    ) -> bool {
        if !is_finite_vec(&force) {
            log::warn!("Ignoring non-finite force {force:?}");
            return false;
        }

        let mut world = match options.space {
            ForceSpace::World => force,
            ForceSpace::Local => rotation * force,
        };
        if options.mass_scaled {
            world /= config.mass;
        }
        if options.time_scaled {
            world *= time_scale;
        }

        match options.mode {
            ForceMode::Impulse => self.external += world,
            ForceMode::Soft { frames } => self.soft.add(world, frames),
        }
        true
    }

    /// Move this tick's soft-force slot into the external force.
    pub fn consume_soft(&mut self) -> Vec3 {
        let share = self.soft.consume();
        self.external += share;
        share
    }

    /// Accelerate the throttle toward `target_local` and damp it.
    ///
    /// - `target_local`: body-frame input, `+Z` forward; backwards input is scaled down.
    /// - `additional_world`: extra acceleration from hooks or abilities.
    /// - `slope_factor`: scales the input acceleration (below 1 uphill, above 1 downhill).
    #[allow(clippy::too_many_arguments)]
    pub fn update_throttle(
        &mut self,
        target_local: Vec3,
        additional_world: Vec3,
        rotation: &Quat,
        slope_factor: f32,
        grounded: bool,
        dt: f32,
        config: &ControllerConfig,
    ) {
        let mut target = target_local;
        if target.z < 0.0 {
            target.z *= config.backwards_multiplier;
        }

        let (acceleration, damping) = if grounded {
            (config.motor_acceleration, config.motor_damping)
        } else {
            (config.air_motor_acceleration, config.air_motor_damping)
        };

        let additional_local = rotation.inverse() * additional_world;
        self.throttle_local += (target * acceleration * slope_factor + additional_local) * dt;
        self.throttle_local *= (-damping * dt).exp();
    }

    /// World-space motor velocity for the body orientation `rotation`.
    #[inline]
    pub fn motor_velocity(&self, rotation: &Quat) -> Vec3 {
        rotation * self.throttle_local
    }

    #[inline]
    pub fn throttle_local(&self) -> Vec3 {
        self.throttle_local
    }

    /// Fold a world-space velocity into the throttle.
    pub fn add_motor_world(&mut self, velocity: Vec3, rotation: &Quat) {
        self.throttle_local += rotation.inverse() * velocity;
    }

    #[inline]
    pub fn external(&self) -> Vec3 {
        self.external
    }

    pub fn add_external(&mut self, velocity: Vec3) {
        self.external += velocity;
    }

    #[inline]
    pub fn soft(&self) -> &SoftForceRing {
        &self.soft
    }

    pub fn decay(&mut self, grounded: bool, dt: f32, config: &ControllerConfig) {
        let damping = if grounded {
            config.external_damping
        } else {
            config.air_external_damping
        };
        self.external *= (-damping * dt).exp();
    }

    /// Drop the upward part of every velocity (after hitting a ceiling).
    pub fn clear_upward(&mut self, up: &Vec3, rotation: &Quat) {
        let rise = self.external.dot(up);
        if rise > 0.0 {
            self.external -= up * rise;
        }
        let local_up = rotation.inverse() * up;
        let rise = self.throttle_local.dot(&local_up);
        if rise > 0.0 {
            self.throttle_local -= local_up * rise;
        }
    }

    /// Drop the part of the external force driving into a wall with outward `normal`.
    pub fn absorb_into(&mut self, normal: &Vec3) {
        let into = self.external.dot(normal);
        if into < 0.0 {
            self.external -= normal * into;
        }
    }

    pub fn clear(&mut self) {
        self.throttle_local = Vec3::zeros();
        self.external = Vec3::zeros();
        self.soft.clear();
    }
}
