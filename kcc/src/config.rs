/*!
Per-character controller configuration.

All fields have working defaults, so a JSON file only needs the values it changes:

```json
{ "mass": 90.0, "slope_limit": 40.0, "max_step_height": 0.4 }
```

Notes
- Distances are in meters, angles in degrees, time in seconds.
- Accelerations and damping rates are per second; damping is applied as `exp(-rate * dt)`.
*/

use serde::{Deserialize, Serialize};

use crate::bitmask_flags::LayerMask;
use crate::collision::types::Vec3;
use crate::constants::{DEFAULT_SKIN, DIST_EPS, GRAVITY_MPS2};
use crate::error::ConfigError;
use crate::material::{ResponseCurve, SurfaceMaterial};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Body mass (kg); scales pushes against props and mass-scaled forces.
    pub mass: f32,
    /// Separation kept between the body and every surface.
    pub skin_width: f32,
    /// Steepest walkable surface (degrees).
    pub slope_limit: f32,
    /// Tallest obstacle the body steps over while grounded.
    pub max_step_height: f32,

    pub motor_acceleration: f32,
    pub motor_damping: f32,
    pub air_motor_acceleration: f32,
    pub air_motor_damping: f32,
    /// Scale applied to backwards input.
    pub backwards_multiplier: f32,

    /// Decay rate of the external force while grounded.
    pub external_damping: f32,
    /// Decay rate of the external force while airborne.
    pub air_external_damping: f32,

    /// How far below the feet a grounded body keeps snapping to the ground.
    pub stickiness: f32,
    pub gravity_direction: Vec3,
    pub gravity_magnitude: f32,

    pub detect_horizontal: bool,
    pub detect_vertical: bool,
    pub collision_mask: LayerMask,
    /// Most distinct colliders a single sweep keeps.
    pub max_collisions: usize,
    pub max_soft_force_frames: usize,
    /// Number of rotation trials, the last of which is always the identity.
    pub rotation_check_iterations: u32,
    pub max_penetration_iterations: u32,

    pub stick_to_platform: bool,
    /// Own speed above which a non-sticky body leaves its platform.
    pub platform_separation_velocity: f32,

    /// Strength of the uphill slowdown.
    pub slope_up_multiplier: f32,
    /// Divisor of the downhill speed-up.
    pub slope_down_multiplier: f32,
    /// Minimum speed fed into bounce reflections.
    pub bounce_modifier: f32,
    /// Maps the wall hit angle (degrees, 0 = head-on) to the share of motion kept as glide.
    pub glide_curve: ResponseCurve,
    pub body_material: SurfaceMaterial,

    /// Consume animation-driven translation and rotation instead of the motor.
    pub root_motion: bool,
    pub time_scale: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            mass: 70.0,
            skin_width: DEFAULT_SKIN,
            slope_limit: 45.0,
            max_step_height: 0.3,
            motor_acceleration: 40.0,
            motor_damping: 8.0,
            air_motor_acceleration: 10.0,
            air_motor_damping: 1.0,
            backwards_multiplier: 0.6,
            external_damping: 6.0,
            air_external_damping: 0.5,
            stickiness: 0.25,
            gravity_direction: Vec3::new(0.0, -1.0, 0.0),
            gravity_magnitude: GRAVITY_MPS2,
            detect_horizontal: true,
            detect_vertical: true,
            collision_mask: LayerMask::solid(),
            max_collisions: 8,
            max_soft_force_frames: 30,
            rotation_check_iterations: 5,
            max_penetration_iterations: 4,
            stick_to_platform: true,
            platform_separation_velocity: 2.0,
            slope_up_multiplier: 1.0,
            slope_down_multiplier: 2.0,
            bounce_modifier: 1.0,
            glide_curve: ResponseCurve::default(),
            body_material: SurfaceMaterial::default(),
            root_motion: false,
            time_scale: 1.0,
        }
    }
}

impl ControllerConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("mass", self.mass),
            ("gravity_magnitude", self.gravity_magnitude),
            ("time_scale", self.time_scale),
            ("slope_down_multiplier", self.slope_down_multiplier),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NotPositive { field, value });
            }
        }

        for (field, value) in [
            ("skin_width", self.skin_width),
            ("max_step_height", self.max_step_height),
            ("motor_acceleration", self.motor_acceleration),
            ("motor_damping", self.motor_damping),
            ("air_motor_acceleration", self.air_motor_acceleration),
            ("air_motor_damping", self.air_motor_damping),
            ("backwards_multiplier", self.backwards_multiplier),
            ("external_damping", self.external_damping),
            ("air_external_damping", self.air_external_damping),
            ("stickiness", self.stickiness),
            ("platform_separation_velocity", self.platform_separation_velocity),
            ("slope_up_multiplier", self.slope_up_multiplier),
            ("bounce_modifier", self.bounce_modifier),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Negative { field, value });
            }
        }

        if !(self.slope_limit.is_finite() && (0.0..=90.0).contains(&self.slope_limit)) {
            return Err(ConfigError::SlopeLimit(self.slope_limit));
        }
        if !self.gravity_direction.iter().all(|c| c.is_finite())
            || self.gravity_direction.norm() <= DIST_EPS
        {
            return Err(ConfigError::DegenerateGravity);
        }
        if self.glide_curve.is_empty() {
            return Err(ConfigError::EmptyGlideCurve);
        }
        if self.max_collisions == 0 {
            return Err(ConfigError::ZeroCount("max_collisions"));
        }
        if self.max_soft_force_frames == 0 {
            return Err(ConfigError::ZeroCount("max_soft_force_frames"));
        }
        if self.rotation_check_iterations == 0 {
            return Err(ConfigError::ZeroCount("rotation_check_iterations"));
        }
        if self.max_penetration_iterations == 0 {
            return Err(ConfigError::ZeroCount("max_penetration_iterations"));
        }
        Ok(())
    }

    /// A copy with every invalid field replaced by its default, logging each replacement.
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        let mut out = self.clone();

        macro_rules! repair {
            ($field:ident, $ok:expr) => {
                let value = out.$field;
                let valid: bool = ($ok)(value);
                if !valid {
                    log::warn!(
                        "Invalid `{}` ({:?}); using default {:?}",
                        stringify!($field),
                        value,
                        defaults.$field
                    );
                    out.$field = defaults.$field;
                }
            };
        }

        let positive = |v: f32| v.is_finite() && v > 0.0;
        let non_negative = |v: f32| v.is_finite() && v >= 0.0;

        repair!(mass, positive);
        repair!(gravity_magnitude, positive);
        repair!(time_scale, positive);
        repair!(slope_down_multiplier, positive);
        repair!(skin_width, non_negative);
        repair!(max_step_height, non_negative);
        repair!(motor_acceleration, non_negative);
        repair!(motor_damping, non_negative);
        repair!(air_motor_acceleration, non_negative);
        repair!(air_motor_damping, non_negative);
        repair!(backwards_multiplier, non_negative);
        repair!(external_damping, non_negative);
        repair!(air_external_damping, non_negative);
        repair!(stickiness, non_negative);
        repair!(platform_separation_velocity, non_negative);
        repair!(slope_up_multiplier, non_negative);
        repair!(bounce_modifier, non_negative);
        repair!(slope_limit, |v: f32| v.is_finite() && (0.0..=90.0).contains(&v));
        repair!(max_collisions, |v: usize| v > 0);
        repair!(max_soft_force_frames, |v: usize| v > 0);
        repair!(rotation_check_iterations, |v: u32| v > 0);
        repair!(max_penetration_iterations, |v: u32| v > 0);
        repair!(gravity_direction, |v: Vec3| {
            v.iter().all(|c| c.is_finite()) && v.norm() > DIST_EPS
        });

        if out.glide_curve.is_empty() {
            log::warn!("Empty `glide_curve`; using the default curve");
            out.glide_curve = defaults.glide_curve;
        }
        out
    }

    /// Unit up direction, opposite to gravity.
    pub fn up(&self) -> Vec3 {
        (-self.gravity_direction)
            .try_normalize(DIST_EPS)
            .unwrap_or_else(Vec3::y)
    }

    /// Unit gravity direction.
    pub fn gravity_dir(&self) -> Vec3 {
        -self.up()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ControllerConfig::default().validate().is_ok());
        assert_eq!(ControllerConfig::default().up(), Vec3::y());
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config =
            ControllerConfig::from_json(r#"{ "mass": 90.0, "max_step_height": 0.4 }"#).unwrap();
        assert_eq!(config.mass, 90.0);
        assert_eq!(config.max_step_height, 0.4);
        assert_eq!(config.slope_limit, 45.0);
        assert_eq!(config.collision_mask, LayerMask::solid());
    }

    #[test]
    fn json_round_trip_preserves_config() {
        let mut config = ControllerConfig::default();
        config.stick_to_platform = false;
        config.glide_curve = ResponseCurve::constant(0.5);
        let json = config.to_json().unwrap();
        assert_eq!(ControllerConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = ControllerConfig::from_json(r#"{ "slope_limit": 120.0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::SlopeLimit(v) if v == 120.0));

        let err = ControllerConfig::from_json(r#"{ "mass": -1.0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::NotPositive { field: "mass", .. }));

        let err = ControllerConfig::from_json(r#"{ "gravity_direction": [0.0, 0.0, 0.0] }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::DegenerateGravity));

        let err = ControllerConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn sanitize_replaces_only_invalid_fields() {
        let config = ControllerConfig {
            mass: f32::NAN,
            skin_width: -0.5,
            max_collisions: 0,
            max_step_height: 0.5,
            ..ControllerConfig::default()
        };
        assert!(config.validate().is_err());

        let fixed = config.sanitized();
        assert!(fixed.validate().is_ok());
        assert_eq!(fixed.mass, 70.0);
        assert_eq!(fixed.skin_width, DEFAULT_SKIN);
        assert_eq!(fixed.max_collisions, 8);
        assert_eq!(fixed.max_step_height, 0.5);
    }
}
