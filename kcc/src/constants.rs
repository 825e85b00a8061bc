/*!
Motor-wide tolerances.

Per-character tuning lives in [`crate::config::ControllerConfig`]; the values here are the
fixed numerical guards shared by every stage.

Notes
- Distances are in meters, angles in degrees, time in seconds.
- Favor practical world-space tolerances over machine epsilon.
*/

/// Default separation kept between the body and any surface (meters).
pub const DEFAULT_SKIN: f32 = 0.02;

/// Gravity magnitude in meters per second squared (positive value).
pub const GRAVITY_MPS2: f32 = 9.81;

/// Movements shorter than this are treated as zero (meters).
pub const MIN_MOVE_DISTANCE: f32 = 1.0e-5;

/// Practical small distance for comparisons (meters).
pub const DIST_EPS: f32 = 1.0e-6;

/// Extra slope allowance on top of the configured slope limit (degrees).
pub const SLOPE_TOLERANCE_DEG: f32 = 0.5;

/// Ground flatter than this leaves the slope factor at 1 (degrees).
pub const FLAT_SLOPE_DEG: f32 = 2.0;

/// Travel this close to perpendicular to the downhill direction leaves the slope factor at 1.
pub const PERPENDICULAR_TRAVEL_DOT: f32 = 0.05;

/// Props heavier than this multiple of the body mass do not yield when pushed.
pub const PUSH_MASS_RATIO_LIMIT: f32 = 4.0;

/// Ground gaps this small leave a grounded body where it is (meters).
pub const GROUND_SETTLE_TOLERANCE: f32 = 1.0e-3;

/// Back-off used by straight-line normal probes (meters).
pub const NORMAL_PROBE_BACKOFF: f32 = 0.05;

/// Horizontal nudge of ground probes toward the supporting surface (meters).
pub const GROUND_PROBE_NUDGE: f32 = 0.005;

/// Rotations with an angle below this skip collision validation (radians).
pub const MIN_ROTATION_ANGLE: f32 = 1.0e-5;
