use crate::collision::query::penetrations;
use crate::collision::types::{Iso, Quat};
use crate::constants::MIN_ROTATION_ANGLE;
use crate::movement::scratch::StageContext;
use crate::utils::is_finite_quat;

/// Largest fraction of `delta` the body can turn by from `pose`.
///
/// Trials shrink geometrically, `t = 1, 1/2, 1/4, ...`, with the last of the configured
/// iterations always the identity. A trial is accepted when none of the volumes it moves
/// overlaps anything, or when every overlapped surface is walkable.
///
/// Bodies whose volumes are unchanged by the rotation skip the check unless `force_check`.
pub fn resolve_rotation(ctx: &StageContext, pose: &Iso, delta: &Quat, force_check: bool) -> Quat {
    if !is_finite_quat(delta) {
        log::warn!("Ignoring non-finite rotation delta {delta:?}");
        return Quat::identity();
    }
    if delta.angle() < MIN_ROTATION_ANGLE || !ctx.body.has_movement_volumes() {
        return *delta;
    }
    if !force_check && ctx.body.is_symmetric_under(&pose.rotation, delta) {
        return *delta;
    }

    let scaled = delta.scaled_axis();
    let iterations = ctx.config.rotation_check_iterations.max(1);
    let mut t = 1.0_f32;
    for _ in 1..iterations {
        let trial = Quat::from_scaled_axis(scaled * t);
        if rotation_is_clear(ctx, pose, &trial, force_check) {
            return trial;
        }
        t *= 0.5;
    }

    log::trace!("Rotation fully blocked; keeping the current orientation");
    Quat::identity()
}

fn rotation_is_clear(ctx: &StageContext, pose: &Iso, trial: &Quat, force_check: bool) -> bool {
    let rotated = Iso::from_parts(pose.translation, trial * pose.rotation);

    ctx.body
        .volumes()
        .iter()
        .filter(|v| force_check || v.is_displaced_by(&pose.rotation, trial))
        .all(|volume| {
            penetrations(ctx.scene, volume.shape(), &volume.world_pose(&rotated), &ctx.filter)
                .iter()
                .all(|pen| ctx.is_walkable(&pen.direction))
        })
}
