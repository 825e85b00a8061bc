/*!
Vertical deflection: ceilings, ground snapping, grounded state and the slope factor.

Grounded rules
- The ground cast reaches `max(|fall|, max_step_height, stickiness) + step raise + skin`.
- A body that was grounded (and is not being lifted away) snaps down across that whole reach.
- Grounded means the remaining gap is within the skin band and the surface is walkable.
*/

use crate::collision::query::{cast_body, probe_ground_normal, resolve_penetration};
use crate::collision::types::{ContactRecord, Iso, PenetrationOutcome, ShapeHit, Vec3};
use crate::config::ControllerConfig;
use crate::constants::{
    DIST_EPS, FLAT_SLOPE_DEG, GROUND_SETTLE_TOLERANCE, MIN_MOVE_DISTANCE, PERPENDICULAR_TRAVEL_DOT,
};
use crate::movement::scratch::{StageContext, TickScratch};
use crate::utils::{planar, slope_angle_deg, translated};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VerticalOutcome {
    /// Translation to apply after `depenetration`.
    pub movement: Vec3,
    pub depenetration: Vec3,
    pub grounded: bool,
    /// Surface found below the body, walkable or not.
    pub ground: Option<ContactRecord>,
    /// The upward move was cut short by a ceiling.
    pub ceiling_hit: bool,
}

/// Deflect the vertical part of a move.
///
/// - `vertical`: signed travel along up this tick.
/// - `step_raise`: lift already applied by the horizontal stage, to be settled back down.
/// - `leaving`: something is pulling the body off the ground this tick.
pub fn deflect_vertical(
    ctx: &StageContext,
    pose: &Iso,
    vertical: f32,
    step_raise: f32,
    was_grounded: bool,
    leaving: bool,
    scratch: &mut TickScratch,
) -> VerticalOutcome {
    let up = ctx.up;
    if !ctx.config.detect_vertical || !ctx.body.has_movement_volumes() {
        return VerticalOutcome {
            movement: up * (vertical - step_raise),
            ..VerticalOutcome::default()
        };
    }

    if vertical > MIN_MOVE_DISTANCE {
        return rise(ctx, pose, vertical - step_raise);
    }
    settle(ctx, pose, -vertical, step_raise, was_grounded, leaving, scratch)
}

/// Move up, stopping under ceilings.
fn rise(ctx: &StageContext, pose: &Iso, distance: f32) -> VerticalOutcome {
    let up = ctx.up;
    let skin = ctx.config.skin_width;
    let mut out = VerticalOutcome::default();
    if distance <= 0.0 {
        out.movement = up * distance;
        return out;
    }

    let mut origin = *pose;
    for allow_resolve in [true, false] {
        let mut hits = cast_body(
            ctx.scene,
            ctx.body,
            &origin,
            &up,
            distance + skin,
            &ctx.filter,
            ctx.config.max_collisions,
        );
        let Some(hit) = hits.nearest(0) else {
            out.movement = up * distance;
            return out;
        };

        if hit.is_overlap() {
            match resolve_penetration(
                ctx.scene,
                ctx.body,
                &origin,
                &ctx.filter,
                skin,
                ctx.config.max_penetration_iterations,
            ) {
                PenetrationOutcome::Resolved(offset) if allow_resolve => {
                    out.depenetration += offset;
                    origin = translated(&origin, &offset);
                    continue;
                }
                PenetrationOutcome::Clear => {}
                _ => {
                    log::debug!("Unresolved overlap above the body; suppressing vertical movement");
                    out.ceiling_hit = true;
                    return out;
                }
            }
        }

        let travel = (hit.distance - skin).clamp(0.0, distance);
        out.ceiling_hit = travel < distance;
        out.movement = up * travel;
        return out;
    }
    out
}

/// Fall by `fall` (after undoing `step_raise`), snapping to ground within reach.
fn settle(
    ctx: &StageContext,
    pose: &Iso,
    fall: f32,
    step_raise: f32,
    was_grounded: bool,
    leaving: bool,
    scratch: &mut TickScratch,
) -> VerticalOutcome {
    let config = ctx.config;
    let up = ctx.up;
    let skin = config.skin_width;
    let mut out = VerticalOutcome::default();

    let snap_reach = config.max_step_height.max(config.stickiness) + step_raise;
    let reach = fall.max(snap_reach - step_raise) + step_raise;
    let drop = fall + step_raise;

    let mut origin = *pose;
    for allow_resolve in [true, false] {
        let mut hits = cast_body(
            ctx.scene,
            ctx.body,
            &origin,
            &-up,
            reach + skin,
            &ctx.filter,
            config.max_collisions,
        );

        let nearest = hits.nearest(0);
        if let Some(hit) = nearest.filter(ShapeHit::is_overlap) {
            match resolve_penetration(
                ctx.scene,
                ctx.body,
                &origin,
                &ctx.filter,
                skin,
                config.max_penetration_iterations,
            ) {
                PenetrationOutcome::Clear => {}
                PenetrationOutcome::Resolved(offset) if allow_resolve => {
                    out.depenetration += offset;
                    origin = translated(&origin, &offset);
                    continue;
                }
                _ => {
                    log::debug!(
                        "Unresolved overlap with {:?} below the body; suppressing vertical move",
                        hit.collider
                    );
                    return out;
                }
            }
        }

        let Some(hit) = nearest else {
            out.movement = -up * drop;
            return out;
        };

        let normal = probe_ground_normal(ctx.scene, &hit, &up).unwrap_or(hit.normal);
        let walkable = ctx.is_walkable(&normal);
        let gap = hit.distance - skin;

        let snaps =
            walkable && !leaving && (was_grounded || step_raise > 0.0) && gap <= snap_reach;
        let down = if snaps && gap.abs() <= GROUND_SETTLE_TOLERANCE {
            // Already resting in the skin band; cast noise is not a correction.
            0.0
        } else if snaps {
            gap
        } else {
            drop.min(gap.max(0.0))
        };
        out.movement = -up * down;
        out.ground = Some(ContactRecord::from_hit(&hit, normal, origin.translation.vector));
        out.grounded = walkable && !leaving && gap - down <= skin;

        if !walkable {
            // Blocked fall slides down the steep face.
            let blocked = drop - down;
            if blocked > MIN_MOVE_DISTANCE {
                let start = translated(&origin, &out.movement);
                out.movement += slide(ctx, &start, &normal, blocked);
            }
        }

        if out.grounded {
            if let Some(prop) = ctx.scene.prop(hit.collider) {
                if !prop.immovable {
                    let weight = config.gravity_dir() * config.gravity_magnitude * config.mass;
                    scratch.prop_forces.push((hit.collider, weight));
                }
            }
        }
        return out;
    }
    out
}

/// Project a blocked fall onto a steep surface and sweep it.
fn slide(ctx: &StageContext, start: &Iso, normal: &Vec3, blocked: f32) -> Vec3 {
    let skin = ctx.config.skin_width;
    let Some(n) = normal.try_normalize(DIST_EPS) else {
        return Vec3::zeros();
    };
    let fall = -ctx.up * blocked;
    let along = fall - n * fall.dot(&n);
    let len = along.norm();
    if len <= MIN_MOVE_DISTANCE {
        return Vec3::zeros();
    }
    let dir = along / len;

    let mut hits = cast_body(
        ctx.scene,
        ctx.body,
        start,
        &dir,
        len + skin,
        &ctx.filter,
        ctx.config.max_collisions,
    );
    match hits.nearest(0) {
        None => along,
        Some(hit) => dir * (hit.distance - skin).clamp(0.0, len),
    }
}

/// Speed multiplier for travelling along `travel` over ground with `ground_normal`.
///
/// 1 on near-flat ground and for travel across the slope; below 1 uphill, above 1 downhill.
pub fn slope_factor(
    ground_normal: &Vec3,
    travel: &Vec3,
    up: &Vec3,
    config: &ControllerConfig,
) -> f32 {
    let slope = slope_angle_deg(ground_normal, up);
    if slope <= FLAT_SLOPE_DEG || slope >= 90.0 {
        return 1.0;
    }
    let (Some(heading), Some(downhill)) = (
        planar(travel, up).try_normalize(DIST_EPS),
        planar(ground_normal, up).try_normalize(DIST_EPS),
    ) else {
        return 1.0;
    };

    let along = heading.dot(&downhill);
    if along.abs() <= PERPENDICULAR_TRAVEL_DOT {
        return 1.0;
    }
    let steepness = slope.to_radians().sin() * along.abs();
    if along < 0.0 {
        1.0 / (1.0 + config.slope_up_multiplier * steepness)
    } else {
        1.0 + steepness / config.slope_down_multiplier
    }
}
