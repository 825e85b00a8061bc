/*!
Horizontal deflection: the planar part of a move against walls, steps, slopes and props.

Per nearest hit, in order:
1) Overlaps are resolved along the penetration vector (one correction, then the cast reruns).
2) Low obstacles are stepped over while grounded: up, forward, then a down probe for footing.
3) Walkable surfaces redirect the blocked remainder up the slope, keeping the planar speed.
4) Steep surfaces push props that yield; otherwise the remainder glides along the wall,
   scaled by the glide curve and the combined friction. Bouncy walls queue a reflection.

A second pass re-casts along the slope or glide direction to catch whatever the first pass
did not consider.
*/

use crate::collision::query::{
    cast_body, overlap_body, probe_ground_normal, probe_normal, resolve_penetration,
};
use crate::collision::types::{ContactRecord, Iso, PenetrationOutcome, ShapeHit, Vec3};
use crate::constants::{DIST_EPS, MIN_MOVE_DISTANCE, PUSH_MASS_RATIO_LIMIT};
use crate::material::SurfaceMaterial;
use crate::movement::scratch::{PropPush, StageContext, TickScratch};
use crate::scene::RigidProp;
use crate::utils::{planar, translated};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HorizontalOutcome {
    /// Translation to apply after `depenetration` and `step_raise`.
    pub movement: Vec3,
    /// Offset that pushed the body out of an overlap before moving.
    pub depenetration: Vec3,
    /// Lift used to clear a step; the ground phase settles the body back down.
    pub step_raise: f32,
    /// Steep surface the move ended against, if any.
    pub hit: Option<ContactRecord>,
    /// Glide scalar evaluated against the blocking surface.
    pub glide_scalar: Option<f32>,
    /// Planar normal of the wall that stopped the move; external force into it is absorbed.
    pub blocked_by: Option<Vec3>,
}

#[derive(Clone, Copy, Debug)]
struct StepOver {
    advance: f32,
    lift: f32,
}

enum Pass {
    Settled,
    Depenetrated(Vec3),
}

struct Deflector<'c, 'a> {
    ctx: &'c StageContext<'a>,
    grounded: bool,
    external: Vec3,
}

/// Deflect the planar part of `desired` starting from `pose`.
///
/// `external` is the current external force; it only scales bounces.
pub fn deflect_horizontal(
    ctx: &StageContext,
    pose: &Iso,
    desired: &Vec3,
    grounded: bool,
    external: &Vec3,
    scratch: &mut TickScratch,
) -> HorizontalOutcome {
    let planar_move = planar(desired, &ctx.up);
    let mut out = HorizontalOutcome {
        movement: planar_move,
        ..HorizontalOutcome::default()
    };
    if !ctx.config.detect_horizontal || !ctx.body.has_movement_volumes() {
        return out;
    }
    let len = planar_move.norm();
    if len <= MIN_MOVE_DISTANCE {
        return out;
    }
    let dir = planar_move / len;

    let deflector = Deflector {
        ctx,
        grounded,
        external: *external,
    };
    let mut origin = *pose;
    for allow_resolve in [true, false] {
        match deflector.first_pass(&origin, &dir, len, allow_resolve, scratch, &mut out) {
            Pass::Settled => break,
            Pass::Depenetrated(offset) => {
                out.depenetration += offset;
                origin = translated(&origin, &offset);
            }
        }
    }
    out
}

impl Deflector<'_, '_> {
    fn first_pass(
        &self,
        origin: &Iso,
        dir: &Vec3,
        len: f32,
        allow_resolve: bool,
        scratch: &mut TickScratch,
        out: &mut HorizontalOutcome,
    ) -> Pass {
        let ctx = self.ctx;
        let skin = ctx.config.skin_width;
        let mut hits = cast_body(
            ctx.scene,
            ctx.body,
            origin,
            dir,
            len + skin,
            &ctx.filter,
            ctx.config.max_collisions,
        );

        let mut i = 0;
        while let Some(hit) = hits.nearest(i) {
            i += 1;
            if hit.is_overlap() {
                match resolve_penetration(
                    ctx.scene,
                    ctx.body,
                    origin,
                    &ctx.filter,
                    skin,
                    ctx.config.max_penetration_iterations,
                ) {
                    // Touching the ground we stand on is not an obstacle.
                    PenetrationOutcome::Clear if ctx.is_walkable(&hit.normal) => continue,
                    PenetrationOutcome::Clear => {}
                    PenetrationOutcome::Resolved(offset) if allow_resolve => {
                        return Pass::Depenetrated(offset);
                    }
                    _ => {
                        log::debug!(
                            "Unresolved horizontal overlap with {:?}; suppressing planar movement",
                            hit.collider
                        );
                        out.movement = Vec3::zeros();
                        let at = origin.translation.vector;
                        out.hit = Some(ContactRecord::from_hit(&hit, hit.normal, at));
                        return Pass::Settled;
                    }
                }
            }
            self.respond(origin, dir, len, &hit, scratch, out);
            return Pass::Settled;
        }

        out.movement = dir * len;
        Pass::Settled
    }

    fn respond(
        &self,
        origin: &Iso,
        dir: &Vec3,
        len: f32,
        hit: &ShapeHit,
        scratch: &mut TickScratch,
        out: &mut HorizontalOutcome,
    ) {
        let ctx = self.ctx;
        let skin = ctx.config.skin_width;
        let travel = (hit.distance - skin).clamp(0.0, len);
        let residual = len - travel;

        // 1) Step over low obstacles.
        if let Some(step) = self.try_step(origin, dir, len, hit) {
            out.step_raise = step.lift;
            out.movement = dir * step.advance;
            return;
        }

        let normal = probe_normal(ctx.scene, hit, dir).unwrap_or(hit.normal);
        let start = translated(origin, &(dir * travel));

        // 2) Walkable slope: climb along it.
        if ctx.is_walkable(&normal) {
            let climb = self.climb(&normal, dir, residual);
            let taken = self.second_pass(&start, &climb, out);
            out.movement = dir * travel + taken;
            return;
        }

        // 3) Steep: push, glide, bounce.
        out.hit = Some(ContactRecord::from_hit(hit, normal, origin.translation.vector));
        out.movement = dir * travel;

        if let Some(prop) = ctx.scene.prop(hit.collider) {
            if self.yields(prop) {
                let ratio = ctx.config.mass / (ctx.config.mass + prop.mass);
                scratch.prop_pushes.push(PropPush {
                    collider: hit.collider,
                    displacement: dir * residual * ratio,
                });
                return;
            }
        }

        let material = ctx
            .scene
            .collider(hit.collider)
            .map(|c| *c.material())
            .unwrap_or(SurfaceMaterial::FRICTIONLESS);
        let body_material = &ctx.config.body_material;

        let wall = planar(&normal, &ctx.up).try_normalize(DIST_EPS);
        let Some(wall) = wall else {
            out.glide_scalar = Some(0.0);
            return;
        };
        out.blocked_by = Some(wall);

        let bounciness = body_material.combined_bounciness(&material);
        if bounciness > 0.0 {
            let reflected = dir - wall * (2.0 * dir.dot(&wall));
            let strength = self.external.norm().max(ctx.config.bounce_modifier) * bounciness;
            scratch.bounce = Some(reflected * strength);
        }

        let mut tangent = ctx.up.cross(&wall);
        if tangent.dot(dir) < 0.0 {
            tangent = -tangent;
        }
        // 0 degrees is head-on.
        let angle = (-wall.dot(dir)).clamp(-1.0, 1.0).acos().to_degrees();
        let friction = body_material.combined_friction(&material);
        let scalar = ctx.config.glide_curve.evaluate(angle) * (1.0 - friction);
        out.glide_scalar = Some(scalar);

        let glide = residual * scalar;
        if glide < skin {
            return;
        }
        let taken = self.second_pass(&start, &(tangent * glide), out);
        out.movement += taken;
    }

    /// Re-cast a redirected move. Returns the part of `movement` that can be taken.
    fn second_pass(&self, start: &Iso, movement: &Vec3, out: &mut HorizontalOutcome) -> Vec3 {
        let ctx = self.ctx;
        let skin = ctx.config.skin_width;
        let len = movement.norm();
        if len <= MIN_MOVE_DISTANCE {
            return *movement;
        }
        let dir = movement / len;

        let mut hits = cast_body(
            ctx.scene,
            ctx.body,
            start,
            &dir,
            len + skin,
            &ctx.filter,
            ctx.config.max_collisions,
        );
        let mut i = 0;
        while let Some(hit) = hits.nearest(i) {
            i += 1;
            if hit.is_overlap() {
                if ctx.is_walkable(&hit.normal) {
                    continue;
                }
                return Vec3::zeros();
            }

            let travel = (hit.distance - skin).clamp(0.0, len);
            let normal = probe_normal(ctx.scene, &hit, &dir).unwrap_or(hit.normal);
            if ctx.is_walkable(&normal) {
                return dir * travel + self.climb(&normal, &dir, len - travel);
            }
            if let Some(step) = self.try_step(start, &dir, len, &hit) {
                out.step_raise = step.lift;
                return dir * step.advance;
            }
            if out.hit.is_none() {
                out.hit = Some(ContactRecord::from_hit(&hit, normal, start.translation.vector));
            }
            return dir * travel;
        }
        *movement
    }

    /// Up, forward, down. `None` when the obstacle cannot be stepped over.
    fn try_step(&self, origin: &Iso, dir: &Vec3, len: f32, hit: &ShapeHit) -> Option<StepOver> {
        let ctx = self.ctx;
        let config = ctx.config;
        let skin = config.skin_width;
        let up = ctx.up;

        if !self.grounded || config.max_step_height <= 0.0 {
            return None;
        }
        let height = (hit.point - origin.translation.vector).dot(&up);
        let lift = config.max_step_height + skin;
        if height > lift {
            return None;
        }

        let cap = config.max_collisions;
        let mut above = cast_body(ctx.scene, ctx.body, origin, &up, lift + skin, &ctx.filter, cap);
        if above.nearest(0).is_some() {
            return None;
        }

        let raised = translated(origin, &(up * lift));
        let mut ahead = cast_body(ctx.scene, ctx.body, &raised, dir, len + skin, &ctx.filter, cap);
        // The same surface reappearing just ahead of the raised body means a wall, not a step.
        let advance = match ahead.nearest(0) {
            None => len,
            Some(h) if h.collider != hit.collider && h.distance > hit.distance + skin => {
                (h.distance - skin).min(len)
            }
            Some(h) if h.distance > hit.distance + ctx.body.min_radius() => {
                (h.distance - skin).min(len)
            }
            Some(_) => return None,
        };

        let landing = translated(&raised, &(dir * advance));
        if !overlap_body(ctx.scene, ctx.body, &landing, &ctx.filter).is_clear() {
            return None;
        }
        let mut below =
            cast_body(ctx.scene, ctx.body, &landing, &-up, lift + skin, &ctx.filter, cap);
        if let Some(footing) = below.nearest(0) {
            let normal = probe_ground_normal(ctx.scene, &footing, &up).unwrap_or(footing.normal);
            if !ctx.is_walkable(&normal) {
                return None;
            }
        }

        log::trace!("Stepping over {:?} ({height:.3} m)", hit.collider);
        Some(StepOver { advance, lift })
    }

    /// `remainder` of planar travel redirected along a walkable surface.
    fn climb(&self, normal: &Vec3, dir: &Vec3, remainder: f32) -> Vec3 {
        let Some(n) = normal.try_normalize(DIST_EPS) else {
            return dir * remainder;
        };
        let along = dir - n * dir.dot(&n);
        let planar_len = planar(&along, &self.ctx.up).norm();
        if planar_len <= DIST_EPS {
            return Vec3::zeros();
        }
        along * (remainder / planar_len)
    }

    fn yields(&self, prop: &RigidProp) -> bool {
        !prop.immovable && prop.mass <= PUSH_MASS_RATIO_LIMIT * self.ctx.config.mass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{Body, VolumeDesc};
    use crate::config::ControllerConfig;
    use crate::material::CombineRule;
    use crate::movement::scratch::ungated_context;
    use crate::scene::{ColliderShapeDef, Scene};
    use approx::assert_relative_eq;

    const SKIN: f32 = 0.02;

    fn floor_scene() -> Scene {
        let mut scene = Scene::new();
        scene.insert_static(
            ColliderShapeDef::Plane {
                offset_along_normal: 0.0,
            },
            Iso::identity(),
        );
        scene
    }

    fn capsule(scene: &mut Scene) -> Body {
        let mut body = Body::new();
        body.add_volume(scene, VolumeDesc::capsule(0.3, 1.8), &Iso::identity());
        body
    }

    fn box_at(scene: &mut Scene, half: Vec3, center: Vec3) -> crate::scene::ColliderHandle {
        scene.insert_static(
            ColliderShapeDef::Cuboid { half_extents: half },
            Iso::translation(center.x, center.y, center.z),
        )
    }

    fn standing() -> Iso {
        Iso::translation(0.0, SKIN, 0.0)
    }

    fn deflect(
        scene: &Scene,
        body: &Body,
        desired: Vec3,
        grounded: bool,
    ) -> (HorizontalOutcome, TickScratch) {
        let config = ControllerConfig::default();
        let ctx = ungated_context(scene, body, &config);
        let mut scratch = TickScratch::default();
        let out =
            deflect_horizontal(&ctx, &standing(), &desired, grounded, &Vec3::zeros(), &mut scratch);
        (out, scratch)
    }

    #[test]
    fn open_ground_passes_the_planar_move_through() {
        let mut scene = floor_scene();
        let body = capsule(&mut scene);
        let (out, scratch) = deflect(&scene, &body, Vec3::new(0.3, -0.2, 0.4), true);
        assert_relative_eq!(out.movement, Vec3::new(0.3, 0.0, 0.4), epsilon = 1.0e-6);
        assert_eq!(out.hit, None);
        assert_eq!(out.step_raise, 0.0);
        assert!(scratch.is_neutral());
    }

    #[test]
    fn head_on_wall_stops_at_the_skin() {
        let mut scene = floor_scene();
        let wall = box_at(&mut scene, Vec3::new(2.0, 2.0, 0.1), Vec3::new(0.0, 2.0, 1.1));
        let body = capsule(&mut scene);

        let (out, _) = deflect(&scene, &body, Vec3::new(0.0, 0.0, 1.0), true);
        assert_relative_eq!(out.movement, Vec3::new(0.0, 0.0, 0.7 - SKIN), epsilon = 1.0e-3);
        assert_eq!(out.glide_scalar, Some(0.0));
        let hit = out.hit.unwrap();
        assert_eq!(hit.collider, wall);
        assert_relative_eq!(hit.normal, -Vec3::z(), epsilon = 1.0e-3);
    }

    #[test]
    fn oblique_wall_glides_along_the_face() {
        let mut scene = floor_scene();
        box_at(&mut scene, Vec3::new(4.0, 2.0, 0.1), Vec3::new(0.0, 2.0, 1.1));
        let body = capsule(&mut scene);

        let dir = Vec3::new(1.0, 0.0, 1.0).normalize();
        let (out, _) = deflect(&scene, &body, dir * 1.2, false);

        // Blocked 0.7 m in front at 45 degrees: travel 0.7 * sqrt(2) - skin along `dir`.
        let travel = 0.7 * std::f32::consts::SQRT_2 - SKIN;
        let glide = (1.2 - travel) * 0.5;
        assert_relative_eq!(out.glide_scalar.unwrap(), 0.5, epsilon = 1.0e-3);
        assert_relative_eq!(out.movement.z, travel * dir.z, epsilon = 1.0e-3);
        assert_relative_eq!(out.movement.x, travel * dir.x + glide, epsilon = 1.0e-3);
        assert!(out.movement.z < 0.7);
    }

    #[test]
    fn friction_scales_the_glide_away() {
        let mut scene = floor_scene();
        let wall = box_at(&mut scene, Vec3::new(4.0, 2.0, 0.1), Vec3::new(0.0, 2.0, 1.1));
        let rough = SurfaceMaterial::new(1.0, 0.0);
        scene.set_material(wall, rough.with_combine(CombineRule::Max, CombineRule::Average));
        let body = capsule(&mut scene);

        let dir = Vec3::new(1.0, 0.0, 1.0).normalize();
        let (out, _) = deflect(&scene, &body, dir * 1.2, false);
        assert_eq!(out.glide_scalar, Some(0.0));
        assert_relative_eq!(out.movement.x, out.movement.z, epsilon = 1.0e-4);
        assert!(out.hit.is_some());
    }

    #[test]
    fn low_step_is_climbed_without_losing_speed() {
        let mut scene = floor_scene();
        // 0.2 m tall step whose face is 0.5 m ahead.
        box_at(&mut scene, Vec3::new(2.0, 0.1, 1.0), Vec3::new(0.0, 0.1, 1.5));
        let body = capsule(&mut scene);

        let (out, _) = deflect(&scene, &body, Vec3::new(0.0, 0.0, 0.4), true);
        assert_relative_eq!(out.step_raise, 0.3 + SKIN, epsilon = 1.0e-6);
        assert_relative_eq!(out.movement, Vec3::new(0.0, 0.0, 0.4), epsilon = 1.0e-4);
        assert_eq!(out.hit, None);
    }

    #[test]
    fn steps_need_ground_and_a_short_obstacle() {
        let mut scene = floor_scene();
        box_at(&mut scene, Vec3::new(2.0, 0.1, 1.0), Vec3::new(0.0, 0.1, 1.5));
        let body = capsule(&mut scene);
        let (airborne, _) = deflect(&scene, &body, Vec3::new(0.0, 0.0, 0.4), false);
        assert_eq!(airborne.step_raise, 0.0);

        let mut scene = floor_scene();
        box_at(&mut scene, Vec3::new(2.0, 0.3, 1.0), Vec3::new(0.0, 0.3, 1.5));
        let body = capsule(&mut scene);
        let (tall, _) = deflect(&scene, &body, Vec3::new(0.0, 0.0, 0.4), true);
        assert_eq!(tall.step_raise, 0.0);
        assert_relative_eq!(tall.movement.z, 0.2 - SKIN, epsilon = 1.0e-3);
        assert!(tall.hit.is_some());
    }

    #[test]
    fn light_props_are_pushed_and_heavy_ones_are_not() {
        let mut scene = floor_scene();
        let crate_box = scene.insert_prop(
            ColliderShapeDef::Cuboid {
                half_extents: Vec3::new(0.25, 0.25, 0.25),
            },
            Iso::translation(0.0, 1.0, 1.0),
            10.0,
        );
        let body = capsule(&mut scene);

        let (out, scratch) = deflect(&scene, &body, Vec3::new(0.0, 0.0, 1.0), false);
        assert_relative_eq!(out.movement.z, 0.45 - SKIN, epsilon = 1.0e-3);
        assert_eq!(scratch.prop_pushes.len(), 1);
        let push = scratch.prop_pushes[0];
        assert_eq!(push.collider, crate_box);
        let ratio = 70.0 / 80.0;
        assert_relative_eq!(push.displacement.z, (1.0 - (0.45 - SKIN)) * ratio, epsilon = 1.0e-3);

        scene.set_prop_immovable(crate_box, true);
        let (out, scratch) = deflect(&scene, &body, Vec3::new(0.0, 0.0, 1.0), false);
        assert!(scratch.prop_pushes.is_empty());
        assert_eq!(out.glide_scalar, Some(0.0));
    }

    #[test]
    fn bouncy_wall_queues_a_reflection() {
        let mut scene = floor_scene();
        let wall = box_at(&mut scene, Vec3::new(2.0, 2.0, 0.1), Vec3::new(0.0, 2.0, 1.1));
        let springy = SurfaceMaterial::new(0.0, 0.8);
        scene.set_material(wall, springy.with_combine(CombineRule::Average, CombineRule::Max));
        let body = capsule(&mut scene);

        let (out, scratch) = deflect(&scene, &body, Vec3::new(0.0, 0.0, 1.0), true);
        // Reflected head-on, scaled by max(|external| = 0, bounce_modifier = 1) * 0.8.
        assert_relative_eq!(scratch.bounce.unwrap(), Vec3::new(0.0, 0.0, -0.8), epsilon = 1.0e-3);
        assert_relative_eq!(out.blocked_by.unwrap(), Vec3::new(0.0, 0.0, -1.0), epsilon = 1.0e-3);
    }

    #[test]
    fn walkable_ramp_is_climbed_at_full_planar_speed() {
        let mut scene = floor_scene();
        // 20 degree ramp rising toward +Z from z = 0.5.
        let tilt =
            crate::collision::types::Quat::from_axis_angle(&Vec3::x_axis(), -20.0_f32.to_radians());
        scene.insert_static(
            ColliderShapeDef::Plane {
                offset_along_normal: 0.0,
            },
            Iso::from_parts(nalgebra::Translation3::new(0.0, 0.0, 0.5), tilt),
        );
        let body = capsule(&mut scene);

        let config = ControllerConfig {
            max_step_height: 0.0,
            ..ControllerConfig::default()
        };
        let ctx = ungated_context(&scene, &body, &config);
        let mut scratch = TickScratch::default();
        let desired = Vec3::new(0.0, 0.0, 0.8);
        let out =
            deflect_horizontal(&ctx, &standing(), &desired, true, &Vec3::zeros(), &mut scratch);

        assert_relative_eq!(planar(&out.movement, &Vec3::y()).norm(), 0.8, epsilon = 1.0e-3);
        assert!(out.movement.y > 0.0);
        assert_eq!(out.hit, None);
    }
}
