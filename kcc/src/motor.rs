/*!
Character motor: the per-tick orchestration of the movement stages.

Tick order
1) Platform carry: the attached platform's motion is composed into the pose.
2) Rotation: yaw, root motion and hooks, re-aligned to up, then validated against the scene.
3) Forces: soft-force slot, slope factor, throttle update, desired move.
4) Platform separation (when not sticking to platforms).
5) Horizontal deflection, then vertical deflection.
6) Prop pushes and weights are applied to the scene.
7) Platform attach/detach bookkeeping.
8) Force decay, gravity accumulation, bounce queueing.
9) Body sync, observed velocities, events, `after_tick`.

Notes
- Every scene query of a tick runs behind one closed [`ColliderGate`], so the body never hits
  its own volumes. The gate restores the layers when the tick returns.
- `dt` is scaled by the motor time scale; observed velocities use the unscaled `dt`.
*/

use nalgebra as na;

use crate::body::{Body, VolumeDesc, align_up};
use crate::collision::gate::ColliderGate;
use crate::collision::types::{ContactRecord, Iso, Quat, Vec3};
use crate::config::ControllerConfig;
use crate::constants::{DIST_EPS, MIN_MOVE_DISTANCE};
use crate::events::{EventChannel, MotorEvent};
use crate::hooks::{HookState, MotorHooks, NoHooks};
use crate::input::{RootMotion, TickInput};
use crate::movement::{
    ForceModel, ForceOptions, PlatformAttachment, PlatformTracker, StageContext, TickScratch,
    deflect_horizontal, deflect_vertical, resolve_rotation, slope_factor,
};
use crate::scene::{ColliderHandle, PlatformId, Scene};
use crate::utils::{is_finite_vec, translated, vertical, yaw_rotation};

/// Observable motor state, updated at the end of every tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotorState {
    pub grounded: bool,
    /// Accumulated fall speed along gravity (m/s).
    pub gravity_speed: f32,
    pub slope_factor: f32,
    /// Observed velocity over the last tick (m/s).
    pub velocity: Vec3,
    /// Observed velocity relative to the platform the body rides.
    pub platform_velocity: Vec3,
    pub ground: Option<ContactRecord>,
    pub horizontal_hit: Option<ContactRecord>,
    pub glide_scalar: Option<f32>,
    pub time_scale: f32,
    /// Highest point along up since the body last stood on the ground.
    apex: f32,
}

impl Default for MotorState {
    fn default() -> Self {
        Self {
            grounded: false,
            gravity_speed: 0.0,
            slope_factor: 1.0,
            velocity: Vec3::zeros(),
            platform_velocity: Vec3::zeros(),
            ground: None,
            horizontal_hit: None,
            glide_scalar: None,
            time_scale: 1.0,
            apex: 0.0,
        }
    }
}

/// What one tick did.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickReport {
    pub grounded: bool,
    /// Move requested by input and forces, before deflection.
    pub desired: Vec3,
    /// Translation applied by the horizontal stage, step raise and depenetration included.
    pub horizontal: Vec3,
    /// Translation applied by the vertical stage.
    pub vertical: Vec3,
    pub platform_translation: Vec3,
    /// Accepted rotation delta.
    pub rotation: Quat,
}

impl TickReport {
    fn idle(grounded: bool) -> Self {
        Self {
            grounded,
            desired: Vec3::zeros(),
            horizontal: Vec3::zeros(),
            vertical: Vec3::zeros(),
            platform_translation: Vec3::zeros(),
            rotation: Quat::identity(),
        }
    }
}

pub struct CharacterMotor {
    config: ControllerConfig,
    body: Body,
    pose: Iso,
    forces: ForceModel,
    platform: PlatformTracker,
    scratch: TickScratch,
    state: MotorState,
    events: EventChannel,
    hooks: Box<dyn MotorHooks>,
}

impl CharacterMotor {
    /// A motor without volumes. Invalid config fields are replaced by their defaults.
    pub fn new(config: ControllerConfig, pose: Iso) -> Self {
        if let Err(err) = config.validate() {
            log::warn!("Invalid controller config ({err}); sanitizing");
        }
        let config = config.sanitized();
        let up = config.up();
        let pose = Iso::from_parts(pose.translation, align_up(&pose.rotation, &up));
        let state = MotorState {
            time_scale: config.time_scale,
            apex: pose.translation.vector.dot(&up),
            ..MotorState::default()
        };
        Self {
            forces: ForceModel::new(&config),
            config,
            body: Body::new(),
            pose,
            platform: PlatformTracker::new(),
            scratch: TickScratch::default(),
            state,
            events: EventChannel::new(),
            hooks: Box::new(NoHooks),
        }
    }

    pub fn with_volumes(
        config: ControllerConfig,
        scene: &mut Scene,
        pose: Iso,
        volumes: &[VolumeDesc],
    ) -> Self {
        let mut motor = Self::new(config, pose);
        for desc in volumes {
            motor.add_volume(scene, *desc);
        }
        if !motor.body.has_movement_volumes() {
            log::warn!("Character motor has no movement volumes; collisions are disabled");
        }
        motor
    }

    pub fn add_volume(&mut self, scene: &mut Scene, desc: VolumeDesc) -> ColliderHandle {
        self.body.add_volume(scene, desc, &self.pose)
    }

    pub fn remove_volume(&mut self, scene: &mut Scene, collider: ColliderHandle) -> bool {
        self.body.remove_volume(scene, collider)
    }

    pub fn set_hooks(&mut self, hooks: Box<dyn MotorHooks>) {
        self.hooks = hooks;
    }

    pub fn events_mut(&mut self) -> &mut EventChannel {
        &mut self.events
    }

    // --- Accessors ---

    #[inline]
    pub fn pose(&self) -> &Iso {
        &self.pose
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        self.pose.translation.vector
    }

    #[inline]
    pub fn rotation(&self) -> Quat {
        self.pose.rotation
    }

    pub fn up(&self) -> Vec3 {
        self.config.up()
    }

    #[inline]
    pub fn is_grounded(&self) -> bool {
        self.state.grounded
    }

    #[inline]
    pub fn velocity(&self) -> Vec3 {
        self.state.velocity
    }

    #[inline]
    pub fn platform_velocity(&self) -> Vec3 {
        self.state.platform_velocity
    }

    #[inline]
    pub fn platform(&self) -> Option<PlatformId> {
        self.platform.platform()
    }

    pub fn platform_attachment(&self) -> Option<&PlatformAttachment> {
        self.platform.attachment()
    }

    #[inline]
    pub fn ground(&self) -> Option<&ContactRecord> {
        self.state.ground.as_ref()
    }

    #[inline]
    pub fn horizontal_hit(&self) -> Option<&ContactRecord> {
        self.state.horizontal_hit.as_ref()
    }

    #[inline]
    pub fn slope_factor(&self) -> f32 {
        self.state.slope_factor
    }

    #[inline]
    pub fn state(&self) -> &MotorState {
        &self.state
    }

    #[inline]
    pub fn forces(&self) -> &ForceModel {
        &self.forces
    }

    #[inline]
    pub fn body(&self) -> &Body {
        &self.body
    }

    #[inline]
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn collider_handles(&self) -> impl Iterator<Item = ColliderHandle> + '_ {
        self.body.collider_handles()
    }

    // --- Commands ---

    /// Queue a force; see [`ForceOptions`]. Returns false for non-finite forces.
    pub fn add_force(&mut self, force: Vec3, options: ForceOptions) -> bool {
        self.forces.add_force(
            force,
            options,
            &self.pose.rotation,
            &self.config,
            self.state.time_scale,
        )
    }

    pub fn set_time_scale(&mut self, scale: f32) -> bool {
        if !(scale.is_finite() && scale > 0.0) {
            log::warn!("Ignoring invalid time scale {scale}");
            return false;
        }
        let previous = self.state.time_scale;
        if previous == scale {
            return true;
        }
        self.state.time_scale = scale;
        self.events.emit(MotorEvent::TimeScaleChanged {
            previous,
            current: scale,
        });
        true
    }

    /// Rotate by `delta` right away, shrinking it if the scene blocks it.
    pub fn rotate(&mut self, scene: &mut Scene, delta: &Quat, force_check: bool) -> Quat {
        scene.refresh();
        let mut gate =
            ColliderGate::closed(scene, self.body.collider_handles().collect::<Vec<_>>());
        let ctx = StageContext::new(&gate, &self.body, &self.config, 0.0);
        let accepted = resolve_rotation(&ctx, &self.pose, delta, force_check);
        self.pose.rotation = accepted * self.pose.rotation;
        self.body.sync(&mut gate, &self.pose);
        accepted
    }

    /// Change gravity and turn the body to match, checking every volume on the way.
    pub fn set_gravity_direction(&mut self, scene: &mut Scene, direction: Vec3) -> bool {
        if !is_finite_vec(&direction) || direction.norm() <= DIST_EPS {
            log::warn!("Ignoring degenerate gravity direction {direction:?}");
            return false;
        }
        self.config.gravity_direction = direction;
        let up = self.config.up();
        let target = align_up(&self.pose.rotation, &up);
        let delta = target * self.pose.rotation.inverse();
        let accepted = self.rotate(scene, &delta, true);
        if accepted != delta {
            log::debug!("Up realignment blocked; finishing it over the next ticks");
        }
        true
    }

    /// Move to `pose` without sweeping. Detaches from platforms and clears all forces.
    pub fn teleport(&mut self, scene: &mut Scene, pose: Iso) {
        let up = self.config.up();
        self.pose = Iso::from_parts(pose.translation, align_up(&pose.rotation, &up));
        self.forces.clear();
        self.scratch.reset();
        let previous = self.platform.platform();
        self.platform.override_with(scene, None, &self.pose);
        self.state = MotorState {
            time_scale: self.state.time_scale,
            apex: self.pose.translation.vector.dot(&up),
            ..MotorState::default()
        };
        self.body.sync(scene, &self.pose);
        if previous.is_some() {
            self.events.emit(MotorEvent::PlatformChanged {
                previous,
                current: None,
            });
        }
    }

    /// Pin the body to `platform`, or release a previous override with `None`.
    pub fn override_platform(&mut self, scene: &Scene, platform: Option<PlatformId>) {
        let previous = self.platform.platform();
        self.platform.override_with(scene, platform, &self.pose);
        let current = self.platform.platform();
        if previous != current {
            self.events.emit(MotorEvent::PlatformChanged { previous, current });
        }
    }

    fn hook_state(&self, dt: f32) -> HookState {
        HookState {
            pose: self.pose,
            grounded: self.state.grounded,
            velocity: self.state.velocity,
            platform: self.platform.platform(),
            dt,
        }
    }

    /// Advance the motor by `frame_dt` seconds.
    pub fn tick(&mut self, scene: &mut Scene, input: &TickInput, frame_dt: f32) -> TickReport {
        if !(frame_dt.is_finite() && frame_dt > 0.0) {
            log::warn!("Skipping tick with invalid dt {frame_dt}");
            return TickReport::idle(self.state.grounded);
        }
        let dt = frame_dt * self.state.time_scale;
        let up = self.config.up();
        let start = self.pose.translation.vector;
        let was_grounded = self.state.grounded;
        let previous_platform = self.platform.platform();

        scene.refresh();
        let mut gate =
            ColliderGate::closed(scene, self.body.collider_handles().collect::<Vec<_>>());

        // 1) Ride the platform
        let mut platform_translation = Vec3::zeros();
        if let Some((translation, rotation)) = self.platform.carry(&gate, &self.pose, &up) {
            self.pose = Iso::from_parts(
                na::Translation3::from(self.pose.translation.vector + translation),
                rotation * self.pose.rotation,
            );
            platform_translation = translation;
        }

        // 2) Rotation
        let hook_state = self.hook_state(dt);
        let root_motion = if self.config.root_motion {
            input.root_motion.filter(RootMotion::is_finite)
        } else {
            None
        };
        let mut delta = yaw_rotation(&up, input.yaw_delta);
        if let Some(rm) = root_motion {
            delta = rm.rotation * delta;
        }
        let delta = self.hooks.modify_rotation(&hook_state, delta);
        let desired_rotation = align_up(&(delta * self.pose.rotation), &up);
        let delta = desired_rotation * self.pose.rotation.inverse();

        let ctx = StageContext::new(&gate, &self.body, &self.config, dt);
        let accepted = resolve_rotation(&ctx, &self.pose, &delta, false);
        self.scratch.rotation_delta = accepted;
        self.pose.rotation = accepted * self.pose.rotation;
        let rotation = self.pose.rotation;

        // 3) Forces and the desired move
        self.forces.consume_soft();
        let target = input.motor_target();
        let mut additional = self.hooks.additional_motor_force(&hook_state);
        if is_finite_vec(&input.additional_motor_force) {
            additional += input.additional_motor_force;
        } else {
            log::warn!("Ignoring non-finite motor force {:?}", input.additional_motor_force);
        }
        self.state.slope_factor = match (was_grounded, self.state.ground) {
            (true, Some(ground)) => {
                slope_factor(&ground.normal, &(rotation * target), &up, &self.config)
            }
            _ => 1.0,
        };
        self.forces.update_throttle(
            target,
            additional,
            &rotation,
            self.state.slope_factor,
            was_grounded,
            dt,
            &self.config,
        );

        let own = match root_motion {
            Some(rm) => rotation * rm.translation,
            None if self.config.root_motion => Vec3::zeros(),
            None => self.forces.motor_velocity(&rotation) * dt,
        };
        let gravity = self.config.gravity_dir() * self.state.gravity_speed;
        let mut movement = own + (self.forces.external() + gravity) * dt;
        movement = self.hooks.modify_move(&hook_state, movement);
        if !is_finite_vec(&movement) {
            log::warn!("Non-finite move {movement:?}; skipping it this tick");
            movement = Vec3::zeros();
        }
        self.scratch.move_vector = movement;

        // 4) Fast bodies leave non-sticky platforms with the platform's momentum
        let fast = !self.config.stick_to_platform
            && movement.norm() / dt > self.config.platform_separation_velocity;
        let mut separated = false;
        if fast && !self.platform.is_overridden() {
            if let Some(attachment) = self.platform.detach() {
                log::debug!("Separating from platform {:?}", attachment.platform);
                self.forces.add_external(attachment.last_velocity);
                separated = true;
            }
        }

        // 5) Deflect
        let vertical_move = vertical(&movement, &up);
        let horizontal = deflect_horizontal(
            &ctx,
            &self.pose,
            &movement,
            was_grounded,
            &self.forces.external(),
            &mut self.scratch,
        );
        let horizontal_delta =
            horizontal.depenetration + up * horizontal.step_raise + horizontal.movement;
        self.pose = translated(&self.pose, &horizontal_delta);

        let leaving = vertical_move > MIN_MOVE_DISTANCE;
        let vert = deflect_vertical(
            &ctx,
            &self.pose,
            vertical_move,
            horizontal.step_raise,
            was_grounded,
            leaving,
            &mut self.scratch,
        );
        let vertical_delta = vert.depenetration + vert.movement;
        self.pose = translated(&self.pose, &vertical_delta);

        // 6) Props
        for push in &self.scratch.prop_pushes {
            gate.push_prop(push.collider, push.displacement, dt);
        }
        for (collider, force) in &self.scratch.prop_forces {
            gate.apply_prop_force(*collider, *force);
        }

        // 7) Platform bookkeeping
        let ground_platform = vert
            .ground
            .filter(|_| vert.grounded)
            .and_then(|g| gate.platform_of(g.collider));
        if !self.platform.is_overridden()
            && !separated
            && ground_platform != self.platform.platform()
        {
            if let Some(old) = self.platform.detach() {
                self.forces.add_motor_world(old.last_velocity, &rotation);
            }
            if let Some(id) = ground_platform {
                if !fast {
                    self.platform.attach(&gate, id, &self.pose);
                }
            }
        }
        self.platform.record(&gate, &self.pose);

        // 8) Decay and gravity
        self.forces.decay(vert.grounded, dt, &self.config);
        if vert.grounded {
            self.state.gravity_speed = 0.0;
        } else {
            self.state.gravity_speed += self.config.gravity_magnitude * dt;
        }
        if vert.ceiling_hit {
            self.forces.clear_upward(&up, &rotation);
        }
        if let Some(wall) = horizontal.blocked_by {
            self.forces.absorb_into(&wall);
        }
        if let Some(bounce) = self.scratch.bounce {
            self.forces.add_force(
                bounce,
                ForceOptions::soft(1),
                &rotation,
                &self.config,
                1.0,
            );
        }

        // 9) Publish
        self.body.sync(&mut gate, &self.pose);
        drop(gate);

        let displacement = self.pose.translation.vector - start;
        self.state.velocity = displacement / frame_dt;
        self.state.platform_velocity = (displacement - platform_translation) / frame_dt;
        self.state.grounded = vert.grounded;
        self.state.ground = vert.ground;
        self.state.horizontal_hit = horizontal.hit;
        self.state.glide_scalar = horizontal.glide_scalar;

        let height = self.pose.translation.vector.dot(&up);
        if vert.grounded != was_grounded {
            self.events.emit(MotorEvent::GroundedChanged {
                grounded: vert.grounded,
            });
            if vert.grounded {
                let fall_height = (self.state.apex.max(start.dot(&up)) - height).max(0.0);
                self.events.emit(MotorEvent::Landed { fall_height });
            }
        }
        self.state.apex = if vert.grounded {
            height
        } else {
            self.state.apex.max(height)
        };

        let current_platform = self.platform.platform();
        if current_platform != previous_platform {
            self.events.emit(MotorEvent::PlatformChanged {
                previous: previous_platform,
                current: current_platform,
            });
        }

        let report = TickReport {
            grounded: vert.grounded,
            desired: movement,
            horizontal: horizontal_delta,
            vertical: vertical_delta,
            platform_translation,
            rotation: accepted,
        };

        let state = self.hook_state(dt);
        self.hooks.after_tick(&state);
        self.scratch.reset();
        report
    }
}

impl std::fmt::Debug for CharacterMotor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CharacterMotor")
            .field("pose", &self.pose)
            .field("state", &self.state)
            .field("platform", &self.platform)
            .finish_non_exhaustive()
    }
}
