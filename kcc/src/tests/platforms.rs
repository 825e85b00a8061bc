use approx::assert_relative_eq;
use std::cell::RefCell;
use std::rc::Rc;

use super::*;
use crate::events::{MotorEvent, MotorEventKind};
use crate::movement::ForceOptions;
use crate::scene::PlatformId;

/// Platform frame at the origin with a 6 x 6 m deck whose top is at y = 0.
fn deck(scene: &mut Scene) -> PlatformId {
    let id = scene.add_platform(Iso::identity());
    scene.attach_to_platform(
        id,
        ColliderShapeDef::Cuboid {
            half_extents: Vec3::new(3.0, 0.1, 3.0),
        },
        Iso::translation(0.0, -0.1, 0.0),
    );
    id
}

fn slide_deck(scene: &mut Scene, id: PlatformId, offset: Vec3) {
    let pose = *scene.platform(id).unwrap().pose();
    let moved = Iso::from_parts((pose.translation.vector + offset).into(), pose.rotation);
    scene.move_platform(id, moved, DT);
}

#[test]
fn standing_on_a_platform_attaches() {
    let mut scene = Scene::new();
    let id = deck(&mut scene);
    let mut motor =
        capsule_motor(&mut scene, ControllerConfig::default(), Vec3::new(0.0, SKIN, 0.0));
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    motor.events_mut().subscribe(
        MotorEventKind::PlatformChanged,
        Box::new(move |e: &MotorEvent| sink.borrow_mut().push(*e)),
    );

    run(&mut motor, &mut scene, TickInput::default(), 1);

    assert!(motor.is_grounded());
    assert_eq!(motor.platform(), Some(id));
    assert_eq!(
        *seen.borrow(),
        vec![MotorEvent::PlatformChanged {
            previous: None,
            current: Some(id)
        }]
    );
}

#[test]
fn platform_motion_is_carried_exactly() {
    let mut scene = Scene::new();
    let id = deck(&mut scene);
    let mut motor =
        capsule_motor(&mut scene, ControllerConfig::default(), Vec3::new(0.0, SKIN, 0.0));
    run(&mut motor, &mut scene, TickInput::default(), 1);
    let before = motor.position();

    let step = Vec3::new(0.05, 0.0, -0.03);
    slide_deck(&mut scene, id, step);
    let report = motor.tick(&mut scene, &TickInput::default(), DT);

    assert_relative_eq!(report.platform_translation, step, epsilon = 1.0e-6);
    assert_relative_eq!(motor.position(), before + step, epsilon = 1.0e-4);
    assert_relative_eq!(motor.platform_velocity(), Vec3::zeros(), epsilon = 1.0e-2);
    assert_relative_eq!(motor.velocity(), step / DT, epsilon = 1.0e-2);
}

#[test]
fn long_carry_leaves_no_vertical_drift() {
    let mut scene = Scene::new();
    let id = deck(&mut scene);
    let mut motor =
        capsule_motor(&mut scene, ControllerConfig::default(), Vec3::new(0.0, SKIN, 0.0));
    run(&mut motor, &mut scene, TickInput::default(), 1);

    let step = Vec3::new(0.004, 0.0, 0.003);
    for _ in 0..300 {
        slide_deck(&mut scene, id, step);
        motor.tick(&mut scene, &TickInput::default(), DT);
        assert!(motor.is_grounded());
        assert_relative_eq!(motor.position().y, SKIN, epsilon = 1.0e-5);
    }
    assert_relative_eq!(motor.position(), step * 300.0 + Vec3::y() * SKIN, epsilon = 1.0e-3);
}

#[test]
fn rising_platform_lifts_the_body() {
    let mut scene = Scene::new();
    let id = deck(&mut scene);
    let mut motor =
        capsule_motor(&mut scene, ControllerConfig::default(), Vec3::new(1.0, SKIN, 0.0));
    run(&mut motor, &mut scene, TickInput::default(), 1);

    for _ in 0..30 {
        slide_deck(&mut scene, id, Vec3::new(0.0, 0.02, 0.0));
        motor.tick(&mut scene, &TickInput::default(), DT);
        assert!(motor.is_grounded());
    }
    assert_relative_eq!(motor.position().y, 0.6 + SKIN, epsilon = 1.0e-3);
}

#[test]
fn jumping_off_keeps_the_platform_momentum() {
    let mut scene = Scene::new();
    let id = deck(&mut scene);
    let mut motor =
        capsule_motor(&mut scene, ControllerConfig::default(), Vec3::new(0.0, SKIN, 0.0));
    run(&mut motor, &mut scene, TickInput::default(), 1);

    let velocity = Vec3::new(1.2, 0.0, 0.0);
    for _ in 0..3 {
        slide_deck(&mut scene, id, velocity * DT);
        motor.tick(&mut scene, &TickInput::default(), DT);
    }
    assert_eq!(motor.platform(), Some(id));

    motor.add_force(Vec3::new(0.0, 5.0, 0.0), ForceOptions::default());
    slide_deck(&mut scene, id, velocity * DT);
    motor.tick(&mut scene, &TickInput::default(), DT);

    assert_eq!(motor.platform(), None);
    // Ordinary detach: the platform velocity moves into the throttle.
    let motor_velocity = motor.forces().motor_velocity(&motor.rotation());
    assert!(motor_velocity.x > 1.0);
}

#[test]
fn fast_body_separates_from_a_non_sticky_platform() {
    let mut scene = Scene::new();
    let id = deck(&mut scene);
    let config = ControllerConfig {
        stick_to_platform: false,
        platform_separation_velocity: 2.0,
        external_damping: 0.0,
        air_external_damping: 0.0,
        ..ControllerConfig::default()
    };
    let mut motor = capsule_motor(&mut scene, config, Vec3::new(0.0, SKIN, 0.0));
    run(&mut motor, &mut scene, TickInput::default(), 1);
    assert_eq!(motor.platform(), Some(id));

    let platform_velocity = Vec3::new(1.5, 0.0, 0.0);
    slide_deck(&mut scene, id, platform_velocity * DT);
    motor.tick(&mut scene, &TickInput::default(), DT);
    assert_eq!(motor.platform(), Some(id));

    let shove = Vec3::new(0.0, 0.0, 5.0);
    motor.add_force(shove, ForceOptions::default());
    slide_deck(&mut scene, id, platform_velocity * DT);
    motor.tick(&mut scene, &TickInput::default(), DT);

    assert_eq!(motor.platform(), None);
    assert_relative_eq!(motor.forces().external(), shove + platform_velocity, epsilon = 1.0e-3);
}

#[test]
fn override_pins_the_body_to_a_platform() {
    let mut scene = Scene::new();
    floor(&mut scene);
    let id = scene.add_platform(Iso::translation(0.0, 0.0, 10.0));
    let mut motor =
        capsule_motor(&mut scene, ControllerConfig::default(), Vec3::new(0.0, SKIN, 0.0));

    motor.override_platform(&scene, Some(id));
    run(&mut motor, &mut scene, TickInput::default(), 2);
    assert_eq!(motor.platform(), Some(id));

    slide_deck(&mut scene, id, Vec3::new(0.1, 0.0, 0.0));
    motor.tick(&mut scene, &TickInput::default(), DT);
    assert_relative_eq!(motor.position().x, 0.1, epsilon = 1.0e-4);

    motor.override_platform(&scene, None);
    motor.tick(&mut scene, &TickInput::default(), DT);
    assert_eq!(motor.platform(), None);
}
