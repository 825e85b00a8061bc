use approx::assert_relative_eq;
use std::cell::RefCell;
use std::rc::Rc;

use super::*;
use crate::events::{MotorEvent, MotorEventKind};

fn record(motor: &mut CharacterMotor, kind: MotorEventKind) -> Rc<RefCell<Vec<MotorEvent>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    motor
        .events_mut()
        .subscribe(kind, Box::new(move |e: &MotorEvent| sink.borrow_mut().push(*e)));
    seen
}

#[test]
fn landing_flips_grounded_exactly_once() {
    let mut scene = Scene::new();
    floor(&mut scene);
    let mut motor =
        capsule_motor(&mut scene, ControllerConfig::default(), Vec3::new(0.0, 1.0, 0.0));
    let changes = record(&mut motor, MotorEventKind::GroundedChanged);
    let landings = record(&mut motor, MotorEventKind::Landed);

    run(&mut motor, &mut scene, TickInput::default(), 120);
    // Walking on flat ground must not flicker.
    run(&mut motor, &mut scene, TickInput::walk(0.3, 1.0), 120);

    assert!(motor.is_grounded());
    assert_eq!(*changes.borrow(), vec![MotorEvent::GroundedChanged { grounded: true }]);
    let landings = landings.borrow();
    assert_eq!(landings.len(), 1);
    let MotorEvent::Landed { fall_height } = landings[0] else {
        panic!("expected a landing");
    };
    assert_relative_eq!(fall_height, 1.0 - SKIN, epsilon = 1.0e-3);
}

#[test]
fn resting_body_keeps_a_skin_gap() {
    let mut scene = Scene::new();
    floor(&mut scene);
    let mut motor =
        capsule_motor(&mut scene, ControllerConfig::default(), Vec3::new(0.0, 0.5, 0.0));

    run(&mut motor, &mut scene, TickInput::default(), 120);

    assert!(motor.is_grounded());
    assert_relative_eq!(motor.position().y, SKIN, epsilon = 1.0e-4);
    assert_eq!(motor.state().gravity_speed, 0.0);
    let ground = motor.ground().expect("ground contact");
    assert_relative_eq!(ground.normal, Vec3::y(), epsilon = 1.0e-4);
}

#[test]
fn body_spawned_inside_the_floor_recovers() {
    let mut scene = Scene::new();
    floor(&mut scene);
    let mut motor =
        capsule_motor(&mut scene, ControllerConfig::default(), Vec3::new(0.0, -0.05, 0.0));

    run(&mut motor, &mut scene, TickInput::walk(0.0, 1.0), 1);
    assert!(motor.is_grounded());
    assert_relative_eq!(motor.position().y, SKIN, epsilon = 1.0e-3);

    run(&mut motor, &mut scene, TickInput::walk(0.0, 1.0), 30);
    assert!(motor.is_grounded());
    assert!(motor.position().z > 0.1);
    assert_relative_eq!(motor.position().y, SKIN, epsilon = 1.0e-3);
    assert_eq!(motor.state().gravity_speed, 0.0);
}

#[test]
fn walking_off_a_ledge_snaps_down_small_drops() {
    let mut scene = Scene::new();
    floor(&mut scene);
    // 15 cm platform ending at z = 1.
    cuboid(&mut scene, Vec3::new(2.0, 0.075, 2.0), Vec3::new(0.0, 0.075, -1.0));
    let mut motor =
        capsule_motor(&mut scene, ControllerConfig::default(), Vec3::new(0.0, 0.15 + SKIN, 0.0));
    let changes = record(&mut motor, MotorEventKind::GroundedChanged);

    run(&mut motor, &mut scene, TickInput::walk(0.0, 1.0), 60);

    assert!(motor.position().z > 2.0);
    assert_relative_eq!(motor.position().y, SKIN, epsilon = 1.0e-3);
    // Grounded on the first tick and never lost over the drop.
    assert_eq!(changes.borrow().len(), 1);
}

#[test]
fn teleport_resets_motion() {
    let mut scene = Scene::new();
    floor(&mut scene);
    let mut motor =
        capsule_motor(&mut scene, ControllerConfig::default(), Vec3::new(0.0, 3.0, 0.0));
    run(&mut motor, &mut scene, TickInput::walk(0.0, 1.0), 20);
    assert!(motor.state().gravity_speed > 0.0);

    motor.teleport(&mut scene, Iso::translation(5.0, SKIN, 5.0));
    assert_eq!(motor.position(), Vec3::new(5.0, SKIN, 5.0));
    assert_eq!(motor.state().gravity_speed, 0.0);
    assert_eq!(motor.forces().throttle_local(), Vec3::zeros());

    let handle = motor.collider_handles().next().unwrap();
    let pose = scene.collider(handle).unwrap().pose();
    assert_relative_eq!(pose.translation.vector.x, 5.0, epsilon = 1.0e-6);
}
