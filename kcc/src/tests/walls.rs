use approx::assert_relative_eq;

use super::*;
use crate::bitmask_flags::CollisionLayer;
use crate::material::{CombineRule, SurfaceMaterial};
use crate::movement::ForceOptions;

#[test]
fn walking_into_a_wall_converges_to_the_skin() {
    let mut scene = Scene::new();
    floor(&mut scene);
    // Face at z = 5.
    cuboid(&mut scene, Vec3::new(5.0, 3.0, 0.5), Vec3::new(0.0, 3.0, 5.5));
    let mut motor =
        capsule_motor(&mut scene, ControllerConfig::default(), Vec3::new(0.0, SKIN, 0.0));

    let rest = 5.0 - RADIUS - SKIN;
    for _ in 0..600 {
        motor.tick(&mut scene, &TickInput::walk(0.0, 1.0), DT);
        assert!(motor.position().z <= rest + 1.0e-4);
    }

    assert_relative_eq!(motor.position().z, rest, epsilon = 1.0e-3);
    assert!(motor.is_grounded());
    assert_eq!(motor.state().glide_scalar, Some(0.0));
    let hit = motor.horizontal_hit().expect("resting wall contact");
    assert_relative_eq!(hit.normal, Vec3::new(0.0, 0.0, -1.0), epsilon = 1.0e-3);
}

#[test]
fn fast_body_does_not_tunnel_through_a_thin_wall() {
    let mut scene = Scene::new();
    floor(&mut scene);
    // 10 cm thick, face at z = 2.95.
    cuboid(&mut scene, Vec3::new(3.0, 3.0, 0.05), Vec3::new(0.0, 3.0, 3.0));
    let mut motor =
        capsule_motor(&mut scene, ControllerConfig::default(), Vec3::new(0.0, SKIN, 0.0));

    motor.add_force(Vec3::new(0.0, 0.0, 200.0), ForceOptions::default());
    for _ in 0..30 {
        motor.tick(&mut scene, &TickInput::default(), DT);
        assert!(motor.position().z <= 2.95 - RADIUS - SKIN + 1.0e-3);
    }
}

#[test]
fn bouncy_wall_reflects_the_external_force() {
    let mut scene = Scene::new();
    floor(&mut scene);
    // Face at z = 1.
    let wall = cuboid(&mut scene, Vec3::new(2.0, 2.0, 0.5), Vec3::new(0.0, 2.0, 1.5));
    scene.set_material(
        wall,
        SurfaceMaterial::new(0.0, 0.8).with_combine(CombineRule::Average, CombineRule::Max),
    );

    let config = ControllerConfig {
        external_damping: 0.0,
        air_external_damping: 0.0,
        ..ControllerConfig::default()
    };
    let mut motor = capsule_motor(&mut scene, config, Vec3::new(0.0, SKIN, 0.6));
    motor.add_force(Vec3::new(0.0, 0.0, 3.0), ForceOptions::default());

    // Tick 2 reaches the wall: the push into it is absorbed and a reflection of
    // max(3, 1) * 0.8 is queued for the next tick.
    run(&mut motor, &mut scene, TickInput::default(), 2);
    assert!(motor.horizontal_hit().is_some());
    assert_relative_eq!(motor.forces().external().z, 0.0, epsilon = 1.0e-4);
    let at_wall = motor.position().z;
    assert!(at_wall <= 1.0 - RADIUS - SKIN + 1.0e-4);

    run(&mut motor, &mut scene, TickInput::default(), 1);
    assert_relative_eq!(motor.forces().external().z, -2.4, epsilon = 1.0e-3);
    assert_relative_eq!(motor.position().z, at_wall - 2.4 * DT, epsilon = 1.0e-3);
}

#[test]
fn non_bouncy_wall_stops_the_push() {
    let mut scene = Scene::new();
    floor(&mut scene);
    cuboid(&mut scene, Vec3::new(2.0, 2.0, 0.5), Vec3::new(0.0, 2.0, 1.5));
    let config = ControllerConfig {
        external_damping: 0.0,
        air_external_damping: 0.0,
        ..ControllerConfig::default()
    };
    let mut motor = capsule_motor(&mut scene, config, Vec3::new(0.0, SKIN, 0.6));
    motor.add_force(Vec3::new(1.0, 0.0, 3.0), ForceOptions::default());

    run(&mut motor, &mut scene, TickInput::default(), 10);
    // The part along the wall survives.
    assert_relative_eq!(motor.forces().external(), Vec3::new(1.0, 0.0, 0.0), epsilon = 1.0e-4);
}

#[test]
fn pushing_a_light_prop_moves_it_forward() {
    let mut scene = Scene::new();
    floor(&mut scene);
    let prop = scene.insert_prop(
        ColliderShapeDef::Cuboid {
            half_extents: Vec3::new(0.3, 0.3, 0.3),
        },
        Iso::translation(0.0, 0.3, 1.0),
        10.0,
    );
    let mut motor =
        capsule_motor(&mut scene, ControllerConfig::default(), Vec3::new(0.0, SKIN, 0.0));

    run(&mut motor, &mut scene, TickInput::walk(0.0, 1.0), 60);

    let pose = scene.collider(prop).unwrap().pose();
    assert!(pose.translation.vector.z > 1.01);
    assert!(scene.prop(prop).unwrap().velocity.z > 0.0);
    assert!(motor.position().z > 0.4);
}

#[test]
fn body_layers_are_restored_after_every_tick() {
    let mut scene = Scene::new();
    floor(&mut scene);
    let mut motor =
        capsule_motor(&mut scene, ControllerConfig::default(), Vec3::new(0.0, SKIN, 0.0));

    run(&mut motor, &mut scene, TickInput::walk(0.5, 1.0), 5);
    for handle in motor.collider_handles() {
        assert_eq!(scene.layer(handle), Some(CollisionLayer::Character));
    }
}
