//! Whole-motor scenarios run against small hand-built scenes.

use crate::body::VolumeDesc;
use crate::collision::types::{Iso, Vec3};
use crate::config::ControllerConfig;
use crate::input::TickInput;
use crate::motor::CharacterMotor;
use crate::scene::{ColliderHandle, ColliderShapeDef, Scene};

mod grounding;
mod platforms;
mod walls;

const DT: f32 = 1.0 / 60.0;
const SKIN: f32 = 0.02;
const RADIUS: f32 = 0.3;
const HEIGHT: f32 = 1.8;

fn floor(scene: &mut Scene) -> ColliderHandle {
    scene.insert_static(
        ColliderShapeDef::Plane {
            offset_along_normal: 0.0,
        },
        Iso::identity(),
    )
}

fn cuboid(scene: &mut Scene, half_extents: Vec3, center: Vec3) -> ColliderHandle {
    scene.insert_static(
        ColliderShapeDef::Cuboid { half_extents },
        Iso::translation(center.x, center.y, center.z),
    )
}

/// Capsule motor standing at `position`.
fn capsule_motor(scene: &mut Scene, config: ControllerConfig, position: Vec3) -> CharacterMotor {
    CharacterMotor::with_volumes(
        config,
        scene,
        Iso::translation(position.x, position.y, position.z),
        &[VolumeDesc::capsule(RADIUS, HEIGHT)],
    )
}

fn run(motor: &mut CharacterMotor, scene: &mut Scene, input: TickInput, ticks: usize) {
    for _ in 0..ticks {
        motor.tick(scene, &input, DT);
    }
}
