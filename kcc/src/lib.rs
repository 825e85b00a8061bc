pub mod bitmask_flags;
pub mod body;
pub mod collision;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod hooks;
pub mod input;
pub mod material;
pub mod motor;
pub mod movement;
pub mod scene;
pub mod utils;

#[cfg(test)]
mod tests;

pub use rapier3d;

pub use bitmask_flags::{CollisionLayer, LayerMask};
pub use body::{Body, VolumeDesc, VolumeShape};
pub use collision::{ColliderGate, ContactRecord, Iso, Quat, ShapeHit, Vec3};
pub use config::ControllerConfig;
pub use error::ConfigError;
pub use events::{EventChannel, MotorEvent, MotorEventKind, SubscriptionId};
pub use hooks::{HookState, MotorHooks, NoHooks};
pub use input::{RootMotion, TickInput};
pub use material::{CombineRule, ResponseCurve, SurfaceMaterial};
pub use motor::{CharacterMotor, MotorState, TickReport};
pub use movement::{ForceMode, ForceOptions, ForceSpace, PlatformAttachment};
pub use scene::{ColliderHandle, ColliderShapeDef, PlatformId, Scene, WorldStaticDef};
