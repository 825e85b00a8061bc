use nalgebra as na;
use rapier3d::parry::shape::SharedShape;
use serde::{Deserialize, Serialize};

use crate::collision::types::{Iso, Quat, Vec3};
use crate::material::SurfaceMaterial;

/// Canonical, schema-agnostic definition of an immutable world collider.
///
/// Callers map their level data to this type, then call [`super::Scene::from_defs`].
///
/// Conventions
/// - Units are meters.
/// - Rotation is a unit quaternion.
/// - For planes, the normal is derived from the pose: `normal = rotation * +Y`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorldStaticDef {
    /// Stable unique identifier used to ensure deterministic insertion order.
    pub id: u32,
    /// World-space translation.
    pub translation: Vec3,
    /// World-space rotation (unit quaternion).
    pub rotation: Quat,
    /// Collider shape parameters.
    pub shape: ColliderShapeDef,
    #[serde(default)]
    pub material: SurfaceMaterial,
}

impl WorldStaticDef {
    pub fn pose(&self) -> Iso {
        Iso::from_parts(na::Translation3::from(self.translation), self.rotation)
    }
}

/// Supported collider shapes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ColliderShapeDef {
    /// Infinite plane (half-space) whose normal is the pose's local +Y.
    Plane {
        /// Offset along the plane normal (meters).
        offset_along_normal: f32,
    },

    /// Oriented cuboid with given half-extents (meters).
    Cuboid { half_extents: Vec3 },

    /// Sphere/ball (meters).
    Sphere { radius: f32 },

    /// Y-aligned capsule (meters).
    CapsuleY { radius: f32, half_height: f32 },

    /// Y-aligned cylinder (meters).
    CylinderY { radius: f32, half_height: f32 },

    /// Rounded cuboid (meters).
    ///
    /// `border_radius` rounds all edges/corners.
    RoundCuboid {
        half_extents: Vec3,
        border_radius: f32,
    },
}

impl ColliderShapeDef {
    /// Builds the parry shape in its local frame.
    pub fn to_shared(&self) -> SharedShape {
        match *self {
            ColliderShapeDef::Plane { .. } => SharedShape::halfspace(Vec3::y_axis()),
            ColliderShapeDef::Cuboid { half_extents } => {
                SharedShape::cuboid(half_extents.x, half_extents.y, half_extents.z)
            }
            ColliderShapeDef::Sphere { radius } => SharedShape::ball(radius),
            ColliderShapeDef::CapsuleY {
                radius,
                half_height,
            } => SharedShape::capsule_y(half_height, radius),
            ColliderShapeDef::CylinderY {
                radius,
                half_height,
            } => SharedShape::cylinder(half_height, radius),
            ColliderShapeDef::RoundCuboid {
                half_extents,
                border_radius,
            } => SharedShape::round_cuboid(
                half_extents.x,
                half_extents.y,
                half_extents.z,
                border_radius,
            ),
        }
    }

    /// Pose of the built shape given the collider's pose.
    ///
    /// Planes are shifted along their normal by `offset_along_normal`; every other shape sits
    /// at the collider pose.
    pub fn shape_pose(&self, pose: &Iso) -> Iso {
        match *self {
            ColliderShapeDef::Plane {
                offset_along_normal,
            } => pose * na::Translation3::new(0.0, offset_along_normal, 0.0),
            _ => *pose,
        }
    }

    /// True for shapes without a finite bounding box.
    pub fn is_unbounded(&self) -> bool {
        matches!(self, ColliderShapeDef::Plane { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn plane_offset_moves_along_rotated_normal() {
        let rotation = Quat::from_axis_angle(&Vec3::z_axis(), std::f32::consts::FRAC_PI_2);
        let pose = Iso::from_parts(na::Translation3::new(1.0, 0.0, 0.0), rotation);
        let def = ColliderShapeDef::Plane {
            offset_along_normal: 2.0,
        };
        let shifted = def.shape_pose(&pose);
        // +Y rotated 90 degrees about Z points along -X.
        assert_relative_eq!(shifted.translation.vector.x, -1.0, epsilon = 1.0e-5);
        assert!(def.is_unbounded());
    }

    #[test]
    fn finite_shapes_keep_the_collider_pose() {
        let pose = Iso::translation(0.0, 3.0, 0.0);
        let def = ColliderShapeDef::Sphere { radius: 0.5 };
        assert_eq!(def.shape_pose(&pose), pose);
        assert!(!def.is_unbounded());
        assert!(def.to_shared().as_ball().is_some());
    }

    #[test]
    fn static_defs_load_from_json() {
        let json = r#"{
            "id": 7,
            "translation": [0.0, 1.0, 0.0],
            "rotation": [0.0, 0.0, 0.0, 1.0],
            "shape": { "Cuboid": { "half_extents": [1.0, 0.5, 1.0] } }
        }"#;
        let def: WorldStaticDef = serde_json::from_str(json).unwrap();
        assert_eq!(def.id, 7);
        assert_eq!(def.material, SurfaceMaterial::default());
        assert_eq!(def.pose().translation.vector, Vec3::new(0.0, 1.0, 0.0));
    }
}
