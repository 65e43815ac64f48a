/*!
Collision root module.

This module gathers everything the character update needs from the physics
world, without any character logic:

- types:        shared data types (Entity, Transform, hits, capsule shape)
- material:     surface materials and gameplay tags reported with hits
- query:        the read-only `CollisionWorld` interface the update depends on
- rapier_world: a `CollisionWorld` backed by Rapier colliders and parry queries
*/

pub mod material;
pub mod query;
pub mod rapier_world;
pub mod types;

// Re-export commonly used types.
pub use material::{CollisionResponse, HitMaterial, MaterialTag, MaterialTags};
pub use query::CollisionWorld;
pub use rapier_world::{ColliderShapeDef, RapierQueryWorld, WorldBodyDef};
pub use types::{
    BasicHit, BodyKind, CharacterShape, ColliderCastHit, DeferredImpulse, DistanceHit, Entity,
    Iso, PhysicsMass, Point3, Quat, RaycastHit, TrackedTransform, Transform, Vec2, Vec3,
};

/// Convenience: an infinite ground plane through `translation` facing `rotation * +Y`.
#[inline]
pub fn plane_from_pose(entity: Entity, rotation: Quat, translation: Vec3) -> WorldBodyDef {
    WorldBodyDef::fixed(
        entity,
        Transform::new(translation, rotation),
        ColliderShapeDef::Plane {
            offset_along_normal: 0.0,
        },
    )
}

/// Convenience: a static cuboid with given half extents and pose.
#[inline]
pub fn cuboid_from_pose(
    entity: Entity,
    half_extents: Vec3,
    translation: Vec3,
    rotation: Quat,
) -> WorldBodyDef {
    WorldBodyDef::fixed(
        entity,
        Transform::new(translation, rotation),
        ColliderShapeDef::Cuboid { half_extents },
    )
}
