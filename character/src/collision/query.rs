//! Collision query interface the character update depends on.
//!
//! The world behind this trait is an external collaborator: it owns the
//! colliders and is never mutated while characters update. Every method takes
//! `&self`, and implementations must be `Sync` to be shared by parallel
//! character updates.
//!
//! Ordering contract
//! - `cast_shape` and `cast_ray` return hits sorted by increasing fraction.
//! - `overlap` returns hits sorted by increasing (most negative first) distance.

use super::types::{
    BodyKind, CharacterShape, ColliderCastHit, DistanceHit, Entity, Iso, RaycastHit,
    TrackedTransform, Vec3,
};

pub trait CollisionWorld {
    /// Sweep `shape` placed at `pose` along `translation` and return every hit,
    /// nearest first. Colliders belonging to `ignore` are skipped.
    fn cast_shape(
        &self,
        shape: &CharacterShape,
        pose: &Iso,
        translation: &Vec3,
        ignore: Entity,
    ) -> Vec<ColliderCastHit>;

    /// Every collider within `max_distance` of `shape` placed at `pose`.
    fn overlap(
        &self,
        shape: &CharacterShape,
        pose: &Iso,
        max_distance: f32,
        ignore: Entity,
    ) -> Vec<DistanceHit>;

    /// Cast a ray from `origin` along `direction * max_distance` (direction is unit length).
    fn cast_ray(
        &self,
        origin: &Vec3,
        direction: &Vec3,
        max_distance: f32,
        ignore: Entity,
    ) -> Vec<RaycastHit>;

    /// What kind of body `entity` is, if the world knows it.
    fn body_kind(&self, entity: Entity) -> Option<BodyKind>;

    /// Previous/current poses of a moving body. `None` for bodies that never move.
    fn tracked_transform(&self, entity: Entity) -> Option<TrackedTransform>;

    /// Linear velocity of a dynamic body, zero if unknown.
    fn linear_velocity(&self, _entity: Entity) -> Vec3 {
        Vec3::zeros()
    }

    #[inline]
    fn is_character(&self, entity: Entity) -> bool {
        matches!(self.body_kind(entity), Some(BodyKind::Character))
    }

    #[inline]
    fn dynamic_mass(&self, entity: Entity) -> Option<f32> {
        match self.body_kind(entity) {
            Some(BodyKind::Dynamic { mass }) => Some(mass),
            _ => None,
        }
    }

    /// Closest hit of a shape cast that passes `filter`.
    fn cast_shape_closest(
        &self,
        shape: &CharacterShape,
        pose: &Iso,
        translation: &Vec3,
        ignore: Entity,
        mut filter: impl FnMut(&ColliderCastHit) -> bool,
    ) -> Option<ColliderCastHit>
    where
        Self: Sized,
    {
        self.cast_shape(shape, pose, translation, ignore)
            .into_iter()
            .find(|hit| filter(hit))
    }

    /// Closest ray hit that passes `filter`.
    fn cast_ray_closest(
        &self,
        origin: &Vec3,
        direction: &Vec3,
        max_distance: f32,
        ignore: Entity,
        mut filter: impl FnMut(&RaycastHit) -> bool,
    ) -> Option<RaycastHit>
    where
        Self: Sized,
    {
        self.cast_ray(origin, direction, max_distance, ignore)
            .into_iter()
            .find(|hit| filter(hit))
    }
}
