/*!
Core collision types and math aliases shared by the collision submodules.

This module intentionally contains no algorithms. It defines the data types
exchanged between:
- the query interface (`CollisionWorld`) and its Rapier implementation
- the grounding resolver, the movement solver and velocity projection
- the parent/platform tracking phases

Hits are transient: they are produced by a query, consumed within the same
tick and never persisted. Entities are non-owning references to bodies in the
external world.
*/

use nalgebra as na;

use super::material::HitMaterial;

/// Common math aliases for clarity and consistency.
pub type Vec2 = na::Vector2<f32>;
pub type Vec3 = na::Vector3<f32>;
pub type Point3 = na::Point3<f32>;
pub type Quat = na::UnitQuaternion<f32>;
pub type Iso = na::Isometry3<f32>;

/// Non-owning reference to a body in the external world.
///
/// `Entity::NULL` marks "no entity" (e.g. the ground hit of an airborne character).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde-serialize",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Entity(pub u64);

impl Entity {
    pub const NULL: Entity = Entity(0);

    #[inline]
    pub fn is_null(self) -> bool {
        self == Self::NULL
    }
}

/// A rigid transform (isometry) in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    #[inline]
    pub fn identity() -> Self {
        Self::new(Vec3::zeros(), Quat::identity())
    }

    #[inline]
    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    #[inline]
    pub fn from_translation(translation: Vec3) -> Self {
        Self::new(translation, Quat::identity())
    }

    /// Convert to nalgebra `Isometry3` for use with parry3d queries.
    #[inline]
    pub fn iso(&self) -> Iso {
        Iso::from_parts(na::Translation3::from(self.translation), self.rotation)
    }

    #[inline]
    pub fn transform_point(&self, local: &Vec3) -> Vec3 {
        self.translation + self.rotation * local
    }

    #[inline]
    pub fn inverse_transform_point(&self, world: &Vec3) -> Vec3 {
        self.rotation.inverse() * (world - self.translation)
    }
}

/// Pose of a moving body at the previous and the current fixed-rate step.
///
/// Moving platforms expose this so characters standing on them can follow
/// their motion and inherit their velocity.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TrackedTransform {
    pub previous: Transform,
    pub current: Transform,
}

impl TrackedTransform {
    /// A body that has not moved yet.
    #[inline]
    pub fn at_rest(transform: Transform) -> Self {
        Self {
            previous: transform,
            current: transform,
        }
    }

    /// Shift `current` into `previous` and store the new pose.
    #[inline]
    pub fn advance(&mut self, next: Transform) {
        self.previous = self.current;
        self.current = next;
    }

    /// Rotation applied to the body between the two steps.
    #[inline]
    pub fn rotation_delta(&self) -> Quat {
        self.current.rotation * self.previous.rotation.inverse()
    }

    /// Velocity of the body point that was at `point` on the previous step.
    pub fn point_velocity(&self, point: &Vec3, dt: f32) -> Vec3 {
        if dt <= 0.0 {
            return Vec3::zeros();
        }
        let local = self.previous.inverse_transform_point(point);
        let moved = self.current.transform_point(&local);
        (moved - point) / dt
    }
}

/// What kind of body an entity is, as far as the character cares.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BodyKind {
    /// Immovable level geometry.
    Static,
    /// Script/animation driven body (moving platforms).
    Kinematic,
    /// Simulated by the external physics step.
    Dynamic { mass: f32 },
    /// Another kinematic character.
    Character,
}

/// Y-aligned capsule description of a character.
///
/// The character's position is at the bottom of the capsule (its "feet"),
/// so the shape center sits `height / 2` above it along the character's up.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-serialize",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct CharacterShape {
    pub radius: f32,
    /// Total height, caps included.
    pub height: f32,
}

impl CharacterShape {
    #[inline]
    pub fn new(radius: f32, height: f32) -> Self {
        Self { radius, height }
    }

    /// Half-length of the cylinder section; zero when the capsule is a sphere.
    #[inline]
    pub fn half_segment(&self) -> f32 {
        (self.height * 0.5 - self.radius).max(0.0)
    }

    /// Local offset from the character position to the shape center.
    #[inline]
    pub fn local_center(&self) -> Vec3 {
        Vec3::new(0.0, self.height * 0.5, 0.0)
    }

    /// Pose of the shape for a character at `position` with `rotation`.
    #[inline]
    pub fn pose(&self, position: &Vec3, rotation: &Quat) -> Iso {
        let center = position + rotation * self.local_center();
        Iso::from_parts(na::Translation3::from(center), *rotation)
    }
}

/// Hit data every query result and character hit shares.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BasicHit {
    pub entity: Entity,
    /// World-space contact point.
    pub position: Vec3,
    /// World-space unit surface normal, pointing out of the hit surface.
    pub normal: Vec3,
    pub material: HitMaterial,
}

/// One result of a shape cast.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColliderCastHit {
    pub hit: BasicHit,
    /// Fraction (0..1) of the cast translation where the hit occurred.
    pub fraction: f32,
}

/// One result of a ray cast.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RaycastHit {
    pub hit: BasicHit,
    /// Fraction (0..1) of the ray length where the hit occurred.
    pub fraction: f32,
}

/// One result of an overlap query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistanceHit {
    pub hit: BasicHit,
    /// Signed separation; negative means penetration depth.
    pub distance: f32,
}

/// Impulse the character wants applied to a dynamic body by the external physics step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeferredImpulse {
    pub entity: Entity,
    pub linear_impulse: Vec3,
    pub point: Vec3,
}

/// Mass properties handed to the mass-override callback.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhysicsMass {
    /// Zero means infinite mass.
    pub inverse_mass: f32,
}

impl PhysicsMass {
    #[inline]
    pub fn from_mass(mass: f32) -> Self {
        Self {
            inverse_mass: if mass > 0.0 { 1.0 / mass } else { 0.0 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_velocity_follows_translation_and_rotation() {
        let mut tracked = TrackedTransform::at_rest(Transform::identity());
        tracked.advance(Transform::from_translation(Vec3::new(1.0, 0.0, 0.0)));

        let v = tracked.point_velocity(&Vec3::new(3.0, 0.0, 0.0), 0.5);
        assert!((v - Vec3::new(2.0, 0.0, 0.0)).norm() < 1.0e-6);

        // Quarter turn around +Y moves (1,0,0) to (0,0,-1).
        let mut spinning = TrackedTransform::at_rest(Transform::identity());
        spinning.advance(Transform::new(
            Vec3::zeros(),
            Quat::from_axis_angle(&Vec3::y_axis(), std::f32::consts::FRAC_PI_2),
        ));
        let v = spinning.point_velocity(&Vec3::new(1.0, 0.0, 0.0), 1.0);
        assert!((v - Vec3::new(-1.0, 0.0, -1.0)).norm() < 1.0e-5);
    }

    #[test]
    fn shape_pose_places_center_above_feet() {
        let shape = CharacterShape::new(0.5, 2.0);
        let pose = shape.pose(&Vec3::new(1.0, 0.0, 0.0), &Quat::identity());
        assert!((pose.translation.vector - Vec3::new(1.0, 1.0, 0.0)).norm() < 1.0e-6);
        assert!((shape.half_segment() - 0.5).abs() < 1.0e-6);
    }
}
