//! Rapier-based query world for characters.
//!
//! This module builds an in-memory Rapier collider set from a list of body
//! definitions and answers the [`CollisionWorld`] queries against it.
//!
//! Design goals
//! - Deterministic: given the same inputs (sorted by entity), build identical sets
//!   and return hits in a stable order (fraction, then entity).
//! - Query-focused: no simulation is stepped here. Kinematic bodies are moved by
//!   the embedding between ticks; dynamic bodies are owned by an external physics
//!   step that applies the character's deferred impulses.
//! - Read-only during character updates: all queries take `&self`.
//!
//! Step protocol for moving bodies
//! 1. [`RapierQueryWorld::begin_step`] copies every body's current pose into its previous pose.
//! 2. [`RapierQueryWorld::set_body_pose`] stores the new pose of each body that moved.
//! 3. Characters update against the world (possibly in parallel).
//! 4. [`RapierQueryWorld::set_body_pose`] syncs character colliders to their new poses.

// Re-export Rapier so downstream crates can use Rapier types
// without needing to depend on `rapier3d` directly.
pub use rapier3d;

use nalgebra as na;

use rapier3d::parry::bounding_volume::{Aabb, BoundingVolume};
use rapier3d::parry::query::{self, Ray, RayCast, ShapeCastOptions};
use rapier3d::parry::shape::{Capsule, Shape};
use rapier3d::parry::utils::hashmap::HashMap;
use rapier3d::prelude::{Collider, ColliderBuilder, ColliderHandle, ColliderSet, SharedShape};

use super::material::HitMaterial;
use super::query::CollisionWorld;
use super::types::{
    BasicHit, BodyKind, CharacterShape, ColliderCastHit, DistanceHit, Entity, Iso, Point3,
    RaycastHit, TrackedTransform, Transform, Vec3,
};
use crate::error::{self, ConfigError};

/// Canonical, schema-agnostic definition of a world body with one collider.
///
/// Conventions
/// - Units are meters.
/// - For planes, the normal is derived from the pose: `normal = rotation * +Y`.
#[derive(Clone, Debug)]
pub struct WorldBodyDef {
    /// Stable unique identifier; also the entity reported in hits. Must not be 0.
    pub entity: Entity,
    pub kind: BodyKind,
    pub transform: Transform,
    pub shape: ColliderShapeDef,
    pub material: HitMaterial,
}

impl WorldBodyDef {
    #[inline]
    pub fn fixed(entity: Entity, transform: Transform, shape: ColliderShapeDef) -> Self {
        Self {
            entity,
            kind: BodyKind::Static,
            transform,
            shape,
            material: HitMaterial::default(),
        }
    }

    #[inline]
    pub fn with_kind(mut self, kind: BodyKind) -> Self {
        self.kind = kind;
        self
    }

    #[inline]
    pub fn with_material(mut self, material: HitMaterial) -> Self {
        self.material = material;
        self
    }
}

/// Supported collider shapes.
#[derive(Clone, Debug)]
pub enum ColliderShapeDef {
    /// Infinite plane (half-space) offset along its normal (meters).
    Plane { offset_along_normal: f32 },

    /// Oriented cuboid with given half-extents (meters).
    Cuboid { half_extents: Vec3 },

    /// Sphere/ball (meters).
    Sphere { radius: f32 },

    /// Y-aligned capsule (meters).
    CapsuleY { radius: f32, half_height: f32 },

    /// Y-aligned cylinder (meters).
    CylinderY { radius: f32, half_height: f32 },

    /// Rounded cuboid (meters). `border_radius` rounds all edges/corners.
    RoundCuboid {
        half_extents: Vec3,
        border_radius: f32,
    },

    /// A character capsule; the body pose is the character's feet.
    Character(CharacterShape),
}

impl ColliderShapeDef {
    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            ColliderShapeDef::Plane {
                offset_along_normal,
            } => {
                error::finite("offset_along_normal", *offset_along_normal)?;
            }
            ColliderShapeDef::Cuboid { half_extents } => {
                error::positive("half_extents.x", half_extents.x)?;
                error::positive("half_extents.y", half_extents.y)?;
                error::positive("half_extents.z", half_extents.z)?;
            }
            ColliderShapeDef::Sphere { radius } => {
                error::positive("radius", *radius)?;
            }
            ColliderShapeDef::CapsuleY {
                radius,
                half_height,
            }
            | ColliderShapeDef::CylinderY {
                radius,
                half_height,
            } => {
                error::positive("radius", *radius)?;
                error::non_negative("half_height", *half_height)?;
            }
            ColliderShapeDef::RoundCuboid {
                half_extents,
                border_radius,
            } => {
                error::positive("half_extents.x", half_extents.x)?;
                error::positive("half_extents.y", half_extents.y)?;
                error::positive("half_extents.z", half_extents.z)?;
                error::non_negative("border_radius", *border_radius)?;
            }
            ColliderShapeDef::Character(shape) => validate_character_shape(shape)?,
        }
        Ok(())
    }

    /// Collider shape plus its pose relative to the body.
    fn build(&self) -> (SharedShape, Iso) {
        match self {
            ColliderShapeDef::Plane {
                offset_along_normal,
            } => (
                SharedShape::halfspace(Vec3::y_axis()),
                Iso::translation(0.0, *offset_along_normal, 0.0),
            ),
            ColliderShapeDef::Cuboid { half_extents } => (
                SharedShape::cuboid(half_extents.x, half_extents.y, half_extents.z),
                Iso::identity(),
            ),
            ColliderShapeDef::Sphere { radius } => (SharedShape::ball(*radius), Iso::identity()),
            ColliderShapeDef::CapsuleY {
                radius,
                half_height,
            } => (
                SharedShape::capsule_y(*half_height, *radius),
                Iso::identity(),
            ),
            ColliderShapeDef::CylinderY {
                radius,
                half_height,
            } => (
                SharedShape::cylinder(*half_height, *radius),
                Iso::identity(),
            ),
            ColliderShapeDef::RoundCuboid {
                half_extents,
                border_radius,
            } => (
                SharedShape::round_cuboid(
                    half_extents.x,
                    half_extents.y,
                    half_extents.z,
                    *border_radius,
                ),
                Iso::identity(),
            ),
            ColliderShapeDef::Character(shape) => {
                let center = shape.local_center();
                (
                    SharedShape::capsule_y(shape.half_segment(), shape.radius),
                    Iso::translation(center.x, center.y, center.z),
                )
            }
        }
    }
}

pub(crate) fn validate_character_shape(shape: &CharacterShape) -> Result<(), ConfigError> {
    error::positive("shape.radius", shape.radius)?;
    error::positive("shape.height", shape.height)?;
    if shape.height < shape.radius * 2.0 {
        return Err(ConfigError::DegenerateCapsule {
            height: shape.height,
            diameter: shape.radius * 2.0,
        });
    }
    Ok(())
}

/// Parry capsule matching a character shape.
#[inline]
pub fn character_capsule(shape: &CharacterShape) -> Capsule {
    Capsule::new_y(shape.half_segment(), shape.radius)
}

struct BodyRecord {
    kind: BodyKind,
    material: HitMaterial,
    collider: ColliderHandle,
    /// Collider pose relative to the body pose.
    local_pose: Iso,
    tracked: TrackedTransform,
    linear_velocity: Vec3,
}

/// In-memory Rapier colliders plus per-entity body bookkeeping.
#[derive(Default)]
pub struct RapierQueryWorld {
    colliders: ColliderSet,
    bodies: HashMap<Entity, BodyRecord>,
}

impl RapierQueryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a query world from a list of body definitions.
    ///
    /// The input is sorted by entity before insertion so collider handles are
    /// assigned deterministically.
    pub fn build(mut defs: Vec<WorldBodyDef>) -> Result<Self, ConfigError> {
        defs.sort_by_key(|d| d.entity);

        let mut world = Self::new();
        for def in defs {
            world.insert(def)?;
        }
        Ok(world)
    }

    /// Insert one body and its collider.
    pub fn insert(&mut self, def: WorldBodyDef) -> Result<Entity, ConfigError> {
        if def.entity.is_null() {
            return Err(ConfigError::NullEntity);
        }
        if self.bodies.contains_key(&def.entity) {
            return Err(ConfigError::DuplicateEntity(def.entity.0));
        }
        def.shape.validate()?;
        error::finite("transform.translation.x", def.transform.translation.x)?;
        error::finite("transform.translation.y", def.transform.translation.y)?;
        error::finite("transform.translation.z", def.transform.translation.z)?;

        let (shape, local_pose) = def.shape.build();
        let mut collider: Collider = ColliderBuilder::new(shape)
            .sensor(!def.material.response.is_collidable())
            .friction(def.material.friction)
            .restitution(def.material.restitution)
            .user_data(def.entity.0 as u128)
            .build();
        collider.set_position(def.transform.iso() * local_pose);
        let handle = self.colliders.insert(collider);

        self.bodies.insert(
            def.entity,
            BodyRecord {
                kind: def.kind,
                material: def.material,
                collider: handle,
                local_pose,
                tracked: TrackedTransform::at_rest(def.transform),
                linear_velocity: Vec3::zeros(),
            },
        );
        Ok(def.entity)
    }

    /// Register a character collider so other characters can collide with it.
    pub fn insert_character(
        &mut self,
        entity: Entity,
        shape: CharacterShape,
        transform: Transform,
    ) -> Result<Entity, ConfigError> {
        self.insert(WorldBodyDef {
            entity,
            kind: BodyKind::Character,
            transform,
            shape: ColliderShapeDef::Character(shape),
            material: HitMaterial::default(),
        })
    }

    /// Start a new fixed step: every body's current pose becomes its previous pose.
    pub fn begin_step(&mut self) {
        for record in self.bodies.values_mut() {
            record.tracked.previous = record.tracked.current;
        }
    }

    /// Move a body for the current step. Returns `false` for unknown entities.
    pub fn set_body_pose(&mut self, entity: Entity, transform: Transform) -> bool {
        let Some(record) = self.bodies.get_mut(&entity) else {
            return false;
        };
        record.tracked.current = transform;
        if let Some(collider) = self.colliders.get_mut(record.collider) {
            collider.set_position(transform.iso() * record.local_pose);
        }
        true
    }

    /// Report the velocity of a dynamic body (owned by the external physics step).
    pub fn set_linear_velocity(&mut self, entity: Entity, velocity: Vec3) -> bool {
        match self.bodies.get_mut(&entity) {
            Some(record) => {
                record.linear_velocity = velocity;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Colliders that may be touched by something inside `bounds`, skipping `ignore`.
    fn candidates<'a>(
        &'a self,
        bounds: &'a Aabb,
        ignore: Entity,
    ) -> impl Iterator<Item = (Entity, &'a Collider, HitMaterial)> + 'a {
        self.colliders.iter().filter_map(move |(_, collider)| {
            let entity = Entity(collider.user_data as u64);
            if entity == ignore || !bounds.intersects(&collider.compute_aabb()) {
                return None;
            }
            let material = self.bodies.get(&entity).map(|r| r.material)?;
            Some((entity, collider, material))
        })
    }
}

/// Normalize a query normal, falling back when the query could not produce one
/// (e.g. a cast that starts in deep penetration).
#[inline]
fn unit_or(normal: Vec3, fallback: Vec3) -> Vec3 {
    normal
        .try_normalize(1.0e-6)
        .or_else(|| fallback.try_normalize(1.0e-6))
        .unwrap_or_else(Vec3::y)
}

impl CollisionWorld for RapierQueryWorld {
    fn cast_shape(
        &self,
        shape: &CharacterShape,
        pose: &Iso,
        translation: &Vec3,
        ignore: Entity,
    ) -> Vec<ColliderCastHit> {
        let capsule = character_capsule(shape);
        let mut end = *pose;
        end.append_translation_mut(&na::Translation3::from(*translation));
        let swept = capsule.compute_aabb(pose).merged(&capsule.compute_aabb(&end));

        let mut opts = ShapeCastOptions::with_max_time_of_impact(1.0);
        opts.stop_at_penetration = true;
        opts.compute_impact_geometry_on_penetration = true;

        let mut hits: Vec<ColliderCastHit> = self
            .candidates(&swept, ignore)
            .filter_map(|(entity, collider, material)| {
                let cast = query::cast_shapes(
                    pose,
                    translation,
                    &capsule as &dyn Shape,
                    collider.position(),
                    &Vec3::zeros(),
                    collider.shape(),
                    opts,
                )
                .ok()??;

                let collider_pos = collider.position();
                let normal = unit_or(
                    collider_pos.rotation * cast.normal2.into_inner(),
                    -translation,
                );
                let point = collider_pos * cast.witness2;
                Some(ColliderCastHit {
                    hit: BasicHit {
                        entity,
                        position: point.coords,
                        normal,
                        material,
                    },
                    fraction: cast.time_of_impact,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            a.fraction
                .total_cmp(&b.fraction)
                .then(a.hit.entity.cmp(&b.hit.entity))
        });
        hits
    }

    fn overlap(
        &self,
        shape: &CharacterShape,
        pose: &Iso,
        max_distance: f32,
        ignore: Entity,
    ) -> Vec<DistanceHit> {
        let max_distance = max_distance.max(0.0);
        let capsule = character_capsule(shape);
        let bounds = capsule.compute_aabb(pose).loosened(max_distance);

        // Distances are measured from the capsule's inner segment, minus the radius.
        let segment = capsule.segment;
        let radius = capsule.radius;

        let mut hits: Vec<DistanceHit> = self
            .candidates(&bounds, ignore)
            .filter_map(|(entity, collider, material)| {
                let contact = query::contact(
                    pose,
                    &segment as &dyn Shape,
                    collider.position(),
                    collider.shape(),
                    max_distance + radius,
                )
                .ok()??;

                let distance = contact.dist - radius;
                if distance > max_distance {
                    return None;
                }

                let toward_character = pose.translation.vector - contact.point2.coords;
                let normal = unit_or(-contact.normal1.into_inner(), toward_character);
                Some(DistanceHit {
                    hit: BasicHit {
                        entity,
                        position: contact.point2.coords,
                        normal,
                        material,
                    },
                    distance,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.hit.entity.cmp(&b.hit.entity))
        });
        hits
    }

    fn cast_ray(
        &self,
        origin: &Vec3,
        direction: &Vec3,
        max_distance: f32,
        ignore: Entity,
    ) -> Vec<RaycastHit> {
        if max_distance <= 0.0 {
            return Vec::new();
        }
        let ray = Ray::new(Point3::from(*origin), *direction);
        let end = origin + direction * max_distance;
        let bounds = Aabb::new(
            Point3::from(origin.inf(&end)),
            Point3::from(origin.sup(&end)),
        );

        let mut hits: Vec<RaycastHit> = self
            .candidates(&bounds, ignore)
            .filter_map(|(entity, collider, material)| {
                let hit = collider.shape().cast_ray_and_get_normal(
                    collider.position(),
                    &ray,
                    max_distance,
                    true,
                )?;
                Some(RaycastHit {
                    hit: BasicHit {
                        entity,
                        position: ray.point_at(hit.time_of_impact).coords,
                        normal: unit_or(hit.normal, -direction),
                        material,
                    },
                    fraction: hit.time_of_impact / max_distance,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            a.fraction
                .total_cmp(&b.fraction)
                .then(a.hit.entity.cmp(&b.hit.entity))
        });
        hits
    }

    fn body_kind(&self, entity: Entity) -> Option<BodyKind> {
        self.bodies.get(&entity).map(|r| r.kind)
    }

    fn tracked_transform(&self, entity: Entity) -> Option<TrackedTransform> {
        self.bodies
            .get(&entity)
            .filter(|r| matches!(r.kind, BodyKind::Kinematic))
            .map(|r| r.tracked)
    }

    fn linear_velocity(&self, entity: Entity) -> Vec3 {
        self.bodies
            .get(&entity)
            .map(|r| r.linear_velocity)
            .unwrap_or_else(Vec3::zeros)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::types::Quat;

    fn floor_and_wall() -> RapierQueryWorld {
        RapierQueryWorld::build(vec![
            WorldBodyDef::fixed(
                Entity(2),
                Transform::from_translation(Vec3::new(3.0, 1.0, 0.0)),
                ColliderShapeDef::Cuboid {
                    half_extents: Vec3::new(0.5, 1.0, 5.0),
                },
            ),
            WorldBodyDef::fixed(
                Entity(1),
                Transform::from_translation(Vec3::new(0.0, -0.5, 0.0)),
                ColliderShapeDef::Cuboid {
                    half_extents: Vec3::new(50.0, 0.5, 50.0),
                },
            ),
        ])
        .expect("valid world")
    }

    #[test]
    fn rejects_null_and_duplicate_entities() {
        let mut world = RapierQueryWorld::new();
        let def = WorldBodyDef::fixed(
            Entity::NULL,
            Transform::identity(),
            ColliderShapeDef::Sphere { radius: 1.0 },
        );
        assert_eq!(world.insert(def.clone()), Err(ConfigError::NullEntity));

        let def = WorldBodyDef {
            entity: Entity(7),
            ..def
        };
        assert!(world.insert(def.clone()).is_ok());
        assert_eq!(world.insert(def), Err(ConfigError::DuplicateEntity(7)));
    }

    #[test]
    fn shape_cast_reports_wall_normal() {
        let world = floor_and_wall();
        let shape = CharacterShape::new(0.5, 2.0);
        let pose = shape.pose(&Vec3::new(0.0, 0.1, 0.0), &Quat::identity());

        let hits = world.cast_shape(&shape, &pose, &Vec3::new(4.0, 0.0, 0.0), Entity(9));
        let wall = hits
            .iter()
            .find(|h| h.hit.entity == Entity(2))
            .expect("wall hit");

        // Capsule surface starts 2.0 m from the wall face at x = 2.5.
        assert!((wall.fraction * 4.0 - 2.0).abs() < 1.0e-3);
        assert!((wall.hit.normal - Vec3::new(-1.0, 0.0, 0.0)).norm() < 1.0e-3);
    }

    #[test]
    fn shape_cast_hits_are_sorted_and_ignore_self() {
        let world = floor_and_wall();
        let shape = CharacterShape::new(0.5, 2.0);
        let pose = shape.pose(&Vec3::new(0.0, 1.0, 0.0), &Quat::identity());

        let hits = world.cast_shape(&shape, &pose, &Vec3::new(0.0, -3.0, 0.0), Entity(9));
        assert_eq!(hits.len(), 1);
        assert!((hits[0].fraction * 3.0 - 1.0).abs() < 1.0e-3);

        let ignored = world.cast_shape(&shape, &pose, &Vec3::new(0.0, -3.0, 0.0), Entity(1));
        assert!(ignored.is_empty());
    }

    #[test]
    fn ray_cast_reports_distance_and_normal() {
        let world = floor_and_wall();
        let hits = world.cast_ray(
            &Vec3::new(0.0, 2.0, 0.0),
            &Vec3::new(0.0, -1.0, 0.0),
            5.0,
            Entity::NULL,
        );
        assert_eq!(hits[0].hit.entity, Entity(1));
        assert!((hits[0].fraction * 5.0 - 2.0).abs() < 1.0e-4);
        assert!((hits[0].hit.normal - Vec3::y()).norm() < 1.0e-4);
    }

    #[test]
    fn overlap_reports_penetration_depth() {
        let world = floor_and_wall();
        let shape = CharacterShape::new(0.5, 2.0);
        // Feet 0.2 m below the floor top.
        let pose = shape.pose(&Vec3::new(0.0, -0.2, 0.0), &Quat::identity());

        let hits = world.overlap(&shape, &pose, 0.0, Entity::NULL);
        assert_eq!(hits.len(), 1);
        assert!((hits[0].distance + 0.2).abs() < 1.0e-3);
        assert!((hits[0].hit.normal - Vec3::y()).norm() < 1.0e-3);
    }

    #[test]
    fn overlap_depth_is_stable_while_sinking() {
        let world = floor_and_wall();
        let shape = CharacterShape::new(0.5, 2.0);

        for step in 1..=40 {
            let depth = step as f32 * 0.01;
            let pose = shape.pose(&Vec3::new(0.0, -depth, 0.0), &Quat::identity());

            let hits = world.overlap(&shape, &pose, 0.0, Entity::NULL);
            assert_eq!(hits.len(), 1, "depth {depth}");
            assert_eq!(hits[0].hit.entity, Entity(1));
            assert!(
                (hits[0].distance + depth).abs() < 1.0e-3,
                "depth {depth}: distance {}",
                hits[0].distance
            );
            assert!(
                (hits[0].hit.normal - Vec3::y()).norm() < 1.0e-3,
                "depth {depth}: normal {:?}",
                hits[0].hit.normal
            );
        }
    }

    #[test]
    fn overlap_respects_max_distance() {
        let world = floor_and_wall();
        let shape = CharacterShape::new(0.5, 2.0);
        let pose = shape.pose(&Vec3::new(0.0, 0.05, 0.0), &Quat::identity());

        assert!(world.overlap(&shape, &pose, 0.0, Entity::NULL).is_empty());

        let hits = world.overlap(&shape, &pose, 0.1, Entity::NULL);
        assert_eq!(hits.len(), 1);
        assert!((hits[0].distance - 0.05).abs() < 1.0e-3);
    }

    #[test]
    fn tracked_transform_follows_step_protocol() {
        let mut world = RapierQueryWorld::new();
        let platform = world
            .insert(
                WorldBodyDef::fixed(
                    Entity(3),
                    Transform::identity(),
                    ColliderShapeDef::Cuboid {
                        half_extents: Vec3::new(1.0, 0.1, 1.0),
                    },
                )
                .with_kind(BodyKind::Kinematic),
            )
            .expect("insert");

        world.begin_step();
        world.set_body_pose(platform, Transform::from_translation(Vec3::new(0.5, 0.0, 0.0)));
        let tracked = world.tracked_transform(platform).expect("kinematic");
        assert!((tracked.current.translation.x - 0.5).abs() < 1.0e-6);
        assert!(tracked.previous.translation.x.abs() < 1.0e-6);

        // A step without movement leaves no delta behind.
        world.begin_step();
        let tracked = world.tracked_transform(platform).expect("kinematic");
        assert_eq!(tracked.previous, tracked.current);
    }
}
