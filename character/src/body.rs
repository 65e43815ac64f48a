//! Character state and authored tunables.
//!
//! `KinematicCharacter` bundles everything a single character update mutates:
//! the body, its immutable properties and the per-tick buffers (hits,
//! velocity projection hits, deferred impulses, stateful hits). It is owned
//! exclusively by one character, so many characters can update in parallel.

use crate::collision::rapier_world::validate_character_shape;
use crate::collision::types::{BasicHit, CharacterShape, DeferredImpulse, Entity, Quat, Transform, Vec3};
use crate::error::{self, ConfigError};
use crate::hits::{CharacterHit, StatefulCharacterHit};
use crate::movement::MovementOutcome;
use crate::projection::VelocityProjectionBuffer;
use crate::settings::{
    DEFAULT_CAPSULE_HEIGHT, DEFAULT_CAPSULE_RADIUS, DEFAULT_CHARACTER_MASS,
    DEFAULT_CHARACTER_WIDTH_FOR_STEP_GROUNDING_CHECK, DEFAULT_EXTRA_STEPS_CHECK_DISTANCE,
    DEFAULT_GROUND_SNAPPING_DISTANCE, DEFAULT_MAX_CONTINUOUS_COLLISIONS_ITERATIONS,
    DEFAULT_MAX_DOWNWARD_SLOPE_CHANGE_DEGREES, DEFAULT_MAX_GROUNDED_SLOPE_DEGREES,
    DEFAULT_MAX_OVERLAP_DECOLLISION_ITERATIONS, DEFAULT_MAX_STEP_HEIGHT,
};

/// Mutable physical state of a character.
///
/// `relative_velocity` is expressed relative to the parent body when the
/// character is attached to one, in world space otherwise.
#[derive(Clone, Debug, PartialEq)]
pub struct CharacterBody {
    /// Feet position (bottom of the capsule).
    pub position: Vec3,
    pub rotation: Quat,
    pub relative_velocity: Vec3,
    pub is_grounded: bool,
    /// Unit-length up direction used for slope classification.
    pub grounding_up: Vec3,
    /// Authoritative ground contact. Meaningful only while `is_grounded`.
    pub ground_hit: BasicHit,
    pub was_grounded_before_character_update: bool,
    pub last_physics_update_delta_time: f32,
    /// Rotation applied by the parent body during the last physics update.
    pub rotation_from_parent: Quat,

    pub parent_entity: Entity,
    /// Ground contact point at attachment time, in the character's local frame.
    pub parent_local_anchor_point: Vec3,
    /// Velocity of the parent at the anchor point during the last physics update.
    pub parent_velocity: Vec3,
    pub previous_parent_entity: Entity,
}

impl CharacterBody {
    pub fn new(transform: Transform) -> Self {
        Self {
            position: transform.translation,
            rotation: transform.rotation,
            relative_velocity: Vec3::zeros(),
            is_grounded: false,
            grounding_up: Vec3::y(),
            ground_hit: BasicHit::default(),
            was_grounded_before_character_update: false,
            last_physics_update_delta_time: 0.0,
            rotation_from_parent: Quat::identity(),
            parent_entity: Entity::NULL,
            parent_local_anchor_point: Vec3::zeros(),
            parent_velocity: Vec3::zeros(),
            previous_parent_entity: Entity::NULL,
        }
    }

    #[inline]
    pub fn transform(&self) -> Transform {
        Transform::new(self.position, self.rotation)
    }

    /// Velocity in world space: relative velocity plus the parent's.
    #[inline]
    pub fn world_velocity(&self) -> Vec3 {
        self.relative_velocity + self.parent_velocity
    }

    #[inline]
    pub fn has_become_grounded(&self) -> bool {
        self.is_grounded && !self.was_grounded_before_character_update
    }

    #[inline]
    pub fn has_become_ungrounded(&self) -> bool {
        !self.is_grounded && self.was_grounded_before_character_update
    }
}

/// Engine-level character knobs, fixed at creation.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-serialize",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct CharacterProperties {
    pub shape: CharacterShape,
    pub evaluate_grounding: bool,
    pub snap_to_ground: bool,
    pub ground_snapping_distance: f32,
    pub max_grounded_slope_degrees: f32,
    pub detect_movement_collisions: bool,
    pub decollide_from_overlaps: bool,
    pub project_velocity_on_initial_overlaps: bool,
    pub max_continuous_collisions_iterations: u32,
    pub max_overlap_decollision_iterations: u32,
    pub discard_movement_when_exceed_max_iterations: bool,
    pub kill_velocity_when_exceed_max_iterations: bool,
    pub detect_obstructions_for_parent_body_movement: bool,
    pub synchronize_rotation_with_parent: bool,
    /// Push dynamic bodies and get pushed back by them.
    pub simulate_dynamic_body: bool,
    pub mass: f32,
}

impl Default for CharacterProperties {
    fn default() -> Self {
        Self {
            shape: CharacterShape::new(DEFAULT_CAPSULE_RADIUS, DEFAULT_CAPSULE_HEIGHT),
            evaluate_grounding: true,
            snap_to_ground: true,
            ground_snapping_distance: DEFAULT_GROUND_SNAPPING_DISTANCE,
            max_grounded_slope_degrees: DEFAULT_MAX_GROUNDED_SLOPE_DEGREES,
            detect_movement_collisions: true,
            decollide_from_overlaps: true,
            project_velocity_on_initial_overlaps: false,
            max_continuous_collisions_iterations: DEFAULT_MAX_CONTINUOUS_COLLISIONS_ITERATIONS,
            max_overlap_decollision_iterations: DEFAULT_MAX_OVERLAP_DECOLLISION_ITERATIONS,
            discard_movement_when_exceed_max_iterations: true,
            kill_velocity_when_exceed_max_iterations: true,
            detect_obstructions_for_parent_body_movement: false,
            synchronize_rotation_with_parent: true,
            simulate_dynamic_body: true,
            mass: DEFAULT_CHARACTER_MASS,
        }
    }
}

impl CharacterProperties {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_character_shape(&self.shape)?;
        error::non_negative("ground_snapping_distance", self.ground_snapping_distance)?;
        error::angle_in(
            "max_grounded_slope_degrees",
            self.max_grounded_slope_degrees,
            0.0,
            90.0,
        )?;
        if self.max_continuous_collisions_iterations == 0 {
            return Err(ConfigError::ZeroIterations {
                field: "max_continuous_collisions_iterations",
            });
        }
        error::positive("mass", self.mass)?;
        Ok(())
    }

    /// Cosine of the max grounded slope angle.
    #[inline]
    pub fn max_grounded_slope_dot(&self) -> f32 {
        self.max_grounded_slope_degrees.to_radians().cos()
    }
}

/// Step and slope policy, owned by the character archetype's component.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-serialize",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct StepAndSlopeHandling {
    pub step_handling: bool,
    pub max_step_height: f32,
    pub extra_steps_check_distance: f32,
    pub character_width_for_step_grounding_check: f32,
    pub prevent_grounding_when_moving_towards_no_grounding: bool,
    pub has_max_downward_slope_change_angle: bool,
    pub max_downward_slope_change_degrees: f32,
    pub constrain_velocity_to_ground_plane: bool,
}

impl Default for StepAndSlopeHandling {
    fn default() -> Self {
        Self {
            step_handling: false,
            max_step_height: DEFAULT_MAX_STEP_HEIGHT,
            extra_steps_check_distance: DEFAULT_EXTRA_STEPS_CHECK_DISTANCE,
            character_width_for_step_grounding_check:
                DEFAULT_CHARACTER_WIDTH_FOR_STEP_GROUNDING_CHECK,
            prevent_grounding_when_moving_towards_no_grounding: true,
            has_max_downward_slope_change_angle: false,
            max_downward_slope_change_degrees: DEFAULT_MAX_DOWNWARD_SLOPE_CHANGE_DEGREES,
            constrain_velocity_to_ground_plane: true,
        }
    }
}

impl StepAndSlopeHandling {
    pub fn validate(&self) -> Result<(), ConfigError> {
        error::non_negative("max_step_height", self.max_step_height)?;
        error::non_negative("extra_steps_check_distance", self.extra_steps_check_distance)?;
        error::non_negative(
            "character_width_for_step_grounding_check",
            self.character_width_for_step_grounding_check,
        )?;
        error::angle_in(
            "max_downward_slope_change_degrees",
            self.max_downward_slope_change_degrees,
            0.0,
            180.0,
        )?;
        Ok(())
    }
}

/// A character plus the buffers its update fills.
#[derive(Clone, Debug)]
pub struct KinematicCharacter {
    pub entity: Entity,
    pub body: CharacterBody,
    pub properties: CharacterProperties,

    /// Every hit detected during the last physics update, in detection order.
    pub hits: Vec<CharacterHit>,
    pub velocity_projection_hits: VelocityProjectionBuffer,
    /// Impulses for the external physics step to apply to dynamic bodies.
    pub deferred_impulses: Vec<DeferredImpulse>,
    /// Per-entity Enter/Stay/Exit records of the last physics update.
    pub stateful_hits: Vec<StatefulCharacterHit>,
    pub movement_outcome: MovementOutcome,
}

impl KinematicCharacter {
    pub fn new(
        entity: Entity,
        properties: CharacterProperties,
        transform: Transform,
    ) -> Result<Self, ConfigError> {
        if entity.is_null() {
            return Err(ConfigError::NullEntity);
        }
        if let Err(err) = properties.validate() {
            log::warn!("rejected character properties for {entity:?}: {err}");
            return Err(err);
        }
        Ok(Self {
            entity,
            body: CharacterBody::new(transform),
            properties,
            hits: Vec::new(),
            velocity_projection_hits: VelocityProjectionBuffer::default(),
            deferred_impulses: Vec::new(),
            stateful_hits: Vec::new(),
            movement_outcome: MovementOutcome::default(),
        })
    }

    /// First physics phase: reset the per-update buffers and remember the
    /// grounding and parent state the update starts from.
    pub fn update_initialize(&mut self, delta_time: f32) {
        self.hits.clear();
        self.velocity_projection_hits.clear();
        self.deferred_impulses.clear();
        self.movement_outcome = MovementOutcome::default();

        let body = &mut self.body;
        body.was_grounded_before_character_update = body.is_grounded;
        body.previous_parent_entity = body.parent_entity;
        body.rotation_from_parent = Quat::identity();
        body.is_grounded = false;
        body.ground_hit = BasicHit::default();
        body.last_physics_update_delta_time = delta_time;
    }

    /// Ground the character on `ground` without running an update (spawning on a floor).
    pub fn with_ground(mut self, ground: BasicHit) -> Self {
        self.body.is_grounded = true;
        self.body.ground_hit = ground;
        self
    }

    #[inline]
    pub fn shape(&self) -> &CharacterShape {
        &self.properties.shape
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tunables_are_valid() {
        assert_eq!(CharacterProperties::default().validate(), Ok(()));
        assert_eq!(StepAndSlopeHandling::default().validate(), Ok(()));
    }

    #[test]
    fn invalid_properties_are_rejected_at_creation() {
        let properties = CharacterProperties {
            max_continuous_collisions_iterations: 0,
            ..CharacterProperties::default()
        };
        let result = KinematicCharacter::new(Entity(1), properties, Transform::identity());
        assert!(matches!(result, Err(ConfigError::ZeroIterations { .. })));

        let properties = CharacterProperties {
            shape: CharacterShape::new(1.0, 1.5),
            ..CharacterProperties::default()
        };
        let result = KinematicCharacter::new(Entity(1), properties, Transform::identity());
        assert!(matches!(result, Err(ConfigError::DegenerateCapsule { .. })));

        let result =
            KinematicCharacter::new(Entity::NULL, CharacterProperties::default(), Transform::identity());
        assert!(matches!(result, Err(ConfigError::NullEntity)));
    }

    #[test]
    fn grounding_transitions_compare_against_previous_update() {
        let ground = BasicHit {
            entity: Entity(5),
            normal: Vec3::y(),
            ..BasicHit::default()
        };
        let mut character =
            KinematicCharacter::new(Entity(1), CharacterProperties::default(), Transform::identity())
                .expect("valid character")
                .with_ground(ground);
        assert!(character.body.is_grounded);
        assert_eq!(character.body.ground_hit.entity, Entity(5));
        assert!(character.body.has_become_grounded());

        character.update_initialize(0.02);
        assert!(character.body.has_become_ungrounded());
        assert_eq!(character.body.ground_hit, BasicHit::default());

        character.body.is_grounded = true;
        assert!(!character.body.has_become_grounded());
        assert!(!character.body.has_become_ungrounded());
    }

    #[test]
    fn slope_limit_of_ninety_degrees_is_accepted() {
        let properties = CharacterProperties {
            max_grounded_slope_degrees: 90.0,
            ..CharacterProperties::default()
        };
        assert!(properties.validate().is_ok());
        assert!(properties.max_grounded_slope_dot().abs() < 1.0e-6);
    }
}
