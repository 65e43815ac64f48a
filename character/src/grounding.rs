//! Grounding resolver.
//!
//! Classifies hits as ground or wall, detects the ground under the character at
//! the start of an update, and predicts grounding loss ahead of the character.
//!
//! Slope rule: a hit is ground when the angle between its normal and the
//! grounding up is at most the configured max slope. The bound is inclusive:
//! `dot(normal, up) >= cos(max_slope) - SLOPE_DOT_EPS`.

use crate::body::{CharacterBody, KinematicCharacter, StepAndSlopeHandling};
use crate::collision::material::MaterialTag;
use crate::collision::query::CollisionWorld;
use crate::collision::types::{BasicHit, RaycastHit, Vec3};
use crate::hits::CharacterHit;
use crate::processor::{CharacterProcessor, GroundingEvaluation, UpdateContext};
use crate::projection::{VelocityProjectionHit, project_on_plane, project_pending_velocity};
use crate::settings::{
    COLLISION_OFFSET, DOT_SIMILARITY_EPS, FUTURE_SLOPE_DOWN_DETECTION_DEPTH,
    FUTURE_SLOPE_SECONDARY_NO_GROUNDING_DISTANCE, FUTURE_SLOPE_VERTICAL_OFFSET,
    GROUND_PROBE_UNGROUNDED_DISTANCE, MIN_MOVE_SQ, SLOPE_DOT_EPS,
    STEP_GROUNDING_HORIZONTAL_OFFSET,
};

/// Grounding up follows the character's local up axis.
pub fn default_update_grounding_up(body: &mut CharacterBody) {
    body.grounding_up = (body.rotation * Vec3::y())
        .try_normalize(1.0e-6)
        .unwrap_or_else(Vec3::y);
}

/// Solid surfaces and other characters block the character, unless tagged
/// to let characters through.
pub fn default_can_collide_with_hit<W: CollisionWorld>(world: &W, hit: &BasicHit) -> bool {
    if hit.material.tags.has(MaterialTag::IgnoreCharacters) {
        return false;
    }
    hit.material.response.is_collidable() || world.is_character(hit.entity)
}

/// Inclusive slope test.
#[inline]
pub fn is_grounded_on_slope_normal(max_slope_dot: f32, normal: &Vec3, grounding_up: &Vec3) -> bool {
    normal.dot(grounding_up) >= max_slope_dot - SLOPE_DOT_EPS
}

/// Standard ground classification.
///
/// Hits tagged `NotGroundable` are never ground. Hits failing the slope test
/// may still be ground when step handling is on, the evaluation allows it, the
/// hit is under the character and not on a dynamic body: the step probe then
/// decides.
pub fn default_is_grounded_on_hit<P, W>(
    processor: &P,
    ctx: &P::Context,
    base: &UpdateContext<'_, W>,
    character: &KinematicCharacter,
    hit: &BasicHit,
    handling: &StepAndSlopeHandling,
    evaluation: GroundingEvaluation,
) -> bool
where
    P: CharacterProcessor<W>,
    W: CollisionWorld,
{
    if hit.material.tags.has(MaterialTag::NotGroundable) {
        return false;
    }

    let up = character.body.grounding_up;
    let max_slope_dot = character.properties.max_grounded_slope_dot();
    if is_grounded_on_slope_normal(max_slope_dot, &hit.normal, &up) {
        return true;
    }

    let hit_is_on_character_bottom = hit.normal.dot(&up) > DOT_SIMILARITY_EPS;
    handling.step_handling
        && handling.max_step_height > 0.0
        && evaluation.allows_step_grounding()
        && hit_is_on_character_bottom
        && base.world.dynamic_mass(hit.entity).is_none()
        && is_grounded_on_steps(processor, ctx, base, character, hit, handling)
}

/// Step edge probe.
///
/// Casts one ray down just behind the edge (toward the character) and one ray
/// down just past it, raised so that both levels must lie within
/// `max_step_height` of each other. Both rays must land on slope-grounded
/// surfaces. Each side retries at `extra_steps_check_distance`.
pub fn is_grounded_on_steps<P, W>(
    processor: &P,
    ctx: &P::Context,
    base: &UpdateContext<'_, W>,
    character: &KinematicCharacter,
    hit: &BasicHit,
    handling: &StepAndSlopeHandling,
) -> bool
where
    P: CharacterProcessor<W>,
    W: CollisionWorld,
{
    let up = character.body.grounding_up;
    let max_slope_dot = character.properties.max_grounded_slope_dot();
    let Some(back_direction) = project_on_plane(&hit.normal, &up).try_normalize(1.0e-6) else {
        return false;
    };

    let probe = |origin: Vec3| -> Option<f32> {
        let ray_hit = base.world.cast_ray_closest(
            &origin,
            &-up,
            handling.max_step_height,
            character.entity,
            |h| processor.can_collide_with_hit(ctx, base, &h.hit),
        )?;
        let distance = ray_hit.fraction * handling.max_step_height;
        (distance > 0.0 && is_grounded_on_slope_normal(max_slope_dot, &ray_hit.hit.normal, &up))
            .then_some(distance)
    };
    let retry_far = handling.extra_steps_check_distance > STEP_GROUNDING_HORIZONTAL_OFFSET;

    let back_distance = probe(hit.position + back_direction * STEP_GROUNDING_HORIZONTAL_OFFSET)
        .or_else(|| {
            retry_far
                .then(|| probe(hit.position + back_direction * handling.extra_steps_check_distance))
                .flatten()
        });
    let Some(back_distance) = back_distance else {
        return false;
    };

    let forward_origin = hit.position + up * (handling.max_step_height - back_distance);
    probe(forward_origin - back_direction * STEP_GROUNDING_HORIZONTAL_OFFSET)
        .or_else(|| {
            retry_far
                .then(|| probe(forward_origin - back_direction * handling.extra_steps_check_distance))
                .flatten()
        })
        .is_some()
}

/// Result of a downward ground probe.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundDetection {
    pub hit: BasicHit,
    /// Distance from the character to the ground, collision offset removed.
    pub distance: f32,
    pub is_grounded: bool,
}

/// Cast the character shape down along the grounding up.
///
/// The probe reaches `ground_snapping_distance` when the character was
/// grounded before the update and snaps to ground, and only
/// `GROUND_PROBE_UNGROUNDED_DISTANCE` otherwise.
pub fn ground_detection<P, W>(
    processor: &P,
    ctx: &P::Context,
    base: &UpdateContext<'_, W>,
    character: &KinematicCharacter,
) -> Option<GroundDetection>
where
    P: CharacterProcessor<W>,
    W: CollisionWorld,
{
    let body = &character.body;
    let properties = &character.properties;
    let up = body.grounding_up;

    let probe_length = if properties.snap_to_ground && body.was_grounded_before_character_update {
        properties.ground_snapping_distance.max(GROUND_PROBE_UNGROUNDED_DISTANCE)
    } else {
        GROUND_PROBE_UNGROUNDED_DISTANCE
    };

    let pose = character.shape().pose(&body.position, &body.rotation);
    let cast = base.world.cast_shape_closest(
        character.shape(),
        &pose,
        &(-up * probe_length),
        character.entity,
        |h| h.hit.normal.dot(&up) > 0.0 && processor.can_collide_with_hit(ctx, base, &h.hit),
    )?;

    let is_grounded = processor.is_grounded_on_hit(
        ctx,
        base,
        character,
        &cast.hit,
        GroundingEvaluation::GroundProbing,
    );
    Some(GroundDetection {
        hit: cast.hit,
        distance: cast.fraction * probe_length - COLLISION_OFFSET,
        is_grounded,
    })
}

/// Physics phase: detect ground, snap onto it and project velocity on it.
pub fn update_grounding<P, W>(
    processor: &P,
    ctx: &P::Context,
    base: &UpdateContext<'_, W>,
    character: &mut KinematicCharacter,
) where
    P: CharacterProcessor<W>,
    W: CollisionWorld,
{
    if !character.properties.evaluate_grounding {
        return;
    }
    let Some(ground) = ground_detection(processor, ctx, base, character) else {
        return;
    };
    if !ground.is_grounded {
        return;
    }

    let body = &mut character.body;
    if character.properties.snap_to_ground {
        body.position -= body.grounding_up * ground.distance;
    }
    body.is_grounded = true;
    body.ground_hit = ground.hit;

    let velocity = body.relative_velocity;
    let hit = CharacterHit::new(&ground.hit, ground.distance, true, true, velocity);
    character.hits.push(hit);
    character
        .velocity_projection_hits
        .push(VelocityProjectionHit::new(&ground.hit, true));

    let original_direction = velocity.try_normalize(1.0e-6).unwrap_or_else(Vec3::zeros);
    project_pending_velocity(processor, ctx, base, character, original_direction);
    if let Some(last) = character.hits.last_mut() {
        last.character_velocity_after_hit = character.body.relative_velocity;
    }
}

/// What a probe ahead of the character found.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FutureSlopeChange {
    pub is_moving_towards_no_grounding: bool,
    pub is_on_max_downward_slope_change: bool,
}

/// Probe the ground ahead of the character along its ground-projected velocity.
pub fn detect_future_slope_change<P, W>(
    processor: &P,
    ctx: &P::Context,
    base: &UpdateContext<'_, W>,
    character: &KinematicCharacter,
    handling: &StepAndSlopeHandling,
) -> FutureSlopeChange
where
    P: CharacterProcessor<W>,
    W: CollisionWorld,
{
    let mut result = FutureSlopeChange::default();
    let body = &character.body;
    let up = body.grounding_up;
    let max_slope_dot = character.properties.max_grounded_slope_dot();

    let velocity_on_ground = project_on_plane(&body.relative_velocity, &body.ground_hit.normal);
    if velocity_on_ground.norm_squared() <= MIN_MOVE_SQ {
        return result;
    }
    let direction = velocity_on_ground.normalize();
    let mut length = body.relative_velocity.norm() * base.delta_time();
    let start = body.ground_hit.position + up * FUTURE_SLOPE_VERTICAL_OFFSET;
    let filter = |h: &RaycastHit| {
        processor.can_collide_with_hit(ctx, base, &h.hit)
    };

    if length > 0.0 {
        if let Some(obstruction) =
            base.world
                .cast_ray_closest(&start, &direction, length, character.entity, filter)
        {
            if is_grounded_on_slope_normal(max_slope_dot, &obstruction.hit.normal, &up) {
                // Upward slope ahead.
                return result;
            }
            length = obstruction.fraction * length;
        }
    }

    // Probes ahead of a rising ground plane search down to the start's level as well.
    let probe_down = |origin: Vec3| {
        let rise = (origin - start).dot(&up).max(0.0);
        let down_length = FUTURE_SLOPE_VERTICAL_OFFSET + FUTURE_SLOPE_DOWN_DETECTION_DEPTH + rise;
        base.world
            .cast_ray_closest(&origin, &-up, down_length, character.entity, filter)
    };

    let secondary = FUTURE_SLOPE_SECONDARY_NO_GROUNDING_DISTANCE
        .max(handling.character_width_for_step_grounding_check * 0.5);
    let ahead = probe_down(start + direction * length)
        .or_else(|| probe_down(start + direction * (length + secondary)));

    match ahead {
        None => result.is_moving_towards_no_grounding = true,
        Some(ahead) => {
            let normal = ahead.hit.normal;
            if !is_grounded_on_slope_normal(max_slope_dot, &normal, &up) {
                result.is_moving_towards_no_grounding = true;
            } else if handling.has_max_downward_slope_change_angle {
                let ground_normal = body.ground_hit.normal;
                let change_dot = normal.dot(&ground_normal).clamp(-1.0, 1.0);
                let is_downward = normal.dot(&direction) > ground_normal.dot(&direction);
                let limit_dot = handling.max_downward_slope_change_degrees.to_radians().cos();
                result.is_on_max_downward_slope_change = is_downward && change_dot <= limit_dot;
            }
        }
    }
    result
}

/// Physics phase: un-ground the character ahead of an edge or a sharp downward
/// slope change so it does not snap down over it.
pub fn update_prevent_grounding_from_future_slope_change<P, W>(
    processor: &P,
    ctx: &P::Context,
    base: &UpdateContext<'_, W>,
    character: &mut KinematicCharacter,
    handling: &StepAndSlopeHandling,
) where
    P: CharacterProcessor<W>,
    W: CollisionWorld,
{
    if !character.body.is_grounded
        || !(handling.prevent_grounding_when_moving_towards_no_grounding
            || handling.has_max_downward_slope_change_angle)
    {
        return;
    }

    let change = detect_future_slope_change(processor, ctx, base, character, handling);
    if (handling.prevent_grounding_when_moving_towards_no_grounding
        && change.is_moving_towards_no_grounding)
        || (handling.has_max_downward_slope_change_angle && change.is_on_max_downward_slope_change)
    {
        log::trace!(
            "character {:?} ungrounded ahead of slope change: {change:?}",
            character.entity
        );
        character.body.is_grounded = false;
    }
}
