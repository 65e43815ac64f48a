/*!
Movement and decollision solver.

Moves the character by `relative_velocity * dt` with a sweep-and-slide loop:
- Shape-cast the character along the remaining movement, lengthened by the
  collision offset, and keep the closest hit that faces the movement and that
  the processor can collide with.
- Hand the hit to the processor's `on_movement_hit`, which either steps up or
  stops at the hit, projects the velocity and redirects the remaining movement.
- Iterate until the remaining movement is negligible or the iteration cap is
  reached. The cap is soft: the leftover is discarded or applied unobstructed
  according to `CharacterProperties`, and the outcome is reported.

After the sweep, overlaps left by moving bodies or numerical drift are
resolved by pushing the character out of the deepest penetration.
*/

use crate::body::KinematicCharacter;
use crate::collision::query::CollisionWorld;
use crate::collision::types::{BasicHit, ColliderCastHit, DeferredImpulse, PhysicsMass, Vec3};
use crate::hits::CharacterHit;
use crate::processor::{CharacterProcessor, GroundingEvaluation, UpdateContext};
use crate::projection::{VelocityProjectionHit, project_on_plane, project_pending_velocity};
use crate::settings::{
    COLLISION_OFFSET, DIST_EPS, ITERATION_CAP_REPORT_LENGTH, MIN_UP_DECOLLISION_ALIGNMENT,
};

/// How the movement sweep of the last update ended.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum MovementTermination {
    #[default]
    Completed,
    /// The sweep ran out of iterations with `remaining_length` still to move.
    IterationCap {
        remaining_length: f32,
        discarded: bool,
        velocity_killed: bool,
    },
}

/// Per-update report of the movement phase.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MovementOutcome {
    pub iterations: u32,
    pub decollision_iterations: u32,
    pub termination: MovementTermination,
}

#[inline]
fn direction_or_zero(v: &Vec3) -> Vec3 {
    v.try_normalize(1.0e-6).unwrap_or_else(Vec3::zeros)
}

/// Physics phase: sweep the character along its velocity, then decollide.
pub fn update_movement_and_decollisions<P, W>(
    processor: &P,
    ctx: &P::Context,
    base: &UpdateContext<'_, W>,
    character: &mut KinematicCharacter,
) where
    P: CharacterProcessor<W>,
    W: CollisionWorld,
{
    let original_velocity_direction = direction_or_zero(&character.body.relative_velocity);

    character.velocity_projection_hits.clear();
    if character.body.is_grounded {
        let ground = character.body.ground_hit;
        character
            .velocity_projection_hits
            .push(VelocityProjectionHit::new(&ground, true));
    }

    if character.properties.project_velocity_on_initial_overlaps {
        project_velocity_on_initial_overlaps(
            processor,
            ctx,
            base,
            character,
            original_velocity_direction,
        );
    }

    let movement = character.body.relative_velocity * base.delta_time();
    let (iterations, termination) =
        move_with_collisions(processor, ctx, base, character, movement, original_velocity_direction);

    let decollision_iterations = if character.properties.decollide_from_overlaps {
        solve_overlaps(processor, ctx, base, character, original_velocity_direction)
    } else {
        0
    };

    character.movement_outcome = MovementOutcome {
        iterations,
        decollision_iterations,
        termination,
    };
}

/// Project velocity on surfaces already touching the character before it moves.
pub fn project_velocity_on_initial_overlaps<P, W>(
    processor: &P,
    ctx: &P::Context,
    base: &UpdateContext<'_, W>,
    character: &mut KinematicCharacter,
    original_velocity_direction: Vec3,
) where
    P: CharacterProcessor<W>,
    W: CollisionWorld,
{
    let pose = character
        .shape()
        .pose(&character.body.position, &character.body.rotation);
    let overlaps = base
        .world
        .overlap(character.shape(), &pose, COLLISION_OFFSET, character.entity);

    for overlap in overlaps {
        let velocity = character.body.relative_velocity;
        if velocity.dot(&overlap.hit.normal) >= 0.0
            || !processor.can_collide_with_hit(ctx, base, &overlap.hit)
        {
            continue;
        }
        let grounded = processor.is_grounded_on_hit(
            ctx,
            base,
            character,
            &overlap.hit,
            GroundingEvaluation::InitialOverlaps,
        );
        character
            .velocity_projection_hits
            .push(VelocityProjectionHit::new(&overlap.hit, grounded));
        project_pending_velocity(processor, ctx, base, character, original_velocity_direction);
    }
}

/// Sweep-and-slide loop. Returns the iterations used and how the sweep ended.
pub fn move_with_collisions<P, W>(
    processor: &P,
    ctx: &P::Context,
    base: &UpdateContext<'_, W>,
    character: &mut KinematicCharacter,
    movement: Vec3,
    original_velocity_direction: Vec3,
) -> (u32, MovementTermination)
where
    P: CharacterProcessor<W>,
    W: CollisionWorld,
{
    let mut remaining_direction = direction_or_zero(&movement);
    let mut remaining_length = movement.norm();
    let max_iterations = character.properties.max_continuous_collisions_iterations;
    let mut iterations = 0;

    while iterations < max_iterations && remaining_length > DIST_EPS {
        iterations += 1;

        if !character.properties.detect_movement_collisions {
            character.body.position += remaining_direction * remaining_length;
            remaining_length = 0.0;
            break;
        }

        let cast_length = remaining_length + COLLISION_OFFSET;
        let pose = character
            .shape()
            .pose(&character.body.position, &character.body.rotation);
        let direction = remaining_direction;
        let closest = base.world.cast_shape_closest(
            character.shape(),
            &pose,
            &(direction * cast_length),
            character.entity,
            |h| h.hit.normal.dot(&direction) < 0.0 && processor.can_collide_with_hit(ctx, base, &h.hit),
        );

        let Some(cast) = closest else {
            character.body.position += remaining_direction * remaining_length;
            remaining_length = 0.0;
            break;
        };

        let hit_distance = (cast.fraction * cast_length - COLLISION_OFFSET).max(0.0);
        let is_grounded_on_hit = processor.is_grounded_on_hit(
            ctx,
            base,
            character,
            &cast.hit,
            GroundingEvaluation::MovementCollisions,
        );
        let mut hit = CharacterHit::new(
            &cast.hit,
            hit_distance,
            character.body.is_grounded,
            is_grounded_on_hit,
            character.body.relative_velocity,
        );

        processor.on_movement_hit(
            ctx,
            base,
            character,
            &mut hit,
            &mut remaining_direction,
            &mut remaining_length,
            original_velocity_direction,
            hit_distance,
        );

        hit.character_velocity_after_hit = character.body.relative_velocity;
        character.hits.push(hit);
    }

    if remaining_length <= ITERATION_CAP_REPORT_LENGTH {
        return (iterations, MovementTermination::Completed);
    }

    let properties = &character.properties;
    let discarded = properties.discard_movement_when_exceed_max_iterations;
    let velocity_killed = properties.kill_velocity_when_exceed_max_iterations;
    if !discarded {
        character.body.position += remaining_direction * remaining_length;
    }
    if velocity_killed {
        character.body.relative_velocity = Vec3::zeros();
    }
    log::trace!(
        "character {:?} hit the sweep iteration cap ({iterations}) with {remaining_length} m left \
         (discarded: {discarded}, velocity killed: {velocity_killed})",
        character.entity
    );
    (
        iterations,
        MovementTermination::IterationCap {
            remaining_length,
            discarded,
            velocity_killed,
        },
    )
}

/// Standard reaction to a sweep hit.
///
/// Tries to step up non-ground hits while grounded. Otherwise moves the
/// character to the hit, resolves dynamic bodies, projects the velocity on the
/// hit and scales the remaining movement by the speed the projection kept.
#[allow(clippy::too_many_arguments)]
pub fn default_on_movement_hit<P, W>(
    processor: &P,
    ctx: &P::Context,
    base: &UpdateContext<'_, W>,
    character: &mut KinematicCharacter,
    hit: &mut CharacterHit,
    remaining_movement_direction: &mut Vec3,
    remaining_movement_length: &mut f32,
    original_velocity_direction: Vec3,
    hit_distance: f32,
    step_handling: bool,
    max_step_height: f32,
) where
    P: CharacterProcessor<W>,
    W: CollisionWorld,
{
    if step_handling
        && !hit.is_grounded_on_hit
        && character.body.is_grounded
        && check_for_stepping_up_hit(
            processor,
            ctx,
            base,
            character,
            hit,
            remaining_movement_direction,
            remaining_movement_length,
            hit_distance,
            max_step_height,
        )
    {
        return;
    }

    character.body.position += *remaining_movement_direction * hit_distance;
    *remaining_movement_length = (*remaining_movement_length - hit_distance).max(0.0);

    if character.properties.simulate_dynamic_body {
        process_dynamic_hit(processor, ctx, base, character, hit);
    }

    let velocity_before = character.body.relative_velocity;
    character
        .velocity_projection_hits
        .push(VelocityProjectionHit::from(&*hit));
    project_pending_velocity(processor, ctx, base, character, original_velocity_direction);
    let velocity_after = character.body.relative_velocity;

    let speed_before = velocity_before.norm();
    if speed_before > DIST_EPS {
        *remaining_movement_length *= velocity_after.norm() / speed_before;
    } else {
        *remaining_movement_length = 0.0;
    }
    *remaining_movement_direction = direction_or_zero(&velocity_after);
    if remaining_movement_direction.norm_squared() == 0.0 {
        *remaining_movement_length = 0.0;
    }
}

/// Step-up attempt: cast up by the step height, forward along the movement and
/// back down. Succeeds when the landing is ground within `max_step_height`;
/// the character is then placed on the step and keeps moving.
#[allow(clippy::too_many_arguments)]
pub fn check_for_stepping_up_hit<P, W>(
    processor: &P,
    ctx: &P::Context,
    base: &UpdateContext<'_, W>,
    character: &mut KinematicCharacter,
    hit: &CharacterHit,
    remaining_movement_direction: &mut Vec3,
    remaining_movement_length: &mut f32,
    hit_distance: f32,
    max_step_height: f32,
) -> bool
where
    P: CharacterProcessor<W>,
    W: CollisionWorld,
{
    if max_step_height <= 0.0 {
        return false;
    }
    let body = &character.body;
    let up = body.grounding_up;

    let hit_height = (hit.position - body.position).dot(&up);
    if !(0.0..=max_step_height + COLLISION_OFFSET).contains(&hit_height) {
        return false;
    }
    let Some(forward) = project_on_plane(remaining_movement_direction, &up).try_normalize(1.0e-6)
    else {
        return false;
    };

    let shape = *character.shape();
    let rotation = body.rotation;
    let entity = character.entity;
    let can_collide = |h: &ColliderCastHit| processor.can_collide_with_hit(ctx, base, &h.hit);

    // Up
    let up_length = max_step_height + COLLISION_OFFSET;
    let up_distance = base
        .world
        .cast_shape_closest(
            &shape,
            &shape.pose(&body.position, &rotation),
            &(up * up_length),
            entity,
            |h| h.hit.normal.dot(&up) < 0.0 && can_collide(h),
        )
        .map_or(max_step_height, |h| {
            (h.fraction * up_length - COLLISION_OFFSET).max(0.0)
        });
    if up_distance <= DIST_EPS {
        return false;
    }
    let raised = body.position + up * up_distance;

    // Forward
    let forward_length = *remaining_movement_length * remaining_movement_direction.dot(&forward);
    let forward_cast_length = forward_length + COLLISION_OFFSET;
    let forward_distance = base
        .world
        .cast_shape_closest(
            &shape,
            &shape.pose(&raised, &rotation),
            &(forward * forward_cast_length),
            entity,
            |h| h.hit.normal.dot(&forward) < 0.0 && can_collide(h),
        )
        .map_or(forward_length, |h| {
            (h.fraction * forward_cast_length - COLLISION_OFFSET).max(0.0)
        });
    if forward_distance <= hit_distance + DIST_EPS {
        return false;
    }
    let advanced = raised + forward * forward_distance;

    // Down
    let down_length = up_distance + COLLISION_OFFSET;
    let Some(landing) = base.world.cast_shape_closest(
        &shape,
        &shape.pose(&advanced, &rotation),
        &(-up * down_length),
        entity,
        |h| h.hit.normal.dot(&up) > 0.0 && can_collide(h),
    ) else {
        return false;
    };
    let down_distance = landing.fraction * down_length - COLLISION_OFFSET;
    let step_height = up_distance - down_distance;
    if step_height > max_step_height {
        return false;
    }
    if !processor.is_grounded_on_hit(
        ctx,
        base,
        character,
        &landing.hit,
        GroundingEvaluation::StepUp,
    ) {
        return false;
    }

    let body = &mut character.body;
    body.position = advanced - up * down_distance;
    body.is_grounded = true;
    body.ground_hit = landing.hit;
    *remaining_movement_length = (*remaining_movement_length - forward_distance).max(0.0);
    log::trace!(
        "character {entity:?} stepped up {step_height} m onto {:?}",
        landing.hit.entity
    );
    true
}

/// Offset that clears a penetration of `depth` along `normal`.
///
/// Ground overlaps move along `up` so the character keeps its footing, unless
/// the surface is too steep for that to stay bounded.
fn decollision_offset(normal: &Vec3, up: &Vec3, depth: f32, grounded: bool) -> Vec3 {
    match normal.dot(up) {
        along_up if grounded && along_up >= MIN_UP_DECOLLISION_ALIGNMENT => up * (depth / along_up),
        _ => normal * depth,
    }
}

/// Push the character out of overlapping colliders, deepest first.
///
/// Ground overlaps are resolved along the grounding up so the character does
/// not slide down slopes; other overlaps along their normal. Velocity is
/// projected on every resolved overlap. Returns the passes that moved the
/// character.
pub fn solve_overlaps<P, W>(
    processor: &P,
    ctx: &P::Context,
    base: &UpdateContext<'_, W>,
    character: &mut KinematicCharacter,
    original_velocity_direction: Vec3,
) -> u32
where
    P: CharacterProcessor<W>,
    W: CollisionWorld,
{
    let mut iterations = 0;
    for _ in 0..character.properties.max_overlap_decollision_iterations {
        let pose = character
            .shape()
            .pose(&character.body.position, &character.body.rotation);
        let deepest = base
            .world
            .overlap(character.shape(), &pose, 0.0, character.entity)
            .into_iter()
            .find(|h| h.distance < -DIST_EPS && processor.can_collide_with_hit(ctx, base, &h.hit));
        let Some(overlap) = deepest else {
            break;
        };
        iterations += 1;

        let grounded = processor.is_grounded_on_hit(
            ctx,
            base,
            character,
            &overlap.hit,
            GroundingEvaluation::OverlapDecollision,
        );
        let up = character.body.grounding_up;
        let depth = -overlap.distance + COLLISION_OFFSET;
        let decollision = decollision_offset(&overlap.hit.normal, &up, depth, grounded);
        character.body.position += decollision;
        log::trace!(
            "character {:?} decollided {depth} m from {:?}",
            character.entity,
            overlap.hit.entity
        );

        let velocity = character.body.relative_velocity;
        character.hits.push(CharacterHit::new(
            &overlap.hit,
            overlap.distance,
            character.body.is_grounded,
            grounded,
            velocity,
        ));
        character
            .velocity_projection_hits
            .push(VelocityProjectionHit::new(&overlap.hit, grounded));
        project_pending_velocity(processor, ctx, base, character, original_velocity_direction);
        if let Some(last) = character.hits.last_mut() {
            last.character_velocity_after_hit = character.body.relative_velocity;
        }
    }
    iterations
}

/// Whether moving by `movement` would first hit a surface the character
/// cannot stand on. Returns that hit.
pub fn movement_would_hit_non_grounded_obstruction<P, W>(
    processor: &P,
    ctx: &P::Context,
    base: &UpdateContext<'_, W>,
    character: &KinematicCharacter,
    movement: Vec3,
) -> Option<ColliderCastHit>
where
    P: CharacterProcessor<W>,
    W: CollisionWorld,
{
    let direction = movement.try_normalize(1.0e-6)?;
    let pose = character
        .shape()
        .pose(&character.body.position, &character.body.rotation);
    let hit = base.world.cast_shape_closest(
        character.shape(),
        &pose,
        &(direction * (movement.norm() + COLLISION_OFFSET)),
        character.entity,
        |h| h.hit.normal.dot(&direction) < 0.0 && processor.can_collide_with_hit(ctx, base, &h.hit),
    )?;
    let grounded = processor.is_grounded_on_hit(
        ctx,
        base,
        character,
        &hit.hit,
        GroundingEvaluation::MovementCollisions,
    );
    (!grounded).then_some(hit)
}

fn resolved_masses<P, W>(
    processor: &P,
    ctx: &P::Context,
    base: &UpdateContext<'_, W>,
    character: &KinematicCharacter,
    other_mass: f32,
    hit: &BasicHit,
) -> (PhysicsMass, PhysicsMass)
where
    P: CharacterProcessor<W>,
    W: CollisionWorld,
{
    let mut character_mass = PhysicsMass::from_mass(character.properties.mass);
    let mut other = PhysicsMass::from_mass(other_mass);
    processor.override_dynamic_hit_masses(ctx, base, &mut character_mass, &mut other, hit);
    (character_mass, other)
}

/// Inelastic response against a dynamic body: both bodies end with the same
/// velocity along the hit normal. The body's share is deferred as an impulse.
pub fn process_dynamic_hit<P, W>(
    processor: &P,
    ctx: &P::Context,
    base: &UpdateContext<'_, W>,
    character: &mut KinematicCharacter,
    hit: &CharacterHit,
) where
    P: CharacterProcessor<W>,
    W: CollisionWorld,
{
    let Some(other_mass) = base.world.dynamic_mass(hit.entity) else {
        return;
    };
    let basic = hit.basic();
    let (character_mass, other) =
        resolved_masses(processor, ctx, base, character, other_mass, &basic);
    let total_inverse_mass = character_mass.inverse_mass + other.inverse_mass;
    if total_inverse_mass <= 0.0 {
        return;
    }

    let normal = hit.normal;
    let relative = character.body.world_velocity() - base.world.linear_velocity(hit.entity);
    let approach = relative.dot(&normal);
    if approach >= 0.0 {
        return;
    }

    let impulse = -approach / total_inverse_mass;
    character.body.relative_velocity += normal * (impulse * character_mass.inverse_mass);
    character.deferred_impulses.push(DeferredImpulse {
        entity: hit.entity,
        linear_impulse: -normal * impulse,
        point: hit.position,
    });
}

/// Physics phase: a grounded character pushes a dynamic ground body with its weight.
pub fn update_ground_pushing<P, W>(
    processor: &P,
    ctx: &P::Context,
    base: &UpdateContext<'_, W>,
    character: &mut KinematicCharacter,
    gravity: Vec3,
) where
    P: CharacterProcessor<W>,
    W: CollisionWorld,
{
    if !character.body.is_grounded || !character.properties.simulate_dynamic_body {
        return;
    }
    let ground = character.body.ground_hit;
    let Some(other_mass) = base.world.dynamic_mass(ground.entity) else {
        return;
    };
    let (character_mass, _) = resolved_masses(processor, ctx, base, character, other_mass, &ground);
    if character_mass.inverse_mass <= 0.0 {
        return;
    }

    let mass = 1.0 / character_mass.inverse_mass;
    character.deferred_impulses.push(DeferredImpulse {
        entity: ground.entity,
        linear_impulse: gravity * mass * base.delta_time(),
        point: ground.position,
    });
}
