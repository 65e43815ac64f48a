//! Parent (moving platform) tracking.
//!
//! A grounded character standing on a body with a tracked transform becomes
//! attached to it. On the next update the character first follows the parent's
//! motion between the previous and the current fixed step, then moves with its
//! own relative velocity. Momentum is carried over when the parent changes.

use crate::body::{CharacterBody, KinematicCharacter};
use crate::collision::query::CollisionWorld;
use crate::collision::types::{Entity, Quat, TrackedTransform, Vec3};
use crate::processor::{CharacterProcessor, UpdateContext};
use crate::settings::{COLLISION_OFFSET, DIST_EPS};

/// World-space anchor point of the character on its parent.
#[inline]
fn world_anchor(body: &CharacterBody) -> Vec3 {
    body.position + body.rotation * body.parent_local_anchor_point
}

/// Keep only the part of `rotation` that turns around `axis`.
pub fn rotation_around_axis(rotation: &Quat, axis: &Vec3) -> Quat {
    let q = rotation.quaternion();
    let projected = axis * q.imag().dot(axis);
    let twist = nalgebra::Quaternion::new(q.w, projected.x, projected.y, projected.z);
    nalgebra::UnitQuaternion::try_new(twist, 1.0e-6).unwrap_or_else(Quat::identity)
}

/// Physics phase: move the character with its parent body.
///
/// Computes `rotation_from_parent` (restricted to the grounding up when the
/// character was grounded) and `parent_velocity`. The character rotation
/// itself is left to the variable-rate update. With obstruction detection on,
/// the parent motion is swept and stops at the first obstruction.
pub fn update_parent_movement<P, W>(
    processor: &P,
    ctx: &P::Context,
    base: &UpdateContext<'_, W>,
    character: &mut KinematicCharacter,
    was_grounded_before: bool,
) where
    P: CharacterProcessor<W>,
    W: CollisionWorld,
{
    let parent = character.body.parent_entity;
    if parent.is_null() {
        return;
    }
    let Some(tracked) = base.world.tracked_transform(parent) else {
        log::debug!(
            "character {:?} lost parent {parent:?}: no tracked transform",
            character.entity
        );
        let body = &mut character.body;
        body.parent_entity = Entity::NULL;
        body.parent_velocity = Vec3::zeros();
        return;
    };

    let dt = base.delta_time();
    let body = &character.body;
    let anchor = world_anchor(body);
    let local_position = tracked.previous.inverse_transform_point(&body.position);
    let target_position = tracked.current.transform_point(&local_position);
    let parent_velocity = tracked.point_velocity(&anchor, dt);

    let mut rotation_from_parent = tracked.rotation_delta();
    if was_grounded_before {
        rotation_from_parent = rotation_around_axis(&rotation_from_parent, &body.grounding_up);
    }

    let displacement = target_position - body.position;
    let mut allowed = displacement;
    if character.properties.detect_obstructions_for_parent_body_movement {
        if let Some(direction) = displacement.try_normalize(1.0e-6) {
            let length = displacement.norm();
            let cast_length = length + COLLISION_OFFSET;
            let pose = character.shape().pose(&body.position, &body.rotation);
            let obstruction = base.world.cast_shape_closest(
                character.shape(),
                &pose,
                &(direction * cast_length),
                character.entity,
                |h| {
                    h.hit.entity != parent
                        && h.hit.normal.dot(&direction) < 0.0
                        && processor.can_collide_with_hit(ctx, base, &h.hit)
                },
            );
            if let Some(hit) = obstruction {
                let distance = (hit.fraction * cast_length - COLLISION_OFFSET).clamp(0.0, length);
                allowed = direction * distance;
            }
        }
    }

    let body = &mut character.body;
    body.position += allowed;
    body.parent_velocity = parent_velocity;
    if character.properties.synchronize_rotation_with_parent {
        body.rotation_from_parent = rotation_from_parent;
    }
}

/// Physics phase: attach to the ground body when it moves, detach otherwise.
pub fn update_moving_platform_detection<W: CollisionWorld>(
    base: &UpdateContext<'_, W>,
    character: &mut KinematicCharacter,
) {
    let body = &character.body;
    let ground = body.ground_hit.entity;
    let attach = body.is_grounded
        && !ground.is_null()
        && base.world.tracked_transform(ground).is_some();

    if attach {
        let anchor = body.ground_hit.position;
        set_or_update_parent_body(&mut character.body, ground, anchor);
    } else {
        set_or_update_parent_body(&mut character.body, Entity::NULL, Vec3::zeros());
    }
}

/// Attach `body` to `parent` at the world-space `anchor_point`.
pub fn set_or_update_parent_body(body: &mut CharacterBody, parent: Entity, anchor_point: Vec3) {
    if parent != body.parent_entity {
        log::debug!(
            "character parent changed: {:?} -> {parent:?}",
            body.parent_entity
        );
    }
    body.parent_entity = parent;
    body.parent_local_anchor_point = if parent.is_null() {
        Vec3::zeros()
    } else {
        body.rotation.inverse() * (anchor_point - body.position)
    };
}

/// Physics phase: convert velocity between parent frames when the parent changed.
///
/// Leaving a parent adds its velocity to the relative velocity; joining one
/// removes the new parent's velocity at the anchor point, so the world
/// velocity is continuous.
pub fn update_parent_momentum<W: CollisionWorld>(
    base: &UpdateContext<'_, W>,
    character: &mut KinematicCharacter,
) {
    let body = &mut character.body;
    if body.parent_entity == body.previous_parent_entity {
        return;
    }

    body.relative_velocity += body.parent_velocity;
    body.parent_velocity = Vec3::zeros();

    if body.parent_entity.is_null() {
        return;
    }
    let tracked: Option<TrackedTransform> = base.world.tracked_transform(body.parent_entity);
    if let Some(tracked) = tracked {
        let velocity = tracked.point_velocity(&world_anchor(body), base.delta_time());
        if velocity.norm_squared() > DIST_EPS * DIST_EPS {
            body.parent_velocity = velocity;
            body.relative_velocity -= velocity;
        }
    }
}

/// Blend a fixed-rate rotation into a variable-rate rotation by the ratio of
/// their time steps.
pub fn add_variable_rate_rotation_from_fixed_rate_rotation(
    rotation: &mut Quat,
    fixed_rate_rotation: &Quat,
    variable_delta_time: f32,
    fixed_delta_time: f32,
) -> Quat {
    if fixed_delta_time <= 0.0 {
        return Quat::identity();
    }
    let ratio = (variable_delta_time / fixed_delta_time).clamp(0.0, 1.0);
    let blended = Quat::from_scaled_axis(fixed_rate_rotation.scaled_axis() * ratio);
    *rotation = blended * *rotation;
    blended
}
