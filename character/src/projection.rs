//! Velocity projection on accumulated hit planes.
//!
//! Hits are appended to a [`VelocityProjectionBuffer`] as they are detected
//! during one update. Each projection pass consumes the pending entries in
//! insertion order, exactly once; already consumed entries only serve as the
//! earlier planes of crease (two-plane) and corner (three-plane) constraints.

use crate::body::KinematicCharacter;
use crate::collision::query::CollisionWorld;
use crate::collision::types::{BasicHit, Entity, Vec3};
use crate::hits::CharacterHit;
use crate::processor::{CharacterProcessor, UpdateContext};
use crate::settings::{DIST_EPS, DOT_SIMILARITY_EPS};

/// A plane the character velocity must respect for the rest of the update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VelocityProjectionHit {
    pub entity: Entity,
    pub position: Vec3,
    pub normal: Vec3,
    pub is_grounded_on_hit: bool,
    pub hit: BasicHit,
}

impl VelocityProjectionHit {
    #[inline]
    pub fn new(hit: &BasicHit, is_grounded_on_hit: bool) -> Self {
        Self {
            entity: hit.entity,
            position: hit.position,
            normal: hit.normal,
            is_grounded_on_hit,
            hit: *hit,
        }
    }
}

impl From<&CharacterHit> for VelocityProjectionHit {
    fn from(hit: &CharacterHit) -> Self {
        Self::new(&hit.basic(), hit.is_grounded_on_hit)
    }
}

/// Ordered projection hits plus the cursor of the last consumed entry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VelocityProjectionBuffer {
    hits: Vec<VelocityProjectionHit>,
    consumed: usize,
}

impl VelocityProjectionBuffer {
    #[inline]
    pub fn push(&mut self, hit: VelocityProjectionHit) {
        self.hits.push(hit);
    }

    #[inline]
    pub fn clear(&mut self) {
        self.hits.clear();
        self.consumed = 0;
    }

    #[inline]
    pub fn hits(&self) -> &[VelocityProjectionHit] {
        &self.hits
    }

    /// Index of the first entry not yet consumed by a projection pass.
    #[inline]
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    #[inline]
    pub fn has_pending(&self) -> bool {
        self.consumed < self.hits.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    #[inline]
    fn mark_all_consumed(&mut self) {
        self.consumed = self.hits.len();
    }
}

/// Remove the component of `v` along the unit `normal`.
#[inline]
pub fn project_on_plane(v: &Vec3, normal: &Vec3) -> Vec3 {
    v - normal * v.dot(normal)
}

/// Rotate `v` onto the plane of `plane_normal`, keeping its length and its
/// heading as seen along `direction` (usually the grounding up).
///
/// Vectors parallel to `direction` have no heading and become zero.
pub fn reorient_vector_on_plane_along_direction(
    v: &Vec3,
    plane_normal: &Vec3,
    direction: &Vec3,
) -> Vec3 {
    let length = v.norm();
    if length <= DIST_EPS {
        return Vec3::zeros();
    }
    let axis = v.cross(direction);
    plane_normal
        .cross(&axis)
        .try_normalize(1.0e-6)
        .map_or_else(Vec3::zeros, |dir| dir * length)
}

/// Normal a hit constrains the velocity with, given the current ground state.
///
/// While grounded and constrained to the ground plane, non-ground hits act as
/// walls perpendicular to the ground so they never push the character off it.
#[inline]
fn constraint_normal(
    hit: &VelocityProjectionHit,
    is_grounded: bool,
    ground_normal: &Vec3,
    constrain_to_ground_plane: bool,
) -> Vec3 {
    if hit.is_grounded_on_hit || !(is_grounded && constrain_to_ground_plane) {
        return hit.normal;
    }
    project_on_plane(&hit.normal, ground_normal)
        .try_normalize(1.0e-6)
        .unwrap_or(hit.normal)
}

#[inline]
fn moves_into(v: &Vec3, normal: &Vec3) -> bool {
    v.dot(normal) < -DOT_SIMILARITY_EPS * v.norm()
}

/// Standard projection of `velocity` on `hits[consumed..]`.
///
/// - Grounded and constrained: the velocity is first projected on the ground plane.
/// - A grounded hit reorients the velocity on its plane; when the character was
///   airborne it also lands (vertical velocity removed, ground hit assigned).
/// - Any other hit removes the velocity component moving into it.
/// - If the result moves into an earlier plane, it is constrained to the crease
///   of both planes; moving into a third plane as well stops it entirely.
/// - The result never opposes `original_velocity_direction`.
#[allow(clippy::too_many_arguments)]
pub fn default_project_velocity_on_hits(
    velocity: &mut Vec3,
    is_grounded: &mut bool,
    ground_hit: &mut BasicHit,
    hits: &[VelocityProjectionHit],
    consumed: usize,
    original_velocity_direction: Vec3,
    constrain_to_ground_plane: bool,
    grounding_up: &Vec3,
) {
    if *is_grounded && constrain_to_ground_plane {
        *velocity = project_on_plane(velocity, &ground_hit.normal);
    }

    for i in consumed.min(hits.len())..hits.len() {
        let hit = &hits[i];

        if hit.is_grounded_on_hit {
            if !*is_grounded {
                *velocity = project_on_plane(velocity, grounding_up);
                *is_grounded = true;
            }
            *velocity = reorient_vector_on_plane_along_direction(velocity, &hit.normal, grounding_up);
            *ground_hit = hit.hit;
        } else {
            let normal = constraint_normal(hit, *is_grounded, &ground_hit.normal, constrain_to_ground_plane);
            if moves_into(velocity, &normal) {
                *velocity = project_on_plane(velocity, &normal);
            }
        }

        let normal = constraint_normal(hit, *is_grounded, &ground_hit.normal, constrain_to_ground_plane);
        for (j, earlier) in hits[..i].iter().enumerate() {
            let earlier_normal =
                constraint_normal(earlier, *is_grounded, &ground_hit.normal, constrain_to_ground_plane);
            if !moves_into(velocity, &earlier_normal) {
                continue;
            }

            *velocity = match earlier_normal.cross(&normal).try_normalize(1.0e-6) {
                Some(crease) => crease * velocity.dot(&crease),
                None => project_on_plane(velocity, &earlier_normal),
            };

            let into_third_plane = hits[..i].iter().enumerate().any(|(k, third)| {
                k != j
                    && moves_into(
                        velocity,
                        &constraint_normal(third, *is_grounded, &ground_hit.normal, constrain_to_ground_plane),
                    )
            });
            if into_third_plane {
                *velocity = Vec3::zeros();
            }
            break;
        }
    }

    if velocity.dot(&original_velocity_direction) < -DIST_EPS {
        *velocity = Vec3::zeros();
    }
}

/// Run the processor's projection on the pending entries of the character's
/// projection buffer, then mark them consumed.
pub fn project_pending_velocity<P, W>(
    processor: &P,
    ctx: &P::Context,
    base: &UpdateContext<'_, W>,
    character: &mut KinematicCharacter,
    original_velocity_direction: Vec3,
) where
    P: CharacterProcessor<W>,
    W: CollisionWorld,
{
    if !character.velocity_projection_hits.has_pending() {
        return;
    }
    let body = &mut character.body;
    let buffer = &mut character.velocity_projection_hits;
    processor.project_velocity_on_hits(
        ctx,
        base,
        &mut body.relative_velocity,
        &mut body.is_grounded,
        &mut body.ground_hit,
        buffer.hits(),
        buffer.consumed(),
        original_velocity_direction,
        body.grounding_up,
    );
    buffer.mark_all_consumed();
}
