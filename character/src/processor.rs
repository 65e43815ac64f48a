//! Callback interface between the generic character update and an archetype.
//!
//! The update phases are free functions generic over a `CharacterProcessor`.
//! Each archetype (e.g. the first-person character) implements the trait once
//! and passes itself by reference into every phase; calls are statically
//! dispatched. The `default_*` functions in the phase modules implement the
//! standard behavior that archetypes usually forward to.

use crate::body::KinematicCharacter;
use crate::collision::query::CollisionWorld;
use crate::collision::types::{BasicHit, PhysicsMass, Vec3};
use crate::hits::CharacterHit;
use crate::projection::VelocityProjectionHit;

/// Fixed-rate or variable-rate timing of the current update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeData {
    pub delta_time: f32,
    pub elapsed_time: f64,
}

impl TimeData {
    #[inline]
    pub fn new(delta_time: f32, elapsed_time: f64) -> Self {
        Self {
            delta_time,
            elapsed_time,
        }
    }
}

/// Shared, read-only inputs of one character update.
pub struct UpdateContext<'w, W: CollisionWorld> {
    pub time: TimeData,
    pub world: &'w W,
}

impl<'w, W: CollisionWorld> UpdateContext<'w, W> {
    #[inline]
    pub fn new(world: &'w W, time: TimeData) -> Self {
        Self { time, world }
    }

    #[inline]
    pub fn delta_time(&self) -> f32 {
        self.time.delta_time
    }
}

impl<W: CollisionWorld> Clone for UpdateContext<'_, W> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<W: CollisionWorld> Copy for UpdateContext<'_, W> {}

/// Why a hit is being classified as ground or not.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroundingEvaluation {
    Default,
    /// Downward ground detection at the start of the update.
    GroundProbing,
    /// Overlap found by decollision after the sweep.
    OverlapDecollision,
    /// Overlap found before the sweep.
    InitialOverlaps,
    /// Hit found by the movement sweep.
    MovementCollisions,
    /// Landing hit of a step-up attempt.
    StepUp,
}

impl GroundingEvaluation {
    /// Evaluations allowed to ground the character on a step edge.
    #[inline]
    pub fn allows_step_grounding(self) -> bool {
        matches!(
            self,
            GroundingEvaluation::GroundProbing
                | GroundingEvaluation::InitialOverlaps
                | GroundingEvaluation::StepUp
        )
    }
}

/// Archetype callbacks invoked by the update phases.
///
/// `Context` carries archetype-specific read-only data (lookups refreshed once
/// per tick). Callbacks receive the character explicitly; none of them may
/// mutate anything but the character they are given.
pub trait CharacterProcessor<W: CollisionWorld> {
    type Context;

    /// Recompute `character.body.grounding_up`. Must leave it unit length.
    fn update_grounding_up(&self, _base: &UpdateContext<'_, W>, character: &mut KinematicCharacter) {
        crate::grounding::default_update_grounding_up(&mut character.body);
    }

    /// Whether `hit` may block the character at all.
    fn can_collide_with_hit(
        &self,
        _ctx: &Self::Context,
        base: &UpdateContext<'_, W>,
        hit: &BasicHit,
    ) -> bool {
        crate::grounding::default_can_collide_with_hit(base.world, hit)
    }

    fn is_grounded_on_hit(
        &self,
        ctx: &Self::Context,
        base: &UpdateContext<'_, W>,
        character: &KinematicCharacter,
        hit: &BasicHit,
        evaluation: GroundingEvaluation,
    ) -> bool;

    /// React to a sweep hit: step up, or stop at the hit and redirect the
    /// remaining movement.
    #[allow(clippy::too_many_arguments)]
    fn on_movement_hit(
        &self,
        ctx: &Self::Context,
        base: &UpdateContext<'_, W>,
        character: &mut KinematicCharacter,
        hit: &mut CharacterHit,
        remaining_movement_direction: &mut Vec3,
        remaining_movement_length: &mut f32,
        original_velocity_direction: Vec3,
        hit_distance: f32,
    );

    /// Adjust the masses used to resolve a hit against a dynamic body.
    fn override_dynamic_hit_masses(
        &self,
        _ctx: &Self::Context,
        _base: &UpdateContext<'_, W>,
        _character_mass: &mut PhysicsMass,
        _other_mass: &mut PhysicsMass,
        _hit: &BasicHit,
    ) {
    }

    #[allow(clippy::too_many_arguments)]
    fn project_velocity_on_hits(
        &self,
        ctx: &Self::Context,
        base: &UpdateContext<'_, W>,
        velocity: &mut Vec3,
        is_grounded: &mut bool,
        ground_hit: &mut BasicHit,
        hits: &[VelocityProjectionHit],
        consumed: usize,
        original_velocity_direction: Vec3,
        grounding_up: Vec3,
    );
}
