//! Batch dispatch of first-person character updates.
//!
//! A tick runs in two phases: every physics update completes before any
//! variable update starts. Within a phase characters only mutate themselves
//! and read the shared world and context, so the `par_*` variants may run them
//! on the rayon pool. The world is mutated between ticks only, through
//! [`sync_character_colliders`].

use rayon::prelude::*;

use crate::collision::query::CollisionWorld;
use crate::collision::rapier_world::RapierQueryWorld;
use crate::collision::types::DeferredImpulse;
use crate::first_person::{FirstPersonCharacter, FirstPersonUpdateContext, physics_update, variable_update};
use crate::processor::{TimeData, UpdateContext};

/// Whether a phase runs characters one after another or on the rayon pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Dispatch {
    #[default]
    Sequential,
    Parallel,
}

pub fn physics_update_all<W: CollisionWorld>(
    characters: &mut [FirstPersonCharacter],
    ctx: &FirstPersonUpdateContext,
    base: &UpdateContext<'_, W>,
) {
    for fp in characters.iter_mut() {
        physics_update(fp, ctx, base);
    }
}

pub fn par_physics_update_all<W: CollisionWorld + Sync>(
    characters: &mut [FirstPersonCharacter],
    ctx: &FirstPersonUpdateContext,
    base: &UpdateContext<'_, W>,
) {
    let base = *base;
    characters
        .par_iter_mut()
        .for_each(|fp| physics_update(fp, ctx, &base));
}

pub fn variable_update_all<W: CollisionWorld>(
    characters: &mut [FirstPersonCharacter],
    ctx: &FirstPersonUpdateContext,
    base: &UpdateContext<'_, W>,
) {
    for fp in characters.iter_mut() {
        variable_update(fp, ctx, base);
    }
}

pub fn par_variable_update_all<W: CollisionWorld + Sync>(
    characters: &mut [FirstPersonCharacter],
    ctx: &FirstPersonUpdateContext,
    base: &UpdateContext<'_, W>,
) {
    let base = *base;
    characters.par_iter_mut().for_each(|fp| {
        variable_update(fp, ctx, &base);
    });
}

/// Run the physics phase of every character, then its variable phase.
pub fn tick<W: CollisionWorld + Sync>(
    characters: &mut [FirstPersonCharacter],
    ctx: &FirstPersonUpdateContext,
    world: &W,
    fixed_time: TimeData,
    variable_time: TimeData,
    dispatch: Dispatch,
) {
    let physics = UpdateContext::new(world, fixed_time);
    let variable = UpdateContext::new(world, variable_time);
    match dispatch {
        Dispatch::Sequential => {
            physics_update_all(characters, ctx, &physics);
            variable_update_all(characters, ctx, &variable);
        }
        Dispatch::Parallel => {
            par_physics_update_all(characters, ctx, &physics);
            par_variable_update_all(characters, ctx, &variable);
        }
    }
}

/// Move character colliders to the characters' new poses so other characters
/// see them on the next tick. Characters missing from the world are inserted.
pub fn sync_character_colliders(world: &mut RapierQueryWorld, characters: &[FirstPersonCharacter]) {
    for fp in characters {
        let character = &fp.character;
        let transform = character.body.transform();
        if world.set_body_pose(character.entity, transform) {
            continue;
        }
        if let Err(err) = world.insert_character(character.entity, *character.shape(), transform) {
            log::warn!("failed to register collider of {:?}: {err}", character.entity);
        }
    }
}

/// Take the impulses characters produced this tick, for the external physics step.
pub fn drain_deferred_impulses(characters: &mut [FirstPersonCharacter]) -> Vec<DeferredImpulse> {
    characters
        .iter_mut()
        .flat_map(|fp| fp.character.deferred_impulses.drain(..))
        .collect()
}
