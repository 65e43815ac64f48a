//! Character hits and their per-entity Enter/Stay/Exit history.

use crate::body::KinematicCharacter;
use crate::collision::material::HitMaterial;
use crate::collision::types::{BasicHit, Entity, Vec3};

/// A hit detected during a character update.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CharacterHit {
    pub entity: Entity,
    pub position: Vec3,
    pub normal: Vec3,
    pub material: HitMaterial,
    /// Distance travelled along the query before the hit (meters).
    pub distance: f32,
    pub was_character_grounded_on_hit_enter: bool,
    pub is_grounded_on_hit: bool,
    pub character_velocity_before_hit: Vec3,
    pub character_velocity_after_hit: Vec3,
}

impl CharacterHit {
    pub fn new(
        hit: &BasicHit,
        distance: f32,
        was_grounded: bool,
        is_grounded_on_hit: bool,
        velocity: Vec3,
    ) -> Self {
        Self {
            entity: hit.entity,
            position: hit.position,
            normal: hit.normal,
            material: hit.material,
            distance,
            was_character_grounded_on_hit_enter: was_grounded,
            is_grounded_on_hit,
            character_velocity_before_hit: velocity,
            character_velocity_after_hit: velocity,
        }
    }

    #[inline]
    pub fn basic(&self) -> BasicHit {
        BasicHit {
            entity: self.entity,
            position: self.position,
            normal: self.normal,
            material: self.material,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CharacterHitState {
    Enter,
    Stay,
    Exit,
}

/// Collision event with one entity, derived from consecutive updates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StatefulCharacterHit {
    pub state: CharacterHitState,
    pub hit: CharacterHit,
}

/// Rebuild `stateful` from this update's `hits`.
///
/// Each entity yields one record: `Enter` if it was not touched during the
/// previous update, `Stay` if it was, and `Exit` for entities touched during the
/// previous update but not anymore. The first hit of an entity represents it.
pub fn process_stateful_hits(hits: &[CharacterHit], stateful: &mut Vec<StatefulCharacterHit>) {
    let previous = std::mem::take(stateful);
    let was_touching = |entity: Entity| {
        previous
            .iter()
            .any(|s| s.hit.entity == entity && s.state != CharacterHitState::Exit)
    };

    for hit in hits {
        if stateful.iter().any(|s| s.hit.entity == hit.entity) {
            continue;
        }
        let state = if was_touching(hit.entity) {
            CharacterHitState::Stay
        } else {
            CharacterHitState::Enter
        };
        stateful.push(StatefulCharacterHit { state, hit: *hit });
    }

    for old in previous
        .iter()
        .filter(|s| s.state != CharacterHitState::Exit)
    {
        if !hits.iter().any(|h| h.entity == old.hit.entity) {
            stateful.push(StatefulCharacterHit {
                state: CharacterHitState::Exit,
                hit: old.hit,
            });
        }
    }
}

/// Final phase of the physics update.
pub fn update_process_stateful_hits(character: &mut KinematicCharacter) {
    process_stateful_hits(&character.hits, &mut character.stateful_hits);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit_on(entity: u64) -> CharacterHit {
        CharacterHit {
            entity: Entity(entity),
            ..CharacterHit::default()
        }
    }

    fn states(stateful: &[StatefulCharacterHit]) -> Vec<(u64, CharacterHitState)> {
        stateful.iter().map(|s| (s.hit.entity.0, s.state)).collect()
    }

    #[test]
    fn enter_stay_exit_sequence() {
        let mut stateful = Vec::new();

        process_stateful_hits(&[hit_on(1), hit_on(1), hit_on(2)], &mut stateful);
        assert_eq!(
            states(&stateful),
            vec![(1, CharacterHitState::Enter), (2, CharacterHitState::Enter)]
        );

        process_stateful_hits(&[hit_on(2)], &mut stateful);
        assert_eq!(
            states(&stateful),
            vec![(2, CharacterHitState::Stay), (1, CharacterHitState::Exit)]
        );

        process_stateful_hits(&[], &mut stateful);
        assert_eq!(states(&stateful), vec![(2, CharacterHitState::Exit)]);

        process_stateful_hits(&[], &mut stateful);
        assert!(stateful.is_empty());
    }

    #[test]
    fn re_entering_after_exit_is_a_new_enter() {
        let mut stateful = Vec::new();
        process_stateful_hits(&[hit_on(4)], &mut stateful);
        process_stateful_hits(&[], &mut stateful);
        process_stateful_hits(&[hit_on(4)], &mut stateful);
        assert_eq!(states(&stateful), vec![(4, CharacterHitState::Enter)]);
    }
}
