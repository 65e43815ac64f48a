pub mod body;
pub mod collision;
pub mod control;
pub mod error;
pub mod first_person;
pub mod grounding;
pub mod hits;
pub mod movement;
pub mod parent;
pub mod processor;
pub mod projection;
pub mod schedule;
pub mod settings;

pub use body::{CharacterBody, CharacterProperties, KinematicCharacter, StepAndSlopeHandling};
pub use collision::{
    BasicHit, CharacterShape, CollisionWorld, ColliderShapeDef, Entity, HitMaterial, MaterialTag,
    Quat, RapierQueryWorld, Transform, Vec2, Vec3, WorldBodyDef,
};
pub use error::ConfigError;
pub use first_person::{
    FirstPersonCharacter, FirstPersonCharacterComponent, FirstPersonCharacterControl,
    FirstPersonProcessor, FirstPersonUpdateContext, WeaponControl, WeaponVisualFeedback,
    physics_update, variable_update,
};
pub use hits::{CharacterHit, CharacterHitState, StatefulCharacterHit};
pub use movement::{MovementOutcome, MovementTermination};
pub use processor::{CharacterProcessor, GroundingEvaluation, TimeData, UpdateContext};
pub use schedule::{Dispatch, sync_character_colliders, tick};
