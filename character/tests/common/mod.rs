//! Shared world and character builders for the scenario tests.

#![allow(dead_code)]

use character::collision::cuboid_from_pose;
use character::settings::COLLISION_OFFSET;
use character::{
    CharacterProperties, Entity, FirstPersonCharacter, FirstPersonCharacterComponent,
    FirstPersonUpdateContext, Quat, RapierQueryWorld, TimeData, Transform, UpdateContext, Vec3,
    WorldBodyDef, physics_update,
};

pub const DT: f32 = 0.02;
pub const FLOOR: Entity = Entity(100);
pub const PLAYER: Entity = Entity(1);

/// A 100 x 100 m static slab whose top face is at y = 0.
pub fn floor() -> WorldBodyDef {
    cuboid_from_pose(
        FLOOR,
        Vec3::new(50.0, 0.5, 50.0),
        Vec3::new(0.0, -0.5, 0.0),
        Quat::identity(),
    )
}

pub fn world(defs: Vec<WorldBodyDef>) -> RapierQueryWorld {
    RapierQueryWorld::build(defs).expect("valid test world")
}

/// Component tuned for snappy, deterministic ground movement.
pub fn component() -> FirstPersonCharacterComponent {
    FirstPersonCharacterComponent {
        ground_max_speed: 5.0,
        grounded_movement_sharpness: 50.0,
        ..FirstPersonCharacterComponent::default()
    }
}

/// Spawn with the feet one collision offset above `feet`, facing -Z.
pub fn spawn_at(feet: Vec3, component: FirstPersonCharacterComponent) -> FirstPersonCharacter {
    spawn_with(PLAYER, feet, CharacterProperties::default(), component)
}

pub fn spawn_with(
    entity: Entity,
    feet: Vec3,
    properties: CharacterProperties,
    component: FirstPersonCharacterComponent,
) -> FirstPersonCharacter {
    let position = feet + Vec3::y() * COLLISION_OFFSET;
    FirstPersonCharacter::new(
        entity,
        properties,
        component,
        Transform::from_translation(position),
    )
    .expect("valid test character")
}

pub fn base(world: &RapierQueryWorld, tick: u32) -> UpdateContext<'_, RapierQueryWorld> {
    UpdateContext::new(world, TimeData::new(DT, f64::from(tick) * f64::from(DT)))
}

pub fn run_ticks(
    world: &RapierQueryWorld,
    fp: &mut FirstPersonCharacter,
    ctx: &FirstPersonUpdateContext,
    ticks: u32,
) {
    for tick in 0..ticks {
        physics_update(fp, ctx, &base(world, tick));
    }
}

pub fn horizontal(v: &Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}
