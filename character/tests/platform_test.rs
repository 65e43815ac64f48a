//! Moving and rotating platforms.

mod common;

use character::collision::cuboid_from_pose;
use character::collision::types::BodyKind;
use character::{
    CharacterProperties, Entity, FirstPersonCharacter, FirstPersonUpdateContext, Quat,
    RapierQueryWorld, Transform, Vec3, physics_update, variable_update,
};
use common::{DT, PLAYER, base, component, spawn_at, spawn_with, world};

const PLATFORM: Entity = Entity(400);
const PLATFORM_CENTER_Y: f32 = -0.25;
const BEAM: Entity = Entity(410);
const BEAM_FACE_X: f32 = 1.0;

fn platform_world() -> RapierQueryWorld {
    let platform = cuboid_from_pose(
        PLATFORM,
        Vec3::new(3.0, 0.25, 3.0),
        Vec3::new(0.0, PLATFORM_CENTER_Y, 0.0),
        Quat::identity(),
    )
    .with_kind(BodyKind::Kinematic);
    world(vec![platform])
}

/// A character standing on a translating platform follows it and keeps its
/// momentum when jumping off.
#[test]
fn test_follows_translating_platform_and_keeps_momentum() {
    let mut world = platform_world();
    let ctx = FirstPersonUpdateContext::new();
    let mut fp = spawn_at(Vec3::zeros(), component());
    let speed = 1.0;

    let mut offset = 0.0;
    let mut tick = 0;
    while tick < 50 {
        world.begin_step();
        offset += speed * DT;
        world.set_body_pose(
            PLATFORM,
            Transform::from_translation(Vec3::new(offset, PLATFORM_CENTER_Y, 0.0)),
        );
        physics_update(&mut fp, &ctx, &base(&world, tick));
        tick += 1;
    }

    let body = &fp.character.body;
    assert!(body.is_grounded);
    assert_eq!(body.parent_entity, PLATFORM);
    assert!((body.position.x - offset).abs() < 0.06, "lag {}", offset - body.position.x);
    assert!((body.world_velocity().x - speed).abs() < 0.02);
    assert!(body.relative_velocity.norm() < 0.02);

    fp.control.jump = true;
    world.begin_step();
    offset += speed * DT;
    world.set_body_pose(
        PLATFORM,
        Transform::from_translation(Vec3::new(offset, PLATFORM_CENTER_Y, 0.0)),
    );
    physics_update(&mut fp, &ctx, &base(&world, tick));

    let body = &fp.character.body;
    assert!(!body.is_grounded);
    assert!(body.parent_entity.is_null());
    assert_eq!(body.parent_velocity, Vec3::zeros());
    assert!((body.relative_velocity.x - speed).abs() < 0.02);
}

/// The platform's yaw is carried into the character's yaw by the variable update.
#[test]
fn test_rotating_platform_turns_character() {
    let mut world = platform_world();
    let ctx = FirstPersonUpdateContext::new();
    let mut fp = spawn_at(Vec3::zeros(), component());
    let step_degrees: f32 = 1.8;

    let mut angle: f32 = 0.0;
    for tick in 0..50 {
        world.begin_step();
        angle += step_degrees;
        world.set_body_pose(
            PLATFORM,
            Transform::new(
                Vec3::new(0.0, PLATFORM_CENTER_Y, 0.0),
                Quat::from_axis_angle(&Vec3::y_axis(), angle.to_radians()),
            ),
        );
        physics_update(&mut fp, &ctx, &base(&world, tick));
        variable_update(&mut fp, &ctx, &base(&world, tick));
    }

    assert_eq!(fp.character.body.parent_entity, PLATFORM);
    // Counter-clockwise platform rotation is a turn to the left (negative yaw).
    let yaw = fp.component.character_y_degrees;
    assert!(yaw < -85.0 && yaw > -91.0, "yaw {yaw}");
    assert!(fp.character.body.position.xz().norm() < 0.05);
}

/// Carries a character on a platform moving +X under a beam hanging 0.1 m above
/// the platform. Returns the character and whether any tick had to decollide it.
fn carry_under_beam(detect_obstructions: bool) -> (FirstPersonCharacter, bool) {
    let beam = cuboid_from_pose(
        BEAM,
        Vec3::new(0.5, 1.0, 5.0),
        Vec3::new(BEAM_FACE_X + 0.5, 1.1, 0.0),
        Quat::identity(),
    );
    let platform = cuboid_from_pose(
        PLATFORM,
        Vec3::new(3.0, 0.25, 3.0),
        Vec3::new(0.0, PLATFORM_CENTER_Y, 0.0),
        Quat::identity(),
    )
    .with_kind(BodyKind::Kinematic);
    let mut world = world(vec![platform, beam]);
    let ctx = FirstPersonUpdateContext::new();
    let properties = CharacterProperties {
        detect_obstructions_for_parent_body_movement: detect_obstructions,
        ..CharacterProperties::default()
    };
    let mut fp = spawn_with(PLAYER, Vec3::zeros(), properties, component());

    let mut decollided = false;
    let mut offset = 0.0;
    for tick in 0..100 {
        world.begin_step();
        offset += DT;
        world.set_body_pose(
            PLATFORM,
            Transform::from_translation(Vec3::new(offset, PLATFORM_CENTER_Y, 0.0)),
        );
        physics_update(&mut fp, &ctx, &base(&world, tick));
        decollided |= fp.character.movement_outcome.decollision_iterations > 0;
    }
    (fp, decollided)
}

/// With obstruction detection the platform carries the character up to the
/// beam and never into it; without it the character is pushed in and decollided.
#[test]
fn test_parent_movement_stops_at_obstruction() {
    let (fp, decollided) = carry_under_beam(true);
    let radius = fp.character.shape().radius;
    let x = fp.character.body.position.x;
    assert!(!decollided);
    assert!(x <= BEAM_FACE_X - radius + 1.0e-3, "x = {x}");
    assert!(x > BEAM_FACE_X - radius - 0.03, "x = {x}");
    assert_eq!(fp.character.body.parent_entity, PLATFORM);

    let (fp, decollided) = carry_under_beam(false);
    assert!(decollided);
    assert!(fp.character.body.position.x < BEAM_FACE_X - radius + 1.0e-3);
}
