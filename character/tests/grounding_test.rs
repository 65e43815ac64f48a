//! Ground classification: slopes, step edges, ledges, tags and decollision.

mod common;

use character::collision::{cuboid_from_pose, plane_from_pose};
use character::{
    Entity, FirstPersonCharacter, FirstPersonCharacterComponent, FirstPersonUpdateContext,
    HitMaterial, MaterialTag, Quat, RapierQueryWorld, Vec2, Vec3, physics_update,
};
use common::{base, component, floor, run_ticks, spawn_at, world};

const SLOPE: Entity = Entity(500);
const LEDGE: Entity = Entity(600);
const STEP: Entity = Entity(300);

/// Character resting on a plane through the origin tilted `degrees` around Z,
/// its capsule 5 mm above the surface.
fn on_tilted_plane(degrees: f32) -> (RapierQueryWorld, FirstPersonCharacter) {
    let tilt = Quat::from_axis_angle(&Vec3::z_axis(), degrees.to_radians());
    let world = world(vec![plane_from_pose(SLOPE, tilt, Vec3::zeros())]);

    let mut fp = spawn_at(Vec3::zeros(), component());
    let radius = fp.character.shape().radius;
    let center_height = (radius + 0.005) / degrees.to_radians().cos();
    fp.character.body.position = Vec3::new(0.0, center_height - radius, 0.0);
    (world, fp)
}

/// Walkable slopes ground the character; slopes past the limit do not.
#[test]
fn test_slope_limit_decides_grounding() {
    let ctx = FirstPersonUpdateContext::new();

    let (world, mut fp) = on_tilted_plane(30.0);
    physics_update(&mut fp, &ctx, &base(&world, 0));
    let body = &fp.character.body;
    assert!(body.is_grounded);
    assert_eq!(body.ground_hit.entity, SLOPE);
    let expected = Vec3::new(-30.0_f32.to_radians().sin(), 30.0_f32.to_radians().cos(), 0.0);
    assert!((body.ground_hit.normal - expected).norm() < 1.0e-3);

    let (world, mut fp) = on_tilted_plane(70.0);
    physics_update(&mut fp, &ctx, &base(&world, 0));
    assert!(!fp.character.body.is_grounded);
}

/// Returns the x of the feet on the first tick the character is not grounded.
fn first_ungrounded_x(prevent: bool) -> (f32, f32) {
    // Slab whose top is at y = 0, ending at x = 2 with nothing below.
    let ledge = cuboid_from_pose(
        LEDGE,
        Vec3::new(5.0, 0.5, 5.0),
        Vec3::new(-3.0, -0.5, 0.0),
        Quat::identity(),
    );
    let world = world(vec![ledge]);
    let ctx = FirstPersonUpdateContext::new();

    let mut component = component();
    component
        .step_and_slope_handling
        .prevent_grounding_when_moving_towards_no_grounding = prevent;
    let mut fp = spawn_at(Vec3::zeros(), component);
    fp.control.move_vector = Vec2::new(1.0, 0.0);

    for tick in 0..80 {
        physics_update(&mut fp, &ctx, &base(&world, tick));
        let body = &fp.character.body;
        if body.position.x > 1.0 && !body.is_grounded {
            return (body.position.x, body.position.y);
        }
    }
    panic!("character never left the ledge");
}

/// With prevention on, running toward a ledge un-grounds the character at the
/// edge instead of letting it snap around the corner.
#[test]
fn test_ledge_ungrounds_early_only_with_prevention() {
    let (x_prevented, y_prevented) = first_ungrounded_x(true);
    assert!(x_prevented < 2.15, "ungrounded at x = {x_prevented}");
    assert!(y_prevented > -0.05, "already falling: y = {y_prevented}");

    let (x_snapped, _) = first_ungrounded_x(false);
    assert!(
        x_snapped > x_prevented + 0.15,
        "prevented at {x_prevented}, snapped until {x_snapped}"
    );
}

/// A capsule resting on a step edge too steep to stand on by slope is still
/// grounded when step handling confirms both levels.
#[test]
fn test_step_edge_grounds_only_with_step_handling() {
    // 0.45 m high step ending at x = 2, lower floor at y = 0.
    let step = cuboid_from_pose(
        STEP,
        Vec3::new(5.0, 0.225, 5.0),
        Vec3::new(-3.0, 0.225, 0.0),
        Quat::identity(),
    );
    let world = world(vec![floor(), step]);
    let ctx = FirstPersonUpdateContext::new();

    let edge_character = |step_handling: bool| {
        let mut component: FirstPersonCharacterComponent = component();
        component.step_and_slope_handling.step_handling = step_handling;
        component.step_and_slope_handling.max_step_height = 0.5;
        let mut fp = spawn_at(Vec3::zeros(), component);
        // Capsule center 0.45 m past the edge; the edge normal is ~64 degrees from up.
        let radius = fp.character.shape().radius;
        let dx: f32 = 0.45;
        let above_edge = (radius * radius - dx * dx).sqrt() + 0.01;
        fp.character.body.position = Vec3::new(2.0 + dx, 0.45 + above_edge - radius, 0.0);
        fp
    };

    let mut fp = edge_character(true);
    physics_update(&mut fp, &ctx, &base(&world, 0));
    assert!(fp.character.body.is_grounded);
    assert_eq!(fp.character.body.ground_hit.entity, STEP);
    assert!(fp.character.body.ground_hit.normal.y < 0.5);

    let mut fp = edge_character(false);
    physics_update(&mut fp, &ctx, &base(&world, 0));
    assert!(!fp.character.body.is_grounded);
}

/// A floor tagged as not groundable still blocks the character but never grounds it.
#[test]
fn test_not_groundable_floor_never_grounds() {
    let slippery =
        floor().with_material(HitMaterial::default().with_tags(&[MaterialTag::NotGroundable]));
    let world = world(vec![slippery]);
    let ctx = FirstPersonUpdateContext::new();
    let mut fp = spawn_at(Vec3::zeros(), component());

    for tick in 0..30 {
        physics_update(&mut fp, &ctx, &base(&world, tick));
        assert!(!fp.character.body.is_grounded, "grounded on tick {tick}");
    }
    assert!(fp.character.body.position.y > -0.02, "feet at {}", fp.character.body.position.y);
    assert!(fp.character.body.ground_hit.entity.is_null());
}

/// A character spawned sunk into the floor is pushed back on top of it.
#[test]
fn test_sunk_character_is_pushed_out() {
    let world = world(vec![floor()]);
    let ctx = FirstPersonUpdateContext::new();
    let mut fp = spawn_at(Vec3::new(0.0, -0.21, 0.0), component());
    assert!((fp.character.body.position.y + 0.2).abs() < 1.0e-6);

    physics_update(&mut fp, &ctx, &base(&world, 0));
    assert!(fp.character.movement_outcome.decollision_iterations > 0);
    let y = fp.character.body.position.y;
    assert!(y > -1.0e-3 && y < 0.03, "feet at {y}");
    assert!(fp.character.body.position.xz().norm() < 1.0e-3);

    run_ticks(&world, &mut fp, &ctx, 10);
    assert!(fp.character.body.is_grounded);
    assert_eq!(fp.character.movement_outcome.decollision_iterations, 0);
    assert!(fp.character.body.position.y.abs() < 0.02);
}
