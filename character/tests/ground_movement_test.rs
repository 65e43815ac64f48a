//! Grounded locomotion scenarios on a flat floor.

mod common;

use character::{FirstPersonUpdateContext, Vec2, Vec3, physics_update};
use common::{DT, base, component, floor, horizontal, run_ticks, spawn_at, world};

/// Running forward reaches the configured ground speed.
#[test]
fn test_reaches_ground_max_speed() {
    let world = world(vec![floor()]);
    let ctx = FirstPersonUpdateContext::new();
    let mut fp = spawn_at(Vec3::zeros(), component());
    fp.control.move_vector = Vec2::new(0.0, 1.0);

    run_ticks(&world, &mut fp, &ctx, 30);

    let body = &fp.character.body;
    assert!(body.is_grounded);
    let speed = horizontal(&body.relative_velocity).norm();
    assert!((speed - 5.0).abs() <= 0.05, "speed {speed}");
    // Forward is -Z.
    assert!(body.position.z < -2.0);
    assert!(body.position.y.abs() < 0.02, "feet at {}", body.position.y);
    assert!((body.grounding_up.norm() - 1.0).abs() < 1.0e-5);
}

/// Without input the grounded velocity decays to rest.
#[test]
fn test_velocity_converges_to_zero_without_input() {
    let world = world(vec![floor()]);
    let ctx = FirstPersonUpdateContext::new();
    let mut fp = spawn_at(Vec3::zeros(), component());
    fp.character.body.relative_velocity = Vec3::new(3.0, 0.0, 0.0);

    run_ticks(&world, &mut fp, &ctx, 100);

    assert!(fp.character.body.is_grounded);
    assert!(fp.character.body.relative_velocity.norm() < 1.0e-3);
}

/// Jump adds the jump speed once and is consumed by the tick that read it.
#[test]
fn test_jump_is_single_use() {
    let world = world(vec![floor()]);
    let ctx = FirstPersonUpdateContext::new();
    let component = component();
    let jump_speed = component.jump_speed;
    let mut fp = spawn_at(Vec3::zeros(), component);

    run_ticks(&world, &mut fp, &ctx, 2);
    assert!(fp.character.body.is_grounded);

    fp.control.jump = true;
    physics_update(&mut fp, &ctx, &base(&world, 2));
    let up = fp.character.body.grounding_up;
    let vertical = fp.character.body.relative_velocity.dot(&up);
    assert!(vertical >= jump_speed - 1.0e-4, "vertical speed {vertical}");
    assert!(!fp.control.jump);
    assert!(!fp.character.body.is_grounded);
    assert!(fp.character.body.position.y > jump_speed * DT * 0.5);

    physics_update(&mut fp, &ctx, &base(&world, 3));
    let vertical_after = fp.character.body.relative_velocity.dot(&up);
    assert!(vertical_after < vertical, "no second impulse");
    assert!(!fp.character.body.is_grounded);
}

/// A character dropped from above lands and reports it.
#[test]
fn test_falls_and_lands() {
    let world = world(vec![floor()]);
    let ctx = FirstPersonUpdateContext::new();
    let mut fp = spawn_at(Vec3::new(0.0, 1.0, 0.0), component());

    physics_update(&mut fp, &ctx, &base(&world, 0));
    assert!(!fp.character.body.is_grounded);
    assert!(fp.character.body.relative_velocity.y < 0.0);

    let mut landed = false;
    for tick in 1..100 {
        physics_update(&mut fp, &ctx, &base(&world, tick));
        if fp.character.body.is_grounded {
            landed = true;
            break;
        }
    }
    assert!(landed);
    let body = &fp.character.body;
    assert!(body.position.y > -0.02 && body.position.y < 0.05, "feet at {}", body.position.y);
    assert!(body.relative_velocity.y.abs() < 1.0e-3);
}
