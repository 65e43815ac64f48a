//! Standard velocity and view control utilities.
//!
//! Small, pure helpers that character archetypes compose to turn control
//! intent into velocity and rotation changes.

use crate::body::CharacterBody;
use crate::collision::types::{BasicHit, Quat, Vec2, Vec3};
use crate::projection::{project_on_plane, reorient_vector_on_plane_along_direction};

/// Frame-rate independent interpolation factor for exponential smoothing.
#[inline]
pub fn sharpness_interpolant(sharpness: f32, delta_time: f32) -> f32 {
    (1.0 - (-sharpness * delta_time).exp()).clamp(0.0, 1.0)
}

#[inline]
pub fn clamp_to_max_length(v: &Vec3, max_length: f32) -> Vec3 {
    let length_sq = v.norm_squared();
    if length_sq > max_length * max_length && length_sq > 0.0 {
        v * (max_length / length_sq.sqrt())
    } else {
        *v
    }
}

/// Move on ground: reorient the velocity and the target on the ground plane,
/// then interpolate toward the target at `sharpness`.
pub fn standard_ground_move_interpolated(
    velocity: &mut Vec3,
    target_velocity: &Vec3,
    sharpness: f32,
    delta_time: f32,
    grounding_up: &Vec3,
    ground_normal: &Vec3,
) {
    let current = reorient_vector_on_plane_along_direction(velocity, ground_normal, grounding_up);
    let target = reorient_vector_on_plane_along_direction(target_velocity, ground_normal, grounding_up);
    *velocity = current.lerp(&target, sharpness_interpolant(sharpness, delta_time));
}

/// Leave the ground with `jump_velocity`.
///
/// With `cancel_velocity_before_jump`, the velocity along `velocity_canceling_up`
/// is removed first so the jump height does not depend on the slope.
pub fn standard_jump(
    body: &mut CharacterBody,
    jump_velocity: Vec3,
    cancel_velocity_before_jump: bool,
    velocity_canceling_up: &Vec3,
) {
    body.is_grounded = false;
    body.ground_hit = BasicHit::default();
    if cancel_velocity_before_jump {
        body.relative_velocity = project_on_plane(&body.relative_velocity, velocity_canceling_up);
    }
    body.relative_velocity += jump_velocity;
}

/// Accelerate in the plane perpendicular to `movement_plane_up`.
///
/// Acceleration cannot push the planar speed above `max_speed`, but planar speed
/// already above it is kept unless `force_max_speed` is set.
pub fn standard_air_move(
    velocity: &mut Vec3,
    acceleration: &Vec3,
    max_speed: f32,
    movement_plane_up: &Vec3,
    delta_time: f32,
    force_max_speed: bool,
) {
    let mut added = Vec3::zeros();
    accelerate_velocity(&mut added, acceleration, delta_time);

    let planar = project_on_plane(velocity, movement_plane_up);
    let accelerated = planar + project_on_plane(&added, movement_plane_up);
    let max_length = if force_max_speed {
        max_speed
    } else {
        max_speed.max(planar.norm())
    };
    let clamped = clamp_to_max_length(&accelerated, max_length);
    *velocity += clamped - planar;
}

#[inline]
pub fn accelerate_velocity(velocity: &mut Vec3, acceleration: &Vec3, delta_time: f32) {
    *velocity += acceleration * delta_time;
}

#[inline]
pub fn apply_drag_to_velocity(velocity: &mut Vec3, delta_time: f32, drag: f32) {
    *velocity *= 1.0 / (1.0 + drag * delta_time);
}

/// Character forward (-Z) and right (+X) for a rotation.
#[inline]
pub fn forward_from_rotation(rotation: &Quat) -> Vec3 {
    rotation * -Vec3::z()
}

#[inline]
pub fn right_from_rotation(rotation: &Quat) -> Vec3 {
    rotation * Vec3::x()
}

/// World-space move vector from a 2D intent (`x` right, `y` forward),
/// flattened on the plane perpendicular to `up` and clamped to unit length.
pub fn world_move_vector(move_input: &Vec2, rotation: &Quat, up: &Vec3) -> Vec3 {
    let forward = project_on_plane(&forward_from_rotation(rotation), up)
        .try_normalize(1.0e-6)
        .unwrap_or_else(Vec3::zeros);
    let right = project_on_plane(&right_from_rotation(rotation), up)
        .try_normalize(1.0e-6)
        .unwrap_or_else(Vec3::zeros);
    clamp_to_max_length(&(right * move_input.x + forward * move_input.y), 1.0)
}

/// Rotation from world +Y to `up`, then `yaw_degrees` around `up`.
/// Positive yaw turns right.
pub fn rotation_from_y_angle_and_up(yaw_degrees: f32, up: &Vec3) -> Quat {
    let base = Quat::rotation_between(&Vec3::y(), up)
        .unwrap_or_else(|| Quat::from_axis_angle(&Vec3::x_axis(), std::f32::consts::PI));
    base * Quat::from_axis_angle(&Vec3::y_axis(), -yaw_degrees.to_radians())
}

/// View rotation relative to the character: pitch around +X, then roll around forward.
pub fn local_view_rotation(pitch_degrees: f32, roll_degrees: f32) -> Quat {
    Quat::from_axis_angle(&Vec3::x_axis(), pitch_degrees.to_radians())
        * Quat::from_axis_angle(&Vec3::z_axis(), -roll_degrees.to_radians())
}

/// Output of [`compute_final_rotations_from_rotation_delta`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FinalRotations {
    pub character_rotation: Quat,
    /// Pitch input removed by the view clamp (degrees).
    pub canceled_pitch_degrees: f32,
    pub view_local_rotation: Quat,
}

/// Accumulate a yaw/pitch delta (degrees) into the character yaw and the view
/// pitch, clamping the pitch to `[min_pitch, max_pitch]`.
#[allow(clippy::too_many_arguments)]
pub fn compute_final_rotations_from_rotation_delta(
    view_pitch_degrees: &mut f32,
    character_y_degrees: &mut f32,
    character_up: &Vec3,
    yaw_pitch_delta_degrees: &Vec2,
    view_roll_degrees: f32,
    min_pitch_degrees: f32,
    max_pitch_degrees: f32,
) -> FinalRotations {
    *character_y_degrees += yaw_pitch_delta_degrees.x;
    let character_rotation = rotation_from_y_angle_and_up(*character_y_degrees, character_up);

    *view_pitch_degrees += yaw_pitch_delta_degrees.y;
    let before_clamp = *view_pitch_degrees;
    *view_pitch_degrees = view_pitch_degrees.clamp(min_pitch_degrees, max_pitch_degrees);

    FinalRotations {
        character_rotation,
        canceled_pitch_degrees: before_clamp - *view_pitch_degrees,
        view_local_rotation: local_view_rotation(*view_pitch_degrees, view_roll_degrees),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::types::Transform;

    #[test]
    fn interpolant_is_saturated() {
        assert_eq!(sharpness_interpolant(0.0, 0.02), 0.0);
        assert!(sharpness_interpolant(1.0e6, 0.02) <= 1.0);
        let a = sharpness_interpolant(15.0, 0.02);
        assert!(a > 0.0 && a < 1.0);
    }

    #[test]
    fn air_move_caps_speed_but_keeps_existing_excess() {
        let mut v = Vec3::new(9.0, 0.0, 0.0);
        standard_air_move(&mut v, &Vec3::new(100.0, 0.0, 0.0), 10.0, &Vec3::y(), 0.1, false);
        assert!((v.x - 10.0).abs() < 1.0e-5);

        let mut fast = Vec3::new(15.0, -3.0, 0.0);
        standard_air_move(&mut fast, &Vec3::new(100.0, 0.0, 0.0), 10.0, &Vec3::y(), 0.1, false);
        assert!((fast.x - 15.0).abs() < 1.0e-4);
        assert!((fast.y + 3.0).abs() < 1.0e-6);

        let mut forced = Vec3::new(15.0, 0.0, 0.0);
        standard_air_move(&mut forced, &Vec3::zeros(), 10.0, &Vec3::y(), 0.1, true);
        assert!((forced.x - 10.0).abs() < 1.0e-5);
    }

    #[test]
    fn drag_and_acceleration() {
        let mut v = Vec3::new(2.0, 0.0, 0.0);
        apply_drag_to_velocity(&mut v, 0.5, 2.0);
        assert!((v.x - 1.0).abs() < 1.0e-6);

        accelerate_velocity(&mut v, &Vec3::new(0.0, -10.0, 0.0), 0.1);
        assert!((v.y + 1.0).abs() < 1.0e-6);
    }

    #[test]
    fn jump_cancels_vertical_velocity_and_ungrounds() {
        let mut body = CharacterBody::new(Transform::identity());
        body.is_grounded = true;
        body.relative_velocity = Vec3::new(1.0, -2.0, 0.0);
        standard_jump(&mut body, Vec3::new(0.0, 8.0, 0.0), true, &Vec3::y());
        assert!(!body.is_grounded);
        assert!((body.relative_velocity - Vec3::new(1.0, 8.0, 0.0)).norm() < 1.0e-6);
    }

    #[test]
    fn positive_yaw_turns_right() {
        let rotation = rotation_from_y_angle_and_up(90.0, &Vec3::y());
        let forward = forward_from_rotation(&rotation);
        assert!((forward - Vec3::x()).norm() < 1.0e-5);
    }

    #[test]
    fn pitch_is_clamped_and_reported() {
        let mut pitch = 80.0;
        let mut yaw = 0.0;
        let out = compute_final_rotations_from_rotation_delta(
            &mut pitch,
            &mut yaw,
            &Vec3::y(),
            &Vec2::new(10.0, 20.0),
            0.0,
            -89.0,
            89.0,
        );
        assert!((pitch - 89.0).abs() < 1.0e-5);
        assert!((yaw - 10.0).abs() < 1.0e-5);
        assert!((out.canceled_pitch_degrees - 11.0).abs() < 1.0e-4);

        // Positive pitch looks up.
        let view_forward = out.view_local_rotation * -Vec3::z();
        assert!(view_forward.y > 0.9);
    }

    #[test]
    fn move_vector_follows_character_heading() {
        let rotation = rotation_from_y_angle_and_up(0.0, &Vec3::y());
        let v = world_move_vector(&Vec2::new(1.0, 0.0), &rotation, &Vec3::y());
        assert!((v - Vec3::x()).norm() < 1.0e-5);

        let v = world_move_vector(&Vec2::new(1.0, 1.0), &rotation, &Vec3::y());
        assert!((v.norm() - 1.0).abs() < 1.0e-5);
    }
}
