/*!
First-person character archetype.

Ties the generic update phases together for a walking, jumping, looking
character:

- `FirstPersonCharacterComponent`: authored tunables plus the view angles
  accumulated across frames.
- `FirstPersonCharacterControl`: control intent written by the input or
  network layer. `jump` is edge-triggered and consumed by the physics update;
  the look delta is consumed by the variable update.
- `FirstPersonUpdateContext`: read-only weapon lookups, refreshed once per tick
  before characters are dispatched.
- `FirstPersonProcessor`: the `CharacterProcessor` of this archetype.

The physics update runs at a fixed rate; the variable update runs once per
rendered frame and only touches rotations.
*/

use rapier3d::parry::utils::hashmap::HashMap;

use crate::body::{CharacterProperties, KinematicCharacter, StepAndSlopeHandling};
use crate::collision::query::CollisionWorld;
use crate::collision::types::{BasicHit, Entity, Quat, Transform, Vec2, Vec3};
use crate::control::{
    FinalRotations, accelerate_velocity, apply_drag_to_velocity,
    compute_final_rotations_from_rotation_delta, right_from_rotation, sharpness_interpolant,
    standard_air_move, standard_ground_move_interpolated, standard_jump, world_move_vector,
};
use crate::error::{self, ConfigError};
use crate::grounding::{
    default_is_grounded_on_hit, update_grounding, update_prevent_grounding_from_future_slope_change,
};
use crate::hits::{CharacterHit, update_process_stateful_hits};
use crate::movement::{
    default_on_movement_hit, movement_would_hit_non_grounded_obstruction, update_ground_pushing,
    update_movement_and_decollisions,
};
use crate::parent::{
    add_variable_rate_rotation_from_fixed_rate_rotation, rotation_around_axis,
    update_moving_platform_detection, update_parent_momentum, update_parent_movement,
};
use crate::processor::{CharacterProcessor, GroundingEvaluation, UpdateContext};
use crate::projection::{VelocityProjectionHit, default_project_velocity_on_hits};
use crate::settings::{
    DEFAULT_AIR_ACCELERATION, DEFAULT_AIR_MAX_SPEED, DEFAULT_GRAVITY_MPS2,
    DEFAULT_GROUND_MAX_SPEED, DEFAULT_GROUNDED_MOVEMENT_SHARPNESS, DEFAULT_JUMP_SPEED,
    DEFAULT_MAX_VIEW_ANGLE, DEFAULT_MIN_VIEW_ANGLE, DEFAULT_VIEW_ROLL_AMOUNT,
    DEFAULT_VIEW_ROLL_SHARPNESS,
};

/// Tunables and accumulated view state of a first-person character.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-serialize",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct FirstPersonCharacterComponent {
    pub gravity: Vec3,
    pub ground_max_speed: f32,
    pub grounded_movement_sharpness: f32,
    pub air_acceleration: f32,
    pub air_max_speed: f32,
    pub air_drag: f32,
    pub jump_speed: f32,
    /// Undo air acceleration that would push the character into a wall or a
    /// slope too steep to stand on.
    pub prevent_air_acceleration_against_ungrounded_hits: bool,
    pub step_and_slope_handling: StepAndSlopeHandling,

    /// View pitch clamp (degrees).
    pub min_view_angle: f32,
    pub max_view_angle: f32,
    /// Roll at full lateral speed (degrees).
    pub view_roll_amount: f32,
    pub view_roll_sharpness: f32,

    /// Accumulated yaw around world up (degrees, positive turns right).
    pub character_y_degrees: f32,
    pub view_pitch_degrees: f32,
    pub view_roll_degrees: f32,
    /// View rotation relative to the character, written by the variable update.
    pub view_local_rotation: Quat,
}

impl Default for FirstPersonCharacterComponent {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -DEFAULT_GRAVITY_MPS2, 0.0),
            ground_max_speed: DEFAULT_GROUND_MAX_SPEED,
            grounded_movement_sharpness: DEFAULT_GROUNDED_MOVEMENT_SHARPNESS,
            air_acceleration: DEFAULT_AIR_ACCELERATION,
            air_max_speed: DEFAULT_AIR_MAX_SPEED,
            air_drag: 0.0,
            jump_speed: DEFAULT_JUMP_SPEED,
            prevent_air_acceleration_against_ungrounded_hits: true,
            step_and_slope_handling: StepAndSlopeHandling::default(),
            min_view_angle: DEFAULT_MIN_VIEW_ANGLE,
            max_view_angle: DEFAULT_MAX_VIEW_ANGLE,
            view_roll_amount: DEFAULT_VIEW_ROLL_AMOUNT,
            view_roll_sharpness: DEFAULT_VIEW_ROLL_SHARPNESS,
            character_y_degrees: 0.0,
            view_pitch_degrees: 0.0,
            view_roll_degrees: 0.0,
            view_local_rotation: Quat::identity(),
        }
    }
}

impl FirstPersonCharacterComponent {
    pub fn validate(&self) -> Result<(), ConfigError> {
        error::finite("gravity.x", self.gravity.x)?;
        error::finite("gravity.y", self.gravity.y)?;
        error::finite("gravity.z", self.gravity.z)?;
        error::positive("ground_max_speed", self.ground_max_speed)?;
        error::non_negative("grounded_movement_sharpness", self.grounded_movement_sharpness)?;
        error::non_negative("air_acceleration", self.air_acceleration)?;
        error::positive("air_max_speed", self.air_max_speed)?;
        error::non_negative("air_drag", self.air_drag)?;
        error::non_negative("jump_speed", self.jump_speed)?;
        error::angle_in("min_view_angle", self.min_view_angle, -90.0, 90.0)?;
        error::angle_in("max_view_angle", self.max_view_angle, -90.0, 90.0)?;
        if self.min_view_angle > self.max_view_angle {
            return Err(ConfigError::InvertedViewClamp {
                min: self.min_view_angle,
                max: self.max_view_angle,
            });
        }
        error::finite("view_roll_amount", self.view_roll_amount)?;
        error::non_negative("view_roll_sharpness", self.view_roll_sharpness)?;
        self.step_and_slope_handling.validate()
    }

    /// Planar speed the view roll saturates at.
    #[inline]
    fn roll_reference_speed(&self, is_grounded: bool) -> f32 {
        if is_grounded {
            self.ground_max_speed
        } else {
            self.air_max_speed
        }
    }
}

/// Control intent for one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(
    feature = "serde-serialize",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct FirstPersonCharacterControl {
    /// `x` right, `y` forward, in the character's frame. Length at most 1.
    pub move_vector: Vec2,
    pub jump: bool,
    /// Look delta (degrees) accumulated since the last variable update.
    pub look_yaw_pitch_degrees: Vec2,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WeaponControl {
    pub aim_held: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeaponVisualFeedback {
    pub look_sensitivity_multiplier_while_aiming: f32,
}

impl Default for WeaponVisualFeedback {
    fn default() -> Self {
        Self {
            look_sensitivity_multiplier_while_aiming: 1.0,
        }
    }
}

/// Read-only lookups shared by all first-person updates of a tick.
///
/// Refresh it once, before dispatching characters; updates only read it.
/// `version` increases on every refresh.
#[derive(Clone, Debug, Default)]
pub struct FirstPersonUpdateContext {
    weapon_controls: HashMap<Entity, WeaponControl>,
    weapon_visual_feedbacks: HashMap<Entity, WeaponVisualFeedback>,
    version: u64,
}

impl FirstPersonUpdateContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot with the current weapon states.
    pub fn refresh(
        &mut self,
        controls: impl IntoIterator<Item = (Entity, WeaponControl)>,
        feedbacks: impl IntoIterator<Item = (Entity, WeaponVisualFeedback)>,
    ) {
        self.weapon_controls.clear();
        self.weapon_controls.extend(controls);
        self.weapon_visual_feedbacks.clear();
        self.weapon_visual_feedbacks.extend(feedbacks);
        self.version += 1;
    }

    pub fn insert_weapon(
        &mut self,
        weapon: Entity,
        control: WeaponControl,
        feedback: WeaponVisualFeedback,
    ) {
        self.weapon_controls.insert(weapon, control);
        self.weapon_visual_feedbacks.insert(weapon, feedback);
        self.version += 1;
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[inline]
    pub fn weapon_control(&self, weapon: Entity) -> Option<&WeaponControl> {
        self.weapon_controls.get(&weapon)
    }

    #[inline]
    pub fn weapon_visual_feedback(&self, weapon: Entity) -> Option<&WeaponVisualFeedback> {
        self.weapon_visual_feedbacks.get(&weapon)
    }

    /// Look sensitivity scale for a character holding `weapon`.
    /// 1 unless the weapon is aimed and has visual feedback data.
    pub fn look_sensitivity_multiplier(&self, weapon: Entity) -> f32 {
        if weapon.is_null() {
            return 1.0;
        }
        match (self.weapon_control(weapon), self.weapon_visual_feedback(weapon)) {
            (Some(control), Some(feedback)) if control.aim_held => {
                feedback.look_sensitivity_multiplier_while_aiming
            }
            _ => 1.0,
        }
    }
}

/// A first-person character: the kinematic character plus its archetype data.
#[derive(Clone, Debug)]
pub struct FirstPersonCharacter {
    pub character: KinematicCharacter,
    pub component: FirstPersonCharacterComponent,
    pub control: FirstPersonCharacterControl,
    /// Weapon whose aim state scales look sensitivity. `Entity::NULL` for none.
    pub active_weapon: Entity,
}

impl FirstPersonCharacter {
    /// Spawn a character at `transform`. The initial yaw is taken from the
    /// transform's rotation around world up.
    pub fn new(
        entity: Entity,
        properties: CharacterProperties,
        component: FirstPersonCharacterComponent,
        transform: Transform,
    ) -> Result<Self, ConfigError> {
        if let Err(err) = component.validate() {
            log::warn!("rejected first-person component for {entity:?}: {err}");
            return Err(err);
        }
        let mut character = KinematicCharacter::new(entity, properties, transform)?;

        let mut component = component;
        let yaw = rotation_around_axis(&transform.rotation, &Vec3::y());
        component.character_y_degrees = -signed_angle_around(&yaw, &Vec3::y()).to_degrees();
        character.body.rotation = yaw;

        Ok(Self {
            character,
            component,
            control: FirstPersonCharacterControl::default(),
            active_weapon: Entity::NULL,
        })
    }

    #[inline]
    pub fn entity(&self) -> Entity {
        self.character.entity
    }

    #[inline]
    pub fn processor(&self) -> FirstPersonProcessor<'_> {
        FirstPersonProcessor {
            component: &self.component,
        }
    }
}

/// Signed angle (radians) of a rotation around `axis`.
fn signed_angle_around(rotation: &Quat, axis: &Vec3) -> f32 {
    match rotation.axis_angle() {
        Some((rotation_axis, angle)) if rotation_axis.dot(axis) < 0.0 => -angle,
        Some((_, angle)) => angle,
        None => 0.0,
    }
}

/// Callbacks of the first-person archetype: the standard behaviors, driven by
/// the component's step and slope handling.
#[derive(Clone, Copy, Debug)]
pub struct FirstPersonProcessor<'a> {
    pub component: &'a FirstPersonCharacterComponent,
}

impl<W: CollisionWorld> CharacterProcessor<W> for FirstPersonProcessor<'_> {
    type Context = FirstPersonUpdateContext;

    fn is_grounded_on_hit(
        &self,
        ctx: &Self::Context,
        base: &UpdateContext<'_, W>,
        character: &KinematicCharacter,
        hit: &BasicHit,
        evaluation: GroundingEvaluation,
    ) -> bool {
        default_is_grounded_on_hit(
            self,
            ctx,
            base,
            character,
            hit,
            &self.component.step_and_slope_handling,
            evaluation,
        )
    }

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
    ) {
        let handling = &self.component.step_and_slope_handling;
        default_on_movement_hit(
            self,
            ctx,
            base,
            character,
            hit,
            remaining_movement_direction,
            remaining_movement_length,
            original_velocity_direction,
            hit_distance,
            handling.step_handling,
            handling.max_step_height,
        );
    }

    fn project_velocity_on_hits(
        &self,
        _ctx: &Self::Context,
        _base: &UpdateContext<'_, W>,
        velocity: &mut Vec3,
        is_grounded: &mut bool,
        ground_hit: &mut BasicHit,
        hits: &[VelocityProjectionHit],
        consumed: usize,
        original_velocity_direction: Vec3,
        grounding_up: Vec3,
    ) {
        default_project_velocity_on_hits(
            velocity,
            is_grounded,
            ground_hit,
            hits,
            consumed,
            original_velocity_direction,
            self.component.step_and_slope_handling.constrain_velocity_to_ground_plane,
            &grounding_up,
        );
    }
}

/// Fixed-rate update of one first-person character.
///
/// Phase order matters; each phase reads what the previous ones wrote.
pub fn physics_update<W: CollisionWorld>(
    fp: &mut FirstPersonCharacter,
    ctx: &FirstPersonUpdateContext,
    base: &UpdateContext<'_, W>,
) {
    let FirstPersonCharacter {
        character,
        component,
        control,
        ..
    } = fp;
    let component: &FirstPersonCharacterComponent = component;
    let processor = FirstPersonProcessor { component };
    let handling = &component.step_and_slope_handling;

    character.update_initialize(base.delta_time());
    processor.update_grounding_up(base, character);
    let was_grounded_before = character.body.was_grounded_before_character_update;
    update_parent_movement(&processor, ctx, base, character, was_grounded_before);
    update_grounding(&processor, ctx, base, character);

    handle_velocity_control(&processor, ctx, base, character, component, control);

    update_prevent_grounding_from_future_slope_change(&processor, ctx, base, character, handling);
    update_ground_pushing(&processor, ctx, base, character, component.gravity);
    update_movement_and_decollisions(&processor, ctx, base, character);
    update_moving_platform_detection(base, character);
    update_parent_momentum(base, character);
    update_process_stateful_hits(character);

    control.jump = false;
}

/// Turn control intent into velocity: interpolated ground movement and jump
/// while grounded; air acceleration, gravity and drag otherwise.
pub fn handle_velocity_control<W: CollisionWorld>(
    processor: &FirstPersonProcessor<'_>,
    ctx: &FirstPersonUpdateContext,
    base: &UpdateContext<'_, W>,
    character: &mut KinematicCharacter,
    component: &FirstPersonCharacterComponent,
    control: &FirstPersonCharacterControl,
) {
    let dt = base.delta_time();
    let up = character.body.grounding_up;
    let move_vector = world_move_vector(&control.move_vector, &character.body.rotation, &up);

    if character.body.is_grounded {
        let target = move_vector * component.ground_max_speed;
        let ground_normal = character.body.ground_hit.normal;
        standard_ground_move_interpolated(
            &mut character.body.relative_velocity,
            &target,
            component.grounded_movement_sharpness,
            dt,
            &up,
            &ground_normal,
        );

        if control.jump {
            standard_jump(&mut character.body, up * component.jump_speed, true, &up);
        }
        return;
    }

    let air_acceleration = move_vector * component.air_acceleration;
    if air_acceleration.norm_squared() > 0.0 {
        let before = character.body.relative_velocity;
        standard_air_move(
            &mut character.body.relative_velocity,
            &air_acceleration,
            component.air_max_speed,
            &up,
            dt,
            false,
        );

        if component.prevent_air_acceleration_against_ungrounded_hits {
            let movement = character.body.relative_velocity * dt;
            if movement_would_hit_non_grounded_obstruction(processor, ctx, base, character, movement)
                .is_some()
            {
                log::trace!("air acceleration of {:?} canceled by obstruction", character.entity);
                character.body.relative_velocity = before;
            }
        }
    }

    accelerate_velocity(&mut character.body.relative_velocity, &component.gravity, dt);
    apply_drag_to_velocity(&mut character.body.relative_velocity, dt, component.air_drag);
}

/// Variable-rate update: follow the parent's rotation smoothly, roll the view
/// with lateral speed and apply the look delta.
///
/// Returns the computed rotations; the pitch removed by the view clamp is
/// reported there.
pub fn variable_update<W: CollisionWorld>(
    fp: &mut FirstPersonCharacter,
    ctx: &FirstPersonUpdateContext,
    base: &UpdateContext<'_, W>,
) -> FinalRotations {
    let dt = base.delta_time();
    let FirstPersonCharacter {
        character,
        component,
        control,
        active_weapon,
    } = fp;
    let body = &mut character.body;

    let from_parent = add_variable_rate_rotation_from_fixed_rate_rotation(
        &mut body.rotation,
        &body.rotation_from_parent,
        dt,
        body.last_physics_update_delta_time,
    );
    let parent_yaw = rotation_around_axis(&from_parent, &Vec3::y());
    component.character_y_degrees -= signed_angle_around(&parent_yaw, &Vec3::y()).to_degrees();

    let right = right_from_rotation(&body.rotation);
    let lateral_speed = body.relative_velocity.dot(&right);
    let reference_speed = component.roll_reference_speed(body.is_grounded);
    let ratio = (lateral_speed.abs() / reference_speed).clamp(0.0, 1.0);
    let mut target_roll = component.view_roll_amount * ratio;
    if lateral_speed > 0.0 {
        target_roll = -target_roll;
    }
    let t = sharpness_interpolant(component.view_roll_sharpness, dt);
    component.view_roll_degrees += (target_roll - component.view_roll_degrees) * t;

    let look = control.look_yaw_pitch_degrees * ctx.look_sensitivity_multiplier(*active_weapon);
    let rotations = compute_final_rotations_from_rotation_delta(
        &mut component.view_pitch_degrees,
        &mut component.character_y_degrees,
        &Vec3::y(),
        &look,
        component.view_roll_degrees,
        component.min_view_angle,
        component.max_view_angle,
    );
    body.rotation = rotations.character_rotation;
    component.view_local_rotation = rotations.view_local_rotation;
    control.look_yaw_pitch_degrees = Vec2::zeros();

    rotations
}
