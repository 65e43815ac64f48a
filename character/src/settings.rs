/*!
Kinematic character controller settings and tolerances.

These constants centralize the parameters used by grounding, the movement
sweep, decollision and the first-person control defaults. Keeping them
together makes tuning easier and keeps the per-tick code free of magic numbers.

Notes
- Distances are in meters, time in seconds, angles in degrees unless the name
  says otherwise.
- Favor practical world-space tolerances over machine epsilon for robust behavior.
- Authored tunables (`CharacterProperties`, `StepAndSlopeHandling`,
  `FirstPersonCharacterComponent`) use these as their `Default` values.
*/

/// Separation kept between the character shape and any surface (meters).
/// Casts are lengthened by this amount and hits are shortened by it.
pub const COLLISION_OFFSET: f32 = 0.01;

/// Ground probe length used when the character was NOT grounded before the update.
pub const GROUND_PROBE_UNGROUNDED_DISTANCE: f32 = COLLISION_OFFSET * 3.0;

/// Practical small distance for comparisons (meters).
pub const DIST_EPS: f32 = 1.0e-5;

/// Movement shorter than this is treated as zero (m^2).
pub const MIN_MOVE_SQ: f32 = 1.0e-10;

/// Slope classification tolerance on the normal/up dot product.
/// A hit exactly at the max slope angle is grounded (inclusive bound).
pub const SLOPE_DOT_EPS: f32 = 1.0e-5;

/// Two normals whose dot product exceeds `-DOT_SIMILARITY_EPS` are not considered opposing.
pub const DOT_SIMILARITY_EPS: f32 = 1.0e-3;

/// Ground overlaps whose normal aligns with up less than this are pushed out
/// along their normal instead of along up (dot product).
pub const MIN_UP_DECOLLISION_ALIGNMENT: f32 = 0.5;

/// Horizontal offset from a hit point used by the step grounding probe rays (meters).
pub const STEP_GROUNDING_HORIZONTAL_OFFSET: f32 = 0.05;

/// Movement left over at the iteration cap shorter than this counts as completed (meters).
pub const ITERATION_CAP_REPORT_LENGTH: f32 = 0.01;

/// Height above the ground hit where the future slope probe starts (meters).
pub const FUTURE_SLOPE_VERTICAL_OFFSET: f32 = COLLISION_OFFSET;

/// Depth below the ground level the future slope probe searches (meters).
pub const FUTURE_SLOPE_DOWN_DETECTION_DEPTH: f32 = 0.05;

/// Extra distance ahead of the first future slope probe used to confirm a missing ground (meters).
pub const FUTURE_SLOPE_SECONDARY_NO_GROUNDING_DISTANCE: f32 = 0.25;

/// Default number of sweep iterations per movement update.
/// Higher values help with tight corners at the cost of more queries.
pub const DEFAULT_MAX_CONTINUOUS_COLLISIONS_ITERATIONS: u32 = 8;

/// Default number of overlap decollision passes after the sweep.
pub const DEFAULT_MAX_OVERLAP_DECOLLISION_ITERATIONS: u32 = 2;

/// Default distance the character snaps down to stay on ground (meters).
pub const DEFAULT_GROUND_SNAPPING_DISTANCE: f32 = 0.5;

/// Default steepest walkable slope (degrees).
pub const DEFAULT_MAX_GROUNDED_SLOPE_DEGREES: f32 = 60.0;

/// Default step height the character may climb (meters).
pub const DEFAULT_MAX_STEP_HEIGHT: f32 = 0.5;

/// Default extra horizontal distance for the far step grounding probes (meters).
pub const DEFAULT_EXTRA_STEPS_CHECK_DISTANCE: f32 = 0.1;

/// Default character width used when probing for ground ahead (meters).
pub const DEFAULT_CHARACTER_WIDTH_FOR_STEP_GROUNDING_CHECK: f32 = 1.0;

/// Default downward slope change that un-grounds the character (degrees).
pub const DEFAULT_MAX_DOWNWARD_SLOPE_CHANGE_DEGREES: f32 = 90.0;

/// Default capsule radius (meters).
pub const DEFAULT_CAPSULE_RADIUS: f32 = 0.5;

/// Default total capsule height, caps included (meters).
pub const DEFAULT_CAPSULE_HEIGHT: f32 = 2.0;

/// Default character mass (kg), used only against dynamic bodies.
pub const DEFAULT_CHARACTER_MASS: f32 = 1.0;

/// Gravity magnitude in meters per second squared (positive value).
pub const DEFAULT_GRAVITY_MPS2: f32 = 30.0;

/// Default grounded max speed (m/s).
pub const DEFAULT_GROUND_MAX_SPEED: f32 = 10.0;

/// Default grounded velocity interpolation sharpness (1/s).
pub const DEFAULT_GROUNDED_MOVEMENT_SHARPNESS: f32 = 15.0;

/// Default air acceleration from input (m/s^2).
pub const DEFAULT_AIR_ACCELERATION: f32 = 50.0;

/// Default planar speed cap for input-driven air acceleration (m/s).
pub const DEFAULT_AIR_MAX_SPEED: f32 = 10.0;

/// Default jump impulse along grounding-up (m/s).
pub const DEFAULT_JUMP_SPEED: f32 = 10.0;

/// Default view clamp (degrees).
pub const DEFAULT_MIN_VIEW_ANGLE: f32 = -89.9;
pub const DEFAULT_MAX_VIEW_ANGLE: f32 = 89.9;

/// Default view roll at full lateral speed (degrees) and its smoothing sharpness.
pub const DEFAULT_VIEW_ROLL_AMOUNT: f32 = 3.0;
pub const DEFAULT_VIEW_ROLL_SHARPNESS: f32 = 10.0;
