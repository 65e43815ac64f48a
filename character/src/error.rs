//! Construction-time validation errors.
//!
//! The per-tick update never fails; it assumes finite, validated inputs.
//! Everything that can be wrong with authored data is caught here, once,
//! when a character or a world body is created.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("`{field}` must be finite, got {value}")]
    NonFinite { field: &'static str, value: f32 },

    #[error("`{field}` must be positive, got {value}")]
    NotPositive { field: &'static str, value: f32 },

    #[error("`{field}` must not be negative, got {value}")]
    Negative { field: &'static str, value: f32 },

    #[error("`{field}` must be within [{min}, {max}] degrees, got {value}")]
    AngleOutOfRange {
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },

    #[error("view angle clamp is inverted: min {min} > max {max}")]
    InvertedViewClamp { min: f32, max: f32 },

    #[error("`{field}` must allow at least one iteration")]
    ZeroIterations { field: &'static str },

    #[error("capsule height {height} is smaller than its diameter {diameter}")]
    DegenerateCapsule { height: f32, diameter: f32 },

    #[error("entity {0} is already registered in the world")]
    DuplicateEntity(u64),

    #[error("entity id 0 is reserved for `Entity::NULL`")]
    NullEntity,
}

/// Small helpers shared by the `validate()` implementations.
pub(crate) fn finite(field: &'static str, value: f32) -> Result<f32, ConfigError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::NonFinite { field, value })
    }
}

pub(crate) fn positive(field: &'static str, value: f32) -> Result<f32, ConfigError> {
    if finite(field, value)? > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

pub(crate) fn non_negative(field: &'static str, value: f32) -> Result<f32, ConfigError> {
    if finite(field, value)? >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::Negative { field, value })
    }
}

pub(crate) fn angle_in(
    field: &'static str,
    value: f32,
    min: f32,
    max: f32,
) -> Result<f32, ConfigError> {
    if (min..=max).contains(&finite(field, value)?) {
        Ok(value)
    } else {
        Err(ConfigError::AngleOutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpers_reject_bad_values() {
        assert!(finite("x", f32::NAN).is_err());
        assert_eq!(positive("speed", 2.0), Ok(2.0));
        assert_eq!(
            positive("speed", 0.0),
            Err(ConfigError::NotPositive {
                field: "speed",
                value: 0.0
            })
        );
        assert!(non_negative("drag", 0.0).is_ok());
        assert!(non_negative("drag", -1.0).is_err());
        assert!(angle_in("slope", 90.0, 0.0, 90.0).is_ok());
        assert!(angle_in("slope", 91.0, 0.0, 90.0).is_err());
    }

    #[test]
    fn messages_name_the_field() {
        let err = ConfigError::NotPositive {
            field: "ground_max_speed",
            value: 0.0,
        };
        assert_eq!(err.to_string(), "`ground_max_speed` must be positive, got 0");
    }
}
