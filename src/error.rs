//! Configuration errors
//!
//! Raised while validating or loading a `SimConfig`. A session refuses to
//! start on any of these instead of clamping into an undefined state.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("field radius {field_radius} must exceed the minimum spawn distance {min_spawn_distance}")]
    FieldRadiusTooSmall {
        field_radius: f32,
        min_spawn_distance: f32,
    },

    #[error("risk thresholds must strictly descend within (0, 100]: safe={safe}, caution={caution}, danger={danger}")]
    NonMonotonicRiskThresholds { safe: f32, caution: f32, danger: f32 },

    #[error("danger radii must strictly increase with size class: {0:?}")]
    NonMonotonicDangerRadii([f32; 4]),

    #[error("{name} must be positive and finite, got {value}")]
    NonPositive { name: &'static str, value: f32 },

    #[error("minimum reverse speed must be zero or astern, got {0}")]
    ReverseSpeedAhead(f32),

    #[error("high-speed turn penalty must lie in [0, 1], got {0}")]
    TurnPenaltyOutOfRange(f32),

    #[error("{name} needs {required} history entries but capacity is {capacity}")]
    HistoryTooShort {
        name: &'static str,
        required: usize,
        capacity: usize,
    },

    #[error("failed to read or write config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Reject non-finite or non-positive tuning values
pub(crate) fn ensure_positive(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { name, value })
    }
}
