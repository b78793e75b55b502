//! Bergwatch - ice-field navigation simulation core
//!
//! Core modules:
//! - `sim`: Deterministic simulation (vessel dynamics, obstacle field, threat analysis, prediction)
//! - `settings`: Difficulty presets and data-driven tuning
//! - `error`: Configuration errors reported at setup time

pub mod error;
pub mod settings;
pub mod sim;

pub use error::ConfigError;
pub use settings::{Difficulty, EnvironmentFactors, SimConfig};

use glam::Vec3;

/// Simulation constants that are not part of the tunable configuration
pub mod consts {
    /// Fixed simulation timestep (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Hull dimensions (width, height, length)
    pub const HULL_WIDTH: f32 = 8.0;
    pub const HULL_HEIGHT: f32 = 3.0;
    pub const HULL_LENGTH: f32 = 40.0;
    /// Hull centre height above the waterline plane
    pub const HULL_CENTER_Y: f32 = 1.0;

    /// Speed the vessel is already making when a session starts
    pub const START_SPEED: f32 = 18.0;
    /// Seconds a session must be survived to win
    pub const VOYAGE_DURATION_SECS: f32 = 300.0;
    /// Survival percentage that must be held at the end of the voyage
    pub const VOYAGE_MIN_SURVIVAL: f32 = 50.0;
}

/// Normalize angle to (-π, π]
#[inline]
pub fn normalize_angle(mut angle: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    if !angle.is_finite() {
        return 0.0;
    }
    angle %= TAU;
    if angle > PI {
        angle -= TAU;
    } else if angle <= -PI {
        angle += TAU;
    }
    angle
}

/// Unit forward vector for a heading on the water plane.
///
/// Heading 0 points along -Z; positive headings turn to starboard (+X).
#[inline]
pub fn heading_to_direction(heading: f32) -> Vec3 {
    Vec3::new(heading.sin(), 0.0, -heading.cos())
}

/// Heading that points from `from` toward `to`, ignoring height
#[inline]
pub fn bearing_of(from: Vec3, to: Vec3) -> f32 {
    let d = to - from;
    d.x.atan2(-d.z)
}

/// Flatten a vector onto the water plane
#[inline]
pub fn planar(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}
