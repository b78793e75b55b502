//! Difficulty presets and simulation tuning
//!
//! Every tunable constant of the simulation lives in `SimConfig`. The
//! defaults are the canonical calibration; a JSON file may override any
//! subset of them.

use std::f32::consts::FRAC_PI_6;
use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ensure_positive};
use crate::sim::predictor::RiskThresholds;

/// Sea-state preset selected at session start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Difficulty {
    #[default]
    Calm,
    Rough,
    Storm,
}

/// Environmental multipliers applied by the outcome predictor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentFactors {
    /// 1.0 = perfect visibility
    pub visibility: f32,
    /// 1.0 = flat sea
    pub weather: f32,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Calm, Difficulty::Rough, Difficulty::Storm];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Calm => "Calm",
            Difficulty::Rough => "Rough",
            Difficulty::Storm => "Storm",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "calm" | "calm seas" => Some(Difficulty::Calm),
            "rough" | "rough waters" => Some(Difficulty::Rough),
            "storm" | "perfect storm" => Some(Difficulty::Storm),
            _ => None,
        }
    }

    /// Fixed visibility/weather tuple for this preset
    pub fn factors(&self) -> EnvironmentFactors {
        match self {
            Difficulty::Calm => EnvironmentFactors {
                visibility: 1.0,
                weather: 1.0,
            },
            Difficulty::Rough => EnvironmentFactors {
                visibility: 0.9,
                weather: 0.85,
            },
            Difficulty::Storm => EnvironmentFactors {
                visibility: 0.7,
                weather: 0.6,
            },
        }
    }
}

/// Vessel handling characteristics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VesselTuning {
    /// Maximum ahead speed (units/s)
    pub max_speed: f32,
    /// Most negative (astern) speed; must be <= 0
    pub min_reverse_speed: f32,
    /// Engine step used by full astern
    pub acceleration: f32,
    /// Yaw rate at full rudder, standing still (rad/s)
    pub base_turn_rate: f32,
    /// Rudder response time constant (seconds)
    pub steering_delay: f32,
    /// Hull yaw momentum time constant (seconds)
    pub turn_momentum_time: f32,
    /// Fraction of turn rate lost at max speed
    pub high_speed_turn_penalty: f32,
    /// Turn-rate multiplier while an emergency maneuver is active
    pub emergency_turn_multiplier: f32,
    /// Emergency maneuver duration (seconds)
    pub emergency_duration: f32,
    /// Water drag time constant on hull velocity (seconds)
    pub drag_time: f32,
    /// Rudder deflection at full steering input (radians)
    pub max_rudder_angle: f32,
}

impl Default for VesselTuning {
    fn default() -> Self {
        Self {
            max_speed: 20.0,
            min_reverse_speed: -6.0,
            acceleration: 5.0,
            base_turn_rate: 0.3,
            steering_delay: 0.8,
            turn_momentum_time: 1.5,
            high_speed_turn_penalty: 0.7,
            emergency_turn_multiplier: 1.5,
            emergency_duration: 10.0,
            drag_time: 1.0,
            max_rudder_angle: FRAC_PI_6,
        }
    }
}

/// Obstacle field generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldTuning {
    /// Obstacles placed in addition to the distinguished one
    pub obstacle_count: usize,
    pub field_radius: f32,
    /// No obstacle spawns closer than this to the origin
    pub min_spawn_distance: f32,
    /// Rejection-sampling retries before a candidate is accepted anyway
    pub max_placement_attempts: u32,
    /// Required separation per unit of obstacle scale
    pub separation_per_scale: f32,
    /// Per-axis drift speed bound (units/s)
    pub max_drift_speed: f32,
    /// Whether to place the distinguished obstacle
    pub place_distinguished: bool,
    /// Distance of the distinguished obstacle straight ahead of the origin
    pub distinguished_distance: f32,
    pub distinguished_scale: f32,
    pub distinguished_drift: Vec3,
}

impl Default for FieldTuning {
    fn default() -> Self {
        Self {
            obstacle_count: 49,
            field_radius: 1000.0,
            min_spawn_distance: 100.0,
            max_placement_attempts: 100,
            separation_per_scale: 10.0,
            max_drift_speed: 0.05,
            place_distinguished: true,
            distinguished_distance: 450.0,
            distinguished_scale: 3.0,
            distinguished_drift: Vec3::new(0.05, 0.0, 0.02),
        }
    }
}

/// Threat analysis constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreatTuning {
    /// Threats further out in time than this are ignored (seconds)
    pub look_ahead_secs: f32,
    /// Cheap distance cull, in danger radii, on top of look-ahead reach
    pub prefilter_factor: f32,
    /// Danger radius per size class: small, medium, large, massive
    pub danger_radii: [f32; 4],
    pub proximity_weight: f32,
    pub urgency_weight: f32,
    pub size_weight: f32,
    /// Time-to-impact at which urgency is one half (seconds)
    pub urgency_time_scale: f32,
}

impl Default for ThreatTuning {
    fn default() -> Self {
        Self {
            look_ahead_secs: 30.0,
            prefilter_factor: 3.0,
            danger_radii: [20.0, 32.0, 60.0, 90.0],
            proximity_weight: 0.4,
            urgency_weight: 0.5,
            size_weight: 0.1,
            urgency_time_scale: 10.0,
        }
    }
}

/// Outcome predictor constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorTuning {
    pub thresholds: RiskThresholds,
    /// Predictions retained for trend and stability
    pub history_capacity: usize,
    /// Entries per trend window
    pub trend_window: usize,
    /// Percentage points separating a trend from noise
    pub trend_delta: f32,
    pub distance_penalty_max: f32,
    /// Distance at which the proximity penalty reaches zero
    pub distance_penalty_range: f32,
    pub speed_penalty_max: f32,
    pub alignment_penalty_max: f32,
    /// Flat penalty per concurrent threat beyond the primary
    pub extra_threat_penalty: f32,
    /// Primary time-to-impact that forces "emergency maneuver" (seconds)
    pub emergency_time_threshold: f32,
    pub base_confidence: f32,
    pub confidence_floor: f32,
    /// Threat count above which the situation counts as complex
    pub complex_threat_count: usize,
    /// Nearest-threat distance below which confidence drops
    pub close_threat_distance: f32,
    /// Recent predictions used for the stability factor
    pub stability_window: usize,
}

impl Default for PredictorTuning {
    fn default() -> Self {
        Self {
            thresholds: RiskThresholds::default(),
            history_capacity: 60,
            trend_window: 10,
            trend_delta: 5.0,
            distance_penalty_max: 40.0,
            distance_penalty_range: 500.0,
            speed_penalty_max: 20.0,
            alignment_penalty_max: 25.0,
            extra_threat_penalty: 5.0,
            emergency_time_threshold: 10.0,
            base_confidence: 0.95,
            confidence_floor: 0.5,
            complex_threat_count: 3,
            close_threat_distance: 100.0,
            stability_window: 10,
        }
    }
}

/// Distinguished-obstacle encounter scripting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncounterTuning {
    /// Distance at which the distinguished obstacle is spotted
    pub spotting_distance: f32,
    /// Reaction budget from spotting to the expected impact (seconds)
    pub reaction_budget_secs: f32,
    /// Safe clearance per unit of obstacle scale
    pub clearance_per_scale: f32,
}

impl Default for EncounterTuning {
    fn default() -> Self {
        Self {
            spotting_distance: 500.0,
            reaction_budget_secs: 37.0,
            clearance_per_scale: 12.0,
        }
    }
}

/// Complete simulation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub vessel: VesselTuning,
    pub field: FieldTuning,
    pub threat: ThreatTuning,
    pub predictor: PredictorTuning,
    pub encounter: EncounterTuning,
}

impl SimConfig {
    /// Check every invariant the simulation relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        let v = &self.vessel;
        ensure_positive("vessel.max_speed", v.max_speed)?;
        ensure_positive("vessel.base_turn_rate", v.base_turn_rate)?;
        ensure_positive("vessel.steering_delay", v.steering_delay)?;
        ensure_positive("vessel.turn_momentum_time", v.turn_momentum_time)?;
        ensure_positive("vessel.drag_time", v.drag_time)?;
        ensure_positive("vessel.emergency_duration", v.emergency_duration)?;
        ensure_positive("vessel.emergency_turn_multiplier", v.emergency_turn_multiplier)?;
        if !(v.min_reverse_speed <= 0.0 && v.min_reverse_speed.is_finite()) {
            return Err(ConfigError::ReverseSpeedAhead(v.min_reverse_speed));
        }
        // Above 1 the rudder would swing the hull the wrong way at speed
        if !(0.0..=1.0).contains(&v.high_speed_turn_penalty) {
            return Err(ConfigError::TurnPenaltyOutOfRange(v.high_speed_turn_penalty));
        }

        let f = &self.field;
        if !(f.field_radius > f.min_spawn_distance) {
            return Err(ConfigError::FieldRadiusTooSmall {
                field_radius: f.field_radius,
                min_spawn_distance: f.min_spawn_distance,
            });
        }
        ensure_positive("field.separation_per_scale", f.separation_per_scale)?;
        ensure_positive("field.distinguished_scale", f.distinguished_scale)?;

        let t = &self.threat;
        ensure_positive("threat.look_ahead_secs", t.look_ahead_secs)?;
        ensure_positive("threat.prefilter_factor", t.prefilter_factor)?;
        ensure_positive("threat.urgency_time_scale", t.urgency_time_scale)?;
        let radii = t.danger_radii;
        if radii[0] <= 0.0 || radii.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(ConfigError::NonMonotonicDangerRadii(radii));
        }

        let p = &self.predictor;
        p.thresholds.validate()?;
        ensure_positive("predictor.history_capacity", p.history_capacity as f32)?;
        ensure_positive("predictor.trend_window", p.trend_window as f32)?;
        ensure_positive("predictor.distance_penalty_range", p.distance_penalty_range)?;
        ensure_positive("predictor.confidence_floor", p.confidence_floor)?;
        let trend_span = p.trend_window.saturating_mul(2);
        ensure_history("predictor.trend_window", trend_span, p.history_capacity)?;
        ensure_history(
            "predictor.stability_window",
            p.stability_window,
            p.history_capacity,
        )?;

        ensure_positive("encounter.spotting_distance", self.encounter.spotting_distance)?;
        Ok(())
    }

    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded config from {}", path.as_ref().display());
        Ok(config)
    }

    /// Load from a JSON file, falling back to defaults only when it does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match Self::load(path.as_ref()) {
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("No config at {}, using defaults", path.as_ref().display());
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Save as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        log::info!("Config saved to {}", path.as_ref().display());
        Ok(())
    }
}

/// A window over predictor history must fit inside it
fn ensure_history(name: &'static str, required: usize, capacity: usize) -> Result<(), ConfigError> {
    if required <= capacity {
        Ok(())
    } else {
        Err(ConfigError::HistoryTooShort {
            name,
            required,
            capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn test_difficulty_lookup() {
        assert_eq!(Difficulty::from_str("Storm"), Some(Difficulty::Storm));
        assert_eq!(Difficulty::from_str("calm seas"), Some(Difficulty::Calm));
        assert_eq!(Difficulty::from_str("Rough Waters"), Some(Difficulty::Rough));
        assert_eq!(Difficulty::from_str("hurricane"), None);
        for d in Difficulty::ALL {
            assert_eq!(Difficulty::from_str(d.as_str()), Some(d));
        }
    }

    #[test]
    fn test_difficulty_factors_degrade() {
        let calm = Difficulty::Calm.factors();
        let rough = Difficulty::Rough.factors();
        let storm = Difficulty::Storm.factors();
        assert_eq!(calm.visibility, 1.0);
        assert_eq!(calm.weather, 1.0);
        assert!(rough.visibility > storm.visibility);
        assert!(rough.weather > storm.weather);
    }

    #[test]
    fn test_field_radius_must_exceed_spawn_distance() {
        let mut config = SimConfig::default();
        config.field.field_radius = 100.0;
        config.field.min_spawn_distance = 100.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::FieldRadiusTooSmall { .. })
        ));
    }

    #[test]
    fn test_non_monotonic_thresholds_rejected() {
        let mut config = SimConfig::default();
        config.predictor.thresholds.caution = 85.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonMonotonicRiskThresholds { .. })
        ));
    }

    #[test]
    fn test_non_monotonic_danger_radii_rejected() {
        let mut config = SimConfig::default();
        config.threat.danger_radii = [20.0, 60.0, 32.0, 90.0];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonMonotonicDangerRadii(_))
        ));
    }

    #[test]
    fn test_zero_steering_delay_rejected() {
        let mut config = SimConfig::default();
        config.vessel.steering_delay = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::NonPositive { .. })));
    }

    #[test]
    fn test_turn_penalty_above_one_rejected() {
        let mut config = SimConfig::default();
        config.vessel.high_speed_turn_penalty = 1.2;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TurnPenaltyOutOfRange(_))
        ));
        config.vessel.high_speed_turn_penalty = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_history_must_hold_two_trend_windows() {
        let mut config = SimConfig::default();
        config.predictor.history_capacity = 15;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::HistoryTooShort {
                name: "predictor.trend_window",
                required: 20,
                capacity: 15,
            })
        ));
        config.predictor.history_capacity = 20;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_stability_window_must_fit_history() {
        let mut config = SimConfig::default();
        config.predictor.stability_window = 61;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::HistoryTooShort {
                name: "predictor.stability_window",
                ..
            })
        ));
    }

    #[test]
    fn test_partial_json_overrides_defaults() {
        let config = SimConfig::from_json(r#"{ "field": { "obstacle_count": 7 } }"#).unwrap();
        assert_eq!(config.field.obstacle_count, 7);
        assert_eq!(config.field.field_radius, 1000.0);
        assert_eq!(config.predictor.history_capacity, 60);
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        assert!(matches!(
            SimConfig::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_json_validation_runs_after_parse() {
        let json = r#"{ "field": { "field_radius": 50.0 } }"#;
        assert!(matches!(
            SimConfig::from_json(json),
            Err(ConfigError::FieldRadiusTooSmall { .. })
        ));
    }
}
