//! Outcome prediction
//!
//! Fuses the ranked threat list, the vessel and the sea state into a single
//! survival estimate with a discrete risk level and a short list of
//! recommended actions. A bounded history of predictions feeds the trend
//! query and the stability term of the confidence score.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::threat::{AvoidanceOption, Threat};
use super::vessel::Vessel;
use crate::error::ConfigError;
use crate::settings::{EnvironmentFactors, PredictorTuning};
use crate::planar;

/// Most recommendations ever published
pub const MAX_RECOMMENDATIONS: usize = 3;
/// Lower bound on any divisor built from environment factors
const MIN_MULTIPLIER: f32 = 0.01;

/// Discrete risk classification, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Safe,
    Caution,
    Danger,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "safe",
            RiskLevel::Caution => "caution",
            RiskLevel::Danger => "danger",
            RiskLevel::Critical => "critical",
        }
    }
}

/// Lower bounds (inclusive) of the safe, caution and danger bands
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub safe: f32,
    pub caution: f32,
    pub danger: f32,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            safe: 80.0,
            caution: 60.0,
            danger: 30.0,
        }
    }
}

impl RiskThresholds {
    /// Bands must be strictly descending inside (0, 100]
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ordered = self.safe <= 100.0
            && self.safe > self.caution
            && self.caution > self.danger
            && self.danger > 0.0;
        if ordered {
            Ok(())
        } else {
            Err(ConfigError::NonMonotonicRiskThresholds {
                safe: self.safe,
                caution: self.caution,
                danger: self.danger,
            })
        }
    }

    pub fn classify(&self, survival: f32) -> RiskLevel {
        if survival >= self.safe {
            RiskLevel::Safe
        } else if survival >= self.caution {
            RiskLevel::Caution
        } else if survival >= self.danger {
            RiskLevel::Danger
        } else {
            RiskLevel::Critical
        }
    }
}

/// Action tokens published to the crew
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recommendation {
    MaintainCourse,
    TurnLeft,
    TurnRight,
    ReduceSpeed,
    FullStop,
    Reverse,
    EmergencyManeuver,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::MaintainCourse => "maintain course",
            Recommendation::TurnLeft => "turn left",
            Recommendation::TurnRight => "turn right",
            Recommendation::ReduceSpeed => "reduce speed",
            Recommendation::FullStop => "full stop",
            Recommendation::Reverse => "reverse",
            Recommendation::EmergencyManeuver => "emergency maneuver",
        }
    }
}

/// Direction of survival over recent history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Improving,
    Deteriorating,
    Stable,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Improving => "improving",
            Trend::Deteriorating => "deteriorating",
            Trend::Stable => "stable",
        }
    }
}

/// One tick's published assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Rounded, in [0, 100]
    pub survival_percentage: f32,
    pub risk_level: RiskLevel,
    /// Distinct, priority ordered, at most three
    pub recommendations: Vec<Recommendation>,
    /// In [confidence_floor, base_confidence]
    pub confidence: f32,
    /// Time to impact of the primary threat
    pub time_to_impact: Option<f32>,
    /// Highest-severity threat
    pub nearest_threat: Option<Threat>,
    pub threat_count: usize,
    /// Escapes from the primary threat, easiest first
    pub avoidance: Vec<AvoidanceOption>,
}

impl Prediction {
    /// Assessment with nothing in range
    pub fn all_clear() -> Self {
        Self {
            survival_percentage: 100.0,
            risk_level: RiskLevel::Safe,
            recommendations: vec![Recommendation::MaintainCourse],
            confidence: 0.95,
            time_to_impact: None,
            nearest_threat: None,
            threat_count: 0,
            avoidance: Vec::new(),
        }
    }
}

/// Produces predictions and owns their history
#[derive(Debug, Clone, Default)]
pub struct OutcomePredictor {
    tuning: PredictorTuning,
    history: VecDeque<Prediction>,
}

impl OutcomePredictor {
    pub fn new(tuning: PredictorTuning) -> Self {
        let history = VecDeque::with_capacity(tuning.history_capacity);
        Self { tuning, history }
    }

    pub fn tuning(&self) -> &PredictorTuning {
        &self.tuning
    }

    /// Assess the situation and record it in history.
    ///
    /// `threats` must already be ranked; the first entry is the primary.
    pub fn predict(
        &mut self,
        threats: &[Threat],
        vessel: &Vessel,
        env: EnvironmentFactors,
        avoidance: Vec<AvoidanceOption>,
    ) -> Prediction {
        let survival_percentage = self.survival(threats, vessel, env);
        let risk_level = self.tuning.thresholds.classify(survival_percentage);
        let primary = threats.first();

        let prediction = Prediction {
            survival_percentage,
            risk_level,
            recommendations: self.recommend(primary, vessel, risk_level),
            confidence: self.confidence(threats, env),
            time_to_impact: primary.and_then(|t| t.time_to_impact),
            nearest_threat: primary.cloned(),
            threat_count: threats.len(),
            avoidance,
        };

        self.record(prediction.clone());
        prediction
    }

    fn survival(&self, threats: &[Threat], vessel: &Vessel, env: EnvironmentFactors) -> f32 {
        let maneuverability = 0.5 + 0.5 * vessel.steering_responsiveness();
        let resilience = (env.visibility * env.weather * maneuverability).max(MIN_MULTIPLIER);
        (100.0 - self.deficit(threats, vessel) / resilience)
            .clamp(0.0, 100.0)
            .round()
    }

    /// Percentage points lost to the current threats, before environment scaling
    fn deficit(&self, threats: &[Threat], vessel: &Vessel) -> f32 {
        let Some(primary) = threats.first() else {
            return 0.0;
        };
        let t = &self.tuning;
        let state = vessel.state();

        let proximity = (1.0 - primary.distance / t.distance_penalty_range).clamp(0.0, 1.0);
        let distance_penalty = t.distance_penalty_max * proximity;

        let max_speed = vessel.tuning().max_speed.max(MIN_MULTIPLIER);
        let speed_penalty = t.speed_penalty_max * (state.speed.abs() / max_speed).clamp(0.0, 1.0);

        let to_obstacle = planar(primary.obstacle_position - state.position).normalize_or_zero();
        let alignment = state.forward().dot(to_obstacle).max(0.0);
        let alignment_penalty = t.alignment_penalty_max * alignment;

        let weight = 0.5 + 0.5 * primary.collision_probability;
        let extra = t.extra_threat_penalty * (threats.len() - 1) as f32;
        (distance_penalty + speed_penalty + alignment_penalty) * weight + extra
    }

    fn recommend(
        &self,
        primary: Option<&Threat>,
        vessel: &Vessel,
        level: RiskLevel,
    ) -> Vec<Recommendation> {
        use Recommendation::*;

        let Some(primary) = primary else {
            return vec![MaintainCourse];
        };

        let state = vessel.state();
        let to_obstacle = planar(primary.obstacle_position - state.position);
        // Negative: obstacle lies to starboard of the bow
        let turn = if state.forward().cross(to_obstacle).y < 0.0 {
            TurnLeft
        } else {
            TurnRight
        };

        let template = match level {
            RiskLevel::Safe => vec![MaintainCourse],
            RiskLevel::Caution => vec![turn, ReduceSpeed],
            RiskLevel::Danger => vec![ReduceSpeed, turn],
            RiskLevel::Critical => vec![FullStop, turn, Reverse],
        };

        let urgent = primary
            .time_to_impact
            .is_some_and(|tti| tti < self.tuning.emergency_time_threshold);

        let mut out = Vec::with_capacity(MAX_RECOMMENDATIONS + 1);
        if urgent {
            out.push(EmergencyManeuver);
        }
        for r in template {
            if !out.contains(&r) {
                out.push(r);
            }
        }
        out.truncate(MAX_RECOMMENDATIONS);
        out
    }

    fn confidence(&self, threats: &[Threat], env: EnvironmentFactors) -> f32 {
        let t = &self.tuning;
        let mut confidence = t.base_confidence * (0.7 + 0.3 * env.visibility.clamp(0.0, 1.0));

        if threats.len() > t.complex_threat_count {
            confidence *= 0.9;
        }
        let nearest = threats
            .iter()
            .map(|th| th.distance)
            .min_by(|a, b| a.total_cmp(b));
        if nearest.is_some_and(|d| d < t.close_threat_distance) {
            confidence *= 0.85;
        }
        if let Some(stability) = self.stability() {
            confidence *= stability;
        }

        confidence.clamp(t.confidence_floor.min(t.base_confidence), t.base_confidence)
    }

    /// Variance-based stability of the most recent survival values
    fn stability(&self) -> Option<f32> {
        let window = self.tuning.stability_window;
        if window == 0 || self.history.len() < window {
            return None;
        }
        let recent: Vec<f32> = self
            .history
            .iter()
            .rev()
            .take(window)
            .map(|p| p.survival_percentage)
            .collect();
        let mean = recent.iter().sum::<f32>() / window as f32;
        let variance = recent.iter().map(|s| (s - mean).powi(2)).sum::<f32>() / window as f32;
        Some((1.0 - variance / 1000.0).clamp(0.1, 0.99))
    }

    fn record(&mut self, prediction: Prediction) {
        let capacity = self.tuning.history_capacity;
        if capacity == 0 {
            return;
        }
        while self.history.len() >= capacity {
            self.history.pop_front();
        }
        self.history.push_back(prediction);
    }

    /// Compare the latest window of survival values with the one before it
    pub fn trend(&self) -> Trend {
        let n = self.tuning.trend_window;
        if n == 0 || self.history.len() < n * 2 {
            return Trend::Stable;
        }
        let recent = mean_survival(self.history.iter().rev().take(n));
        let previous = mean_survival(self.history.iter().rev().skip(n).take(n));

        let delta = recent - previous;
        if delta > self.tuning.trend_delta {
            Trend::Improving
        } else if delta < -self.tuning.trend_delta {
            Trend::Deteriorating
        } else {
            Trend::Stable
        }
    }

    /// Oldest first
    pub fn history(&self) -> &VecDeque<Prediction> {
        &self.history
    }

    pub fn last(&self) -> Option<&Prediction> {
        self.history.back()
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}

fn mean_survival<'a>(entries: impl Iterator<Item = &'a Prediction>) -> f32 {
    let (sum, count) = entries.fold((0.0, 0usize), |(sum, count), p| {
        (sum + p.survival_percentage, count + 1)
    });
    if count == 0 { 0.0 } else { sum / count as f32 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{Difficulty, VesselTuning};
    use crate::sim::obstacle::SizeClass;
    use glam::Vec3;
    use proptest::prelude::*;

    fn vessel(speed: f32) -> Vessel {
        let mut v = Vessel::new(VesselTuning::default());
        v.set_underway(Vec3::ZERO, 0.0, speed);
        v
    }

    fn threat_at(position: Vec3, tti: f32) -> Threat {
        Threat {
            obstacle_id: 1,
            obstacle_position: position,
            size_class: SizeClass::Massive,
            is_distinguished: false,
            distance: position.length(),
            danger_radius: 90.0,
            closest_distance: position.x.abs(),
            time_to_impact: Some(tti),
            severity: 0.8,
            collision_probability: (1.0 - position.x.abs() / 90.0).clamp(0.0, 1.0),
        }
    }

    fn calm() -> EnvironmentFactors {
        Difficulty::Calm.factors()
    }

    #[test]
    fn test_risk_level_step_function() {
        let t = RiskThresholds::default();
        assert_eq!(t.classify(100.0), RiskLevel::Safe);
        assert_eq!(t.classify(80.0), RiskLevel::Safe);
        assert_eq!(t.classify(79.999), RiskLevel::Caution);
        assert_eq!(t.classify(60.0), RiskLevel::Caution);
        assert_eq!(t.classify(59.999), RiskLevel::Danger);
        assert_eq!(t.classify(30.0), RiskLevel::Danger);
        assert_eq!(t.classify(29.999), RiskLevel::Critical);
        assert_eq!(t.classify(0.0), RiskLevel::Critical);
    }

    #[test]
    fn test_thresholds_validate() {
        assert!(RiskThresholds::default().validate().is_ok());
        let overlapping = RiskThresholds {
            safe: 60.0,
            caution: 60.0,
            danger: 30.0,
        };
        assert!(matches!(
            overlapping.validate(),
            Err(ConfigError::NonMonotonicRiskThresholds { .. })
        ));
    }

    #[test]
    fn test_zero_threat_baseline_every_difficulty() {
        for difficulty in Difficulty::ALL {
            let mut p = OutcomePredictor::default();
            for speed in [0.0, 10.0, 20.0] {
                let out = p.predict(&[], &vessel(speed), difficulty.factors(), Vec::new());
                assert_eq!(out.survival_percentage, 100.0);
                assert_eq!(out.risk_level, RiskLevel::Safe);
                assert_eq!(out.recommendations, vec![Recommendation::MaintainCourse]);
                assert_eq!(out.time_to_impact, None);
                assert!(out.nearest_threat.is_none());
            }
        }
    }

    #[test]
    fn test_closer_threat_scores_lower() {
        let mut p = OutcomePredictor::default();
        let v = vessel(18.0);
        let far = p.predict(&[threat_at(Vec3::new(0.0, 0.0, -450.0), 20.0)], &v, calm(), Vec::new());
        let near = p.predict(&[threat_at(Vec3::new(0.0, 0.0, -120.0), 2.0)], &v, calm(), Vec::new());
        assert!(near.survival_percentage < far.survival_percentage);
        assert!(near.risk_level >= far.risk_level);
    }

    #[test]
    fn test_storm_scores_lower_than_calm() {
        let threats = [threat_at(Vec3::new(0.0, 0.0, -450.0), 20.0)];
        let v = vessel(8.0);
        let calm = OutcomePredictor::default().predict(&threats, &v, calm(), Vec::new());
        let storm = OutcomePredictor::default().predict(
            &threats,
            &v,
            Difficulty::Storm.factors(),
            Vec::new(),
        );
        assert!(storm.survival_percentage < calm.survival_percentage);
        assert!(storm.confidence < calm.confidence);
    }

    #[test]
    fn test_turn_direction_from_bearing() {
        let mut p = OutcomePredictor::default();
        let v = vessel(18.0);
        let starboard = p.predict(&[threat_at(Vec3::new(40.0, 0.0, -200.0), 8.0)], &v, calm(), Vec::new());
        assert!(starboard.recommendations.contains(&Recommendation::TurnLeft));
        let port = p.predict(&[threat_at(Vec3::new(-40.0, 0.0, -200.0), 8.0)], &v, calm(), Vec::new());
        assert!(port.recommendations.contains(&Recommendation::TurnRight));
    }

    #[test]
    fn test_emergency_first_when_impact_imminent() {
        let mut p = OutcomePredictor::default();
        let out = p.predict(&[threat_at(Vec3::new(5.0, 0.0, -100.0), 3.0)], &vessel(20.0), calm(), Vec::new());
        assert_eq!(out.recommendations[0], Recommendation::EmergencyManeuver);
        assert!(out.recommendations.len() <= MAX_RECOMMENDATIONS);
    }

    #[test]
    fn test_extra_threats_penalised() {
        let v = vessel(18.0);
        let one = [threat_at(Vec3::new(0.0, 0.0, -400.0), 17.0)];
        let mut many = one.to_vec();
        for i in 0..4 {
            many.push(threat_at(Vec3::new(60.0, 0.0, -500.0 - i as f32 * 50.0), 25.0));
        }
        let a = OutcomePredictor::default().predict(&one, &v, calm(), Vec::new());
        let b = OutcomePredictor::default().predict(&many, &v, calm(), Vec::new());
        assert!(b.survival_percentage < a.survival_percentage);
        assert!(b.confidence < a.confidence);
    }

    #[test]
    fn test_history_fifo_eviction() {
        let tuning = PredictorTuning {
            history_capacity: 5,
            ..Default::default()
        };
        let mut p = OutcomePredictor::new(tuning);
        let v = vessel(18.0);
        for i in 0..8 {
            let z = -100.0 - i as f32 * 40.0;
            p.predict(&[threat_at(Vec3::new(0.0, 0.0, z), 5.0)], &v, calm(), Vec::new());
        }
        assert_eq!(p.history().len(), 5);
        // Entries 0..3 were evicted; the oldest left is entry 3
        let oldest = p.history().front().unwrap();
        assert_eq!(oldest.nearest_threat.as_ref().unwrap().obstacle_position.z, -220.0);
    }

    #[test]
    fn test_trend_detection() {
        let mut p = OutcomePredictor::default();
        let v = vessel(18.0);
        assert_eq!(p.trend(), Trend::Stable);
        for _ in 0..10 {
            p.predict(&[threat_at(Vec3::new(0.0, 0.0, -60.0), 1.0)], &v, calm(), Vec::new());
        }
        for _ in 0..10 {
            p.predict(&[], &v, calm(), Vec::new());
        }
        assert_eq!(p.trend(), Trend::Improving);
        for _ in 0..20 {
            p.predict(&[threat_at(Vec3::new(0.0, 0.0, -60.0), 1.0)], &v, calm(), Vec::new());
        }
        assert_eq!(p.trend(), Trend::Stable);
    }

    #[test]
    fn test_unstable_history_lowers_confidence() {
        let mut p = OutcomePredictor::default();
        let v = vessel(18.0);
        for i in 0..10 {
            if i % 2 == 0 {
                p.predict(&[threat_at(Vec3::new(0.0, 0.0, -60.0), 1.0)], &v, calm(), Vec::new());
            } else {
                p.predict(&[], &v, calm(), Vec::new());
            }
        }
        let out = p.predict(&[], &v, calm(), Vec::new());
        assert!(out.confidence < 0.95);
        assert!(out.confidence >= p.tuning().confidence_floor);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut p = OutcomePredictor::default();
        p.predict(&[], &vessel(5.0), calm(), Vec::new());
        p.reset();
        assert!(p.history().is_empty());
        assert!(p.last().is_none());
    }

    proptest! {
        #[test]
        fn prop_risk_level_monotonic(a in 0.0f32..=100.0, b in 0.0f32..=100.0) {
            let t = RiskThresholds::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(t.classify(lo) >= t.classify(hi));
        }

        #[test]
        fn prop_history_never_exceeds_capacity(capacity in 1usize..20, n in 0usize..60) {
            let tuning = PredictorTuning { history_capacity: capacity, ..Default::default() };
            let mut p = OutcomePredictor::new(tuning);
            let v = vessel(10.0);
            for _ in 0..n {
                p.predict(&[], &v, calm(), Vec::new());
            }
            prop_assert_eq!(p.history().len(), n.min(capacity));
        }

        #[test]
        fn prop_prediction_bounds(
            x in -120.0f32..120.0,
            z in -600.0f32..-20.0,
            tti in 0.0f32..30.0,
            speed in 0.0f32..20.0,
            extra in 0usize..6,
        ) {
            let mut threats = vec![threat_at(Vec3::new(x, 0.0, z), tti)];
            threats.extend((0..extra).map(|i| threat_at(Vec3::new(0.0, 0.0, -300.0 - i as f32), 20.0)));
            let mut p = OutcomePredictor::default();
            let out = p.predict(&threats, &vessel(speed), Difficulty::Storm.factors(), Vec::new());
            prop_assert!((0.0..=100.0).contains(&out.survival_percentage));
            prop_assert!((0.0..=1.0).contains(&out.confidence));
            prop_assert!(!out.recommendations.is_empty());
            prop_assert!(out.recommendations.len() <= MAX_RECOMMENDATIONS);
            if tti < 10.0 {
                prop_assert_eq!(out.recommendations[0], Recommendation::EmergencyManeuver);
            }
        }
    }
}
