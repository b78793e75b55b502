//! Threat analysis
//!
//! Projects the vessel's current velocity as a straight line and checks each
//! obstacle's danger radius against it. Obstacles the projected path would
//! enter within the look-ahead horizon become threats, ranked by severity.

use std::cmp::Ordering;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::obstacle::{Obstacle, ObstacleField, SizeClass};
use super::vessel::VesselState;
use crate::settings::ThreatTuning;
use crate::{bearing_of, normalize_angle, planar};

/// Speeds below this are treated as stationary
const MIN_CLOSING_SPEED: f32 = 1e-3;
/// Extra clearance beyond the danger radius for avoidance targets
const AVOIDANCE_MARGIN: f32 = 30.0;

/// One obstacle on a projected collision course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threat {
    pub obstacle_id: u32,
    pub obstacle_position: Vec3,
    pub size_class: SizeClass,
    pub is_distinguished: bool,
    /// Current straight-line distance
    pub distance: f32,
    pub danger_radius: f32,
    /// Distance from the obstacle to the projected path
    pub closest_distance: f32,
    /// Seconds until the path enters the danger radius; 0 once inside
    pub time_to_impact: Option<f32>,
    /// Ranking score, higher is worse
    pub severity: f32,
    /// How deeply the path cuts into the danger radius, in [0, 1]
    pub collision_probability: f32,
}

/// Escape maneuver kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AvoidanceDirection {
    Left,
    Right,
    Stop,
}

/// A candidate escape from a threat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvoidanceOption {
    pub direction: AvoidanceDirection,
    /// Point to steer for (the vessel's own position for `Stop`)
    pub target: Vec3,
    /// 0 = trivial, 1 = hardest
    pub difficulty: f32,
}

/// Descending severity, ties by ascending distance
pub fn by_severity(a: &Threat, b: &Threat) -> Ordering {
    b.severity
        .total_cmp(&a.severity)
        .then_with(|| a.distance.total_cmp(&b.distance))
}

/// Stateless per-tick threat ranking
#[derive(Debug, Clone, Default)]
pub struct ThreatAnalyzer {
    tuning: ThreatTuning,
}

impl ThreatAnalyzer {
    pub fn new(tuning: ThreatTuning) -> Self {
        Self { tuning }
    }

    pub fn tuning(&self) -> &ThreatTuning {
        &self.tuning
    }

    /// Danger radius for a size class
    #[inline]
    pub fn danger_radius(&self, class: SizeClass) -> f32 {
        self.tuning.danger_radii[class.index()]
    }

    /// Every in-horizon threat, most severe first
    pub fn analyze(&self, vessel: &VesselState, field: &ObstacleField) -> Vec<Threat> {
        let mut threats: Vec<Threat> = field
            .obstacles()
            .iter()
            .filter_map(|o| self.assess(vessel, o))
            .collect();
        threats.sort_by(by_severity);
        threats
    }

    /// Evaluate a single obstacle; `None` when it is not a threat
    pub fn assess(&self, vessel: &VesselState, obstacle: &Obstacle) -> Option<Threat> {
        let t = &self.tuning;
        let rel = planar(obstacle.position - vessel.position);
        let distance = rel.length();
        let danger_radius = self.danger_radius(obstacle.size_class);

        let velocity = planar(vessel.velocity);
        let speed = velocity.length();

        let reach = t.prefilter_factor * danger_radius + speed * t.look_ahead_secs;
        if distance > reach {
            return None;
        }
        if speed < MIN_CLOSING_SPEED {
            return None;
        }

        let dir = velocity / speed;
        let along = rel.dot(dir);
        if along <= 0.0 {
            return None;
        }

        let closest_distance = (rel - dir * along).length();
        if closest_distance > danger_radius {
            return None;
        }

        let half_chord = (danger_radius * danger_radius - closest_distance * closest_distance)
            .max(0.0)
            .sqrt();
        let time_to_impact = (along - half_chord).max(0.0) / speed;
        if time_to_impact > t.look_ahead_secs {
            return None;
        }

        let proximity = danger_radius / distance.max(danger_radius);
        let urgency = t.urgency_time_scale / (t.urgency_time_scale + time_to_impact);
        let severity = t.proximity_weight * proximity
            + t.urgency_weight * urgency
            + t.size_weight * obstacle.size_class.severity_factor();
        let collision_probability = (1.0 - closest_distance / danger_radius).clamp(0.0, 1.0);

        Some(Threat {
            obstacle_id: obstacle.id,
            obstacle_position: obstacle.position,
            size_class: obstacle.size_class,
            is_distinguished: obstacle.is_distinguished,
            distance,
            danger_radius,
            closest_distance,
            time_to_impact: Some(time_to_impact),
            severity,
            collision_probability,
        })
    }

    /// Left, right and stop escapes from `threat`, easiest first
    pub fn avoidance_options(
        &self,
        vessel: &VesselState,
        max_speed: f32,
        threat: &Threat,
    ) -> Vec<AvoidanceOption> {
        let to_obstacle = planar(threat.obstacle_position - vessel.position).normalize_or_zero();
        let starboard = Vec3::new(-to_obstacle.z, 0.0, to_obstacle.x);
        let clearance = threat.danger_radius + AVOIDANCE_MARGIN;
        let speed = vessel.speed.abs();

        let left = threat.obstacle_position - starboard * clearance;
        let right = threat.obstacle_position + starboard * clearance;

        let mut options = vec![
            AvoidanceOption {
                direction: AvoidanceDirection::Left,
                target: left,
                difficulty: maneuver_difficulty(vessel, max_speed, left),
            },
            AvoidanceOption {
                direction: AvoidanceDirection::Right,
                target: right,
                difficulty: maneuver_difficulty(vessel, max_speed, right),
            },
            AvoidanceOption {
                direction: AvoidanceDirection::Stop,
                target: vessel.position,
                difficulty: (speed / max_speed.max(MIN_CLOSING_SPEED)).clamp(0.0, 1.0),
            },
        ];
        options.sort_by(|a, b| a.difficulty.total_cmp(&b.difficulty));
        options
    }
}

/// Weighted distance, speed and turn-angle difficulty of steering for `target`
fn maneuver_difficulty(vessel: &VesselState, max_speed: f32, target: Vec3) -> f32 {
    let distance = planar(target - vessel.position).length();
    let turn = normalize_angle(bearing_of(vessel.position, target) - vessel.heading);

    let distance_factor = (distance / 100.0).min(1.0);
    let speed_factor = (vessel.speed.abs() / max_speed.max(MIN_CLOSING_SPEED)).min(1.0);
    let angle_factor = turn.abs() / std::f32::consts::PI;

    distance_factor * 0.3 + speed_factor * 0.4 + angle_factor * 0.3
}
