//! Vessel dynamics
//!
//! Steering is deliberately second order: the rudder (`actual_steering`)
//! relaxes exponentially toward the commanded input, and the hull's yaw rate
//! in turn relaxes toward the rate the rudder asks for. Heading integrates
//! the yaw rate, so a large hull keeps swinging after the helm is centred
//! and takes time to start swinging when it is put over.

use std::f32::consts::FRAC_PI_4;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::collision::Aabb;
use crate::settings::VesselTuning;
use crate::{heading_to_direction, normalize_angle, planar};

/// Lifecycle of a vessel. Sinking is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VesselPhase {
    #[default]
    Running,
    Sinking,
}

/// Engine room status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EngineStatus {
    #[default]
    Running,
    FullReverse,
    Failed,
}

/// Yaw rates below this are treated as not turning
const MIN_YAW_RATE: f32 = 1e-6;
/// Settling rate of a sinking hull (units/s)
const SINK_RATE: f32 = 2.0;
/// Velocity decay rate while sinking (1/s)
const SINK_VELOCITY_DECAY: f32 = 3.0;
/// Morale cost of ordering an emergency maneuver
const EMERGENCY_MORALE_COST: f32 = 20.0;
const EMERGENCY_MORALE_FLOOR: f32 = 50.0;
/// Responsiveness bonus while an emergency maneuver is active
const EMERGENCY_RESPONSIVENESS_BONUS: f32 = 0.5;

/// Complete vessel state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VesselState {
    pub position: Vec3,
    /// Hull velocity; lags `forward * speed` by the drag time constant
    pub velocity: Vec3,
    /// Radians in (-π, π], 0 = along -Z, positive = starboard
    pub heading: f32,
    /// Engine-set speed, negative when going astern
    pub speed: f32,
    /// Commanded steering in [-1, 1], positive = starboard
    pub steering_input: f32,
    /// Rudder position in [-1, 1], lagging `steering_input`
    pub actual_steering: f32,
    /// Hull swing rate (rad/s)
    pub yaw_rate: f32,
    pub emergency_active: bool,
    pub emergency_elapsed: f32,
    pub phase: VesselPhase,
    pub engine_status: EngineStatus,
    /// Visual rudder deflection (radians)
    pub rudder_angle: f32,
    /// 0-100
    pub crew_morale: f32,
}

impl Default for VesselState {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            heading: 0.0,
            speed: 0.0,
            steering_input: 0.0,
            actual_steering: 0.0,
            yaw_rate: 0.0,
            emergency_active: false,
            emergency_elapsed: 0.0,
            phase: VesselPhase::Running,
            engine_status: EngineStatus::Running,
            rudder_angle: 0.0,
            crew_morale: 100.0,
        }
    }
}

impl VesselState {
    #[inline]
    pub fn forward(&self) -> Vec3 {
        heading_to_direction(self.heading)
    }

    #[inline]
    pub fn is_sinking(&self) -> bool {
        self.phase == VesselPhase::Sinking
    }
}

/// Per-tick summary published to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VesselStatus {
    pub position: Vec3,
    pub heading: f32,
    pub speed: f32,
    pub steering_input: f32,
    pub actual_steering: f32,
    pub responsiveness: f32,
    pub emergency_active: bool,
    pub engine_status: EngineStatus,
    pub rudder_angle: f32,
    pub crew_morale: f32,
    pub phase: VesselPhase,
}

/// A vessel and its handling characteristics
#[derive(Debug, Clone)]
pub struct Vessel {
    state: VesselState,
    tuning: VesselTuning,
}

impl Vessel {
    pub fn new(tuning: VesselTuning) -> Self {
        Self {
            state: VesselState::default(),
            tuning,
        }
    }

    pub fn state(&self) -> &VesselState {
        &self.state
    }

    pub fn tuning(&self) -> &VesselTuning {
        &self.tuning
    }

    /// Place the vessel already making way at `speed` on `heading`
    pub fn set_underway(&mut self, position: Vec3, heading: f32, speed: f32) {
        let s = &mut self.state;
        s.position = position;
        s.heading = normalize_angle(heading);
        s.speed = speed.clamp(self.tuning.min_reverse_speed, self.tuning.max_speed);
        s.velocity = s.forward() * s.speed;
    }

    pub fn accelerate(&mut self, amount: f32) {
        if self.state.is_sinking() {
            return;
        }
        let amount = amount.max(0.0);
        let s = &mut self.state;
        s.speed = (s.speed + amount).clamp(self.tuning.min_reverse_speed, self.tuning.max_speed);
        if s.speed >= 0.0 && s.engine_status == EngineStatus::FullReverse {
            s.engine_status = EngineStatus::Running;
        }
    }

    /// Bring speed toward zero from either direction
    pub fn decelerate(&mut self, amount: f32) {
        if self.state.is_sinking() {
            return;
        }
        let amount = amount.max(0.0);
        let s = &mut self.state;
        s.speed = if s.speed > 0.0 {
            (s.speed - amount).max(0.0)
        } else {
            (s.speed + amount).min(0.0)
        };
    }

    /// Record the commanded steering. Heading responds over later ticks.
    pub fn set_steering_input(&mut self, value: f32) {
        if self.state.is_sinking() || !value.is_finite() {
            return;
        }
        self.state.steering_input = value.clamp(-1.0, 1.0);
    }

    /// Nudge the commanded steering by `delta`
    pub fn adjust_steering(&mut self, delta: f32) {
        let target = self.state.steering_input + delta;
        self.set_steering_input(target);
    }

    /// One-shot turn-rate boost. Fails if one is already running or the vessel is sinking.
    pub fn activate_emergency_maneuver(&mut self) -> bool {
        let s = &mut self.state;
        if s.is_sinking() || s.emergency_active {
            return false;
        }
        s.emergency_active = true;
        s.emergency_elapsed = 0.0;
        s.crew_morale = (s.crew_morale - EMERGENCY_MORALE_COST).max(EMERGENCY_MORALE_FLOOR);
        log::info!("Emergency maneuver activated");
        true
    }

    /// Put the engines in reverse
    pub fn full_astern(&mut self) {
        if self.state.is_sinking() {
            return;
        }
        let s = &mut self.state;
        s.speed = (s.speed - self.tuning.acceleration * 2.0).max(self.tuning.min_reverse_speed);
        s.engine_status = EngineStatus::FullReverse;
        log::info!("Full astern (speed {:.1})", s.speed);
    }

    /// Begin sinking. There is no way back to Running.
    pub fn start_sinking(&mut self) {
        let s = &mut self.state;
        if s.is_sinking() {
            return;
        }
        s.phase = VesselPhase::Sinking;
        s.engine_status = EngineStatus::Failed;
        s.crew_morale = 0.0;
        s.speed = 0.0;
        s.steering_input = 0.0;
        s.emergency_active = false;
        s.emergency_elapsed = 0.0;
        log::warn!("Vessel is sinking at {:?}", s.position);
    }

    /// Fraction of base turn rate left at the current speed
    pub fn speed_factor(&self) -> f32 {
        let ratio = (self.state.speed.abs() / self.tuning.max_speed).clamp(0.0, 1.0);
        1.0 - ratio * self.tuning.high_speed_turn_penalty
    }

    /// Yaw rate the hull settles to at full rudder (rad/s)
    pub fn turn_rate(&self) -> f32 {
        let boost = if self.state.emergency_active {
            self.tuning.emergency_turn_multiplier
        } else {
            1.0
        };
        self.tuning.base_turn_rate * self.speed_factor() * boost
    }

    /// Normalized handling in [0.1, 1]: lower when fast, higher under emergency
    pub fn steering_responsiveness(&self) -> f32 {
        let penalty = (self.state.speed.abs() / self.tuning.max_speed).clamp(0.0, 1.0);
        let bonus = if self.state.emergency_active {
            EMERGENCY_RESPONSIVENESS_BONUS
        } else {
            0.0
        };
        (1.0 - penalty + bonus).clamp(0.1, 1.0)
    }

    /// Current turning circle radius, `None` when not turning
    pub fn turning_radius(&self) -> Option<f32> {
        let yaw = self.state.yaw_rate.abs();
        if yaw < MIN_YAW_RATE {
            None
        } else {
            Some(self.state.speed.abs() / yaw)
        }
    }

    /// Whether the swing achievable within `time_to_impact` is enough to
    /// bear at least 45 degrees off the obstacle
    pub fn can_avoid(&self, obstacle_position: Vec3, time_to_impact: f32) -> bool {
        let rate = self.tuning.base_turn_rate * self.steering_responsiveness();
        let max_turn = rate * time_to_impact.max(0.0);
        let to_obstacle = planar(obstacle_position - self.state.position).normalize_or_zero();
        let off_bow = self.state.forward().dot(to_obstacle).clamp(-1.0, 1.0).acos();
        let needed = (FRAC_PI_4 - off_bow).max(0.0);
        max_turn >= needed
    }

    pub fn status(&self) -> VesselStatus {
        let s = &self.state;
        VesselStatus {
            position: s.position,
            heading: s.heading,
            speed: s.speed,
            steering_input: s.steering_input,
            actual_steering: s.actual_steering,
            responsiveness: self.steering_responsiveness(),
            emergency_active: s.emergency_active,
            engine_status: s.engine_status,
            rudder_angle: s.rudder_angle,
            crew_morale: s.crew_morale,
            phase: s.phase,
        }
    }

    /// World-space hull volume
    pub fn bounds(&self) -> Aabb {
        Aabb::hull(self.state.position, self.state.heading)
    }

    /// Advance by `dt` seconds. A zero or negative step changes nothing.
    pub fn tick(&mut self, dt: f32) {
        if !(dt > 0.0) {
            return;
        }
        if self.state.is_sinking() {
            self.tick_sinking(dt);
            return;
        }

        // Rudder lag
        let rudder_alpha = 1.0 - (-dt / self.tuning.steering_delay).exp();
        {
            let s = &mut self.state;
            s.actual_steering += (s.steering_input - s.actual_steering) * rudder_alpha;
            s.actual_steering = s.actual_steering.clamp(-1.0, 1.0);
        }

        // Boost applies for the tick in which it runs out
        let turn_rate = self.turn_rate();
        if self.state.emergency_active {
            self.state.emergency_elapsed += dt;
            if self.state.emergency_elapsed >= self.tuning.emergency_duration {
                self.state.emergency_active = false;
                self.state.emergency_elapsed = 0.0;
                log::info!("Emergency maneuver ended");
            }
        }

        let s = &mut self.state;

        // Hull yaw momentum
        let target_yaw = s.actual_steering * turn_rate;
        let yaw_alpha = 1.0 - (-dt / self.tuning.turn_momentum_time).exp();
        s.yaw_rate += (target_yaw - s.yaw_rate) * yaw_alpha;
        s.heading = normalize_angle(s.heading + s.yaw_rate * dt);

        // Translation and drag
        let forward = s.forward();
        s.position += forward * s.speed * dt;
        let drag_alpha = 1.0 - (-dt / self.tuning.drag_time).exp();
        s.velocity += (forward * s.speed - s.velocity) * drag_alpha;

        s.rudder_angle = s.actual_steering * self.tuning.max_rudder_angle;
    }

    fn tick_sinking(&mut self, dt: f32) {
        let s = &mut self.state;
        s.position.y -= SINK_RATE * dt;
        s.velocity *= (-SINK_VELOCITY_DECAY * dt).exp();
        s.yaw_rate *= (-SINK_VELOCITY_DECAY * dt).exp();
    }

    /// Back to the initial stopped state at the origin
    pub fn reset(&mut self) {
        self.state = VesselState::default();
    }
}
