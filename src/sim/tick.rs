//! Fixed timestep simulation tick
//!
//! One tick runs the whole pipeline in order: control input, vessel and
//! field motion, threat analysis, prediction, then collision and outcome
//! bookkeeping.

use serde::{Deserialize, Serialize};

use super::predictor::Prediction;
use super::state::{Encounter, SessionPhase, SessionState};
use super::vessel::VesselStatus;
use crate::consts::*;
use crate::planar;

/// Control events for a single tick (deterministic)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickInput {
    /// Positive accelerates, negative decelerates
    pub throttle: f32,
    /// Added to the current steering input, positive = starboard
    pub steering: f32,
    pub emergency_maneuver: bool,
    pub full_astern: bool,
}

impl TickInput {
    /// Clear every event once it has been applied, so a frame's input
    /// counts once however many ticks the frame spans
    pub fn consume_events(&mut self) {
        self.throttle = 0.0;
        self.steering = 0.0;
        self.emergency_maneuver = false;
        self.full_astern = false;
    }
}

/// What the presentation layer sees after a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub time_ticks: u64,
    pub elapsed: f32,
    pub vessel: VesselStatus,
    pub prediction: Prediction,
    pub collision: bool,
    pub phase: SessionPhase,
    pub encounter: Encounter,
}

impl Snapshot {
    pub fn capture(state: &SessionState) -> Self {
        Self {
            time_ticks: state.time_ticks,
            elapsed: state.elapsed,
            vessel: state.vessel.status(),
            prediction: state.prediction.clone(),
            collision: state.collision,
            phase: state.phase,
            encounter: state.encounter,
        }
    }
}

/// Consumer of per-tick snapshots (renderer, audio, HUD, logger)
pub trait PresentationSink {
    fn present(&mut self, snapshot: &Snapshot);
}

impl<F: FnMut(&Snapshot)> PresentationSink for F {
    fn present(&mut self, snapshot: &Snapshot) {
        self(snapshot)
    }
}

/// Advance the session by `dt` seconds. A zero or negative step changes nothing.
pub fn tick(state: &mut SessionState, input: &TickInput, dt: f32) -> Snapshot {
    if !(dt > 0.0) {
        return Snapshot::capture(state);
    }

    // Finished sessions keep settling but take no orders
    if !state.is_finished() {
        apply_input(state, input);
    }

    state.vessel.tick(dt);
    state.field.update(dt);

    state.threats = state.analyzer.analyze(state.vessel.state(), &state.field);
    let avoidance = state
        .threats
        .first()
        .map(|primary| {
            state.analyzer.avoidance_options(
                state.vessel.state(),
                state.vessel.tuning().max_speed,
                primary,
            )
        })
        .unwrap_or_default();
    let env = state.environment();
    state.prediction = state
        .predictor
        .predict(&state.threats, &state.vessel, env, avoidance);

    state.time_ticks += 1;
    state.elapsed += dt;

    check_collision(state);
    if !state.is_finished() {
        update_encounter(state, dt);
        check_voyage_complete(state);
    }

    Snapshot::capture(state)
}

fn apply_input(state: &mut SessionState, input: &TickInput) {
    let vessel = &mut state.vessel;
    if input.throttle > 0.0 {
        vessel.accelerate(input.throttle);
    } else if input.throttle < 0.0 {
        vessel.decelerate(-input.throttle);
    }
    if input.steering != 0.0 {
        vessel.adjust_steering(input.steering);
    }
    if input.emergency_maneuver {
        vessel.activate_emergency_maneuver();
    }
    if input.full_astern {
        vessel.full_astern();
    }
}

fn check_collision(state: &mut SessionState) {
    if state.collision {
        return;
    }
    let hull = state.vessel.bounds();
    let Some(hit) = state.field.first_collision(&hull) else {
        return;
    };
    let (hit_id, hit_class, hit_distinguished) = (hit.id, hit.size_class, hit.is_distinguished);

    state.collision = true;
    log::warn!(
        "Collision with {} obstacle {} at t={:.1}s",
        hit_class.as_str(),
        hit_id,
        state.elapsed
    );
    state.vessel.start_sinking();
    if hit_distinguished {
        state.encounter = Encounter::Struck;
    }
    if state.phase == SessionPhase::Playing {
        state.phase = SessionPhase::Lost;
        log::info!("Session lost after {:.1}s", state.elapsed);
    }
}

fn update_encounter(state: &mut SessionState, dt: f32) {
    if state.encounter.is_resolved() {
        return;
    }
    let Some(target) = state.field.distinguished() else {
        return;
    };
    let distance = planar(target.position - state.vessel.state().position).length();
    let clearance = target.scale * state.config.encounter.clearance_per_scale;

    state.encounter = match state.encounter {
        Encounter::NotSpotted if distance <= state.config.encounter.spotting_distance => {
            log::info!("Distinguished obstacle spotted at {:.0}", distance);
            Encounter::Spotted {
                countdown: state.config.encounter.reaction_budget_secs,
            }
        }
        Encounter::Spotted { countdown } => {
            let countdown = (countdown - dt).max(0.0);
            if countdown <= 0.0 && distance > clearance {
                log::info!("Distinguished obstacle avoided ({:.0} clear)", distance);
                Encounter::Avoided
            } else {
                Encounter::Spotted { countdown }
            }
        }
        other => other,
    };
}

fn check_voyage_complete(state: &mut SessionState) {
    if state.elapsed >= VOYAGE_DURATION_SECS
        && state.prediction.survival_percentage > VOYAGE_MIN_SURVIVAL
    {
        state.phase = SessionPhase::Won;
        log::info!(
            "Voyage complete after {:.1}s (survival {}%)",
            state.elapsed,
            state.prediction.survival_percentage
        );
    }
}

/// Drives `tick` from variable frame times with a fixed-step accumulator
#[derive(Debug, Clone, Default)]
pub struct FixedStepper {
    accumulator: f32,
}

impl FixedStepper {
    /// Longest frame accepted before time is dropped
    pub const MAX_FRAME_DT: f32 = 0.25;

    pub fn new() -> Self {
        Self::default()
    }

    /// Run as many fixed ticks as `frame_dt` allows (bounded by
    /// `MAX_SUBSTEPS`), presenting the last snapshot. Events in `input` are
    /// consumed by the first tick. Returns the ticks run.
    pub fn advance(
        &mut self,
        state: &mut SessionState,
        input: &mut TickInput,
        frame_dt: f32,
        sink: &mut impl PresentationSink,
    ) -> u32 {
        if frame_dt.is_finite() && frame_dt > 0.0 {
            self.accumulator += frame_dt.min(Self::MAX_FRAME_DT);
        }

        let mut substeps = 0;
        let mut last = None;
        while self.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            last = Some(tick(state, input, SIM_DT));
            input.consume_events();
            self.accumulator -= SIM_DT;
            substeps += 1;
        }

        if let Some(snapshot) = last {
            sink.present(&snapshot);
        }
        substeps
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{Difficulty, SimConfig};
    use crate::sim::obstacle::{Obstacle, SizeClass};
    use crate::sim::vessel::VesselPhase;
    use glam::Vec3;

    /// Empty sea with a single massive obstacle `distance` dead ahead
    fn single_obstacle(distance: f32, distinguished: bool) -> SessionState {
        let mut state = SessionState::open_water(1, Difficulty::Calm, SimConfig::default()).unwrap();
        let mut obstacle = Obstacle::with_class(
            0,
            Vec3::new(0.0, 0.0, -distance),
            Vec3::ZERO,
            SizeClass::Massive,
            3.0,
        );
        obstacle.is_distinguished = distinguished;
        state.field.insert(obstacle);
        state
    }

    fn hard_starboard() -> TickInput {
        TickInput {
            steering: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_collision_course() {
        let mut state = single_obstacle(450.0, true);
        let input = TickInput::default();
        let mut last_tti: Option<f32> = None;

        for _ in 0..(40.0 / SIM_DT) as usize {
            let snapshot = tick(&mut state, &input, SIM_DT);
            if snapshot.collision {
                break;
            }
            let tti = snapshot
                .prediction
                .time_to_impact
                .expect("obstacle dead ahead must be reported");
            if let Some(prev) = last_tti {
                if prev > 0.0 {
                    assert!(tti < prev, "tti went from {} to {}", prev, tti);
                } else {
                    assert_eq!(tti, 0.0);
                }
            }
            last_tti = Some(tti);
        }

        assert!(state.collision);
        assert!(state.field.check_collision(&state.vessel.bounds()));
        assert_eq!(state.phase, SessionPhase::Lost);
        assert_eq!(state.encounter, Encounter::Struck);
        assert_eq!(state.vessel.state().phase, VesselPhase::Sinking);
        assert!((20.0..22.0).contains(&state.elapsed));
    }

    #[test]
    fn test_hard_turn_avoids_obstacle() {
        let mut state = single_obstacle(450.0, true);
        let input = hard_starboard();
        for _ in 0..(40.0 / SIM_DT) as usize {
            tick(&mut state, &input, SIM_DT);
        }
        assert!(!state.collision);
        assert_eq!(state.phase, SessionPhase::Playing);
        assert_eq!(state.encounter, Encounter::Avoided);
    }

    #[test]
    fn test_turn_with_reaction_budget_clears() {
        let budget = SimConfig::default().encounter.reaction_budget_secs;
        let mut state = single_obstacle(1000.0, false);

        // Hold course until impact is one reaction budget away
        let hold = (1000.0 - START_SPEED * budget) / START_SPEED;
        let idle = TickInput::default();
        while state.elapsed < hold {
            tick(&mut state, &idle, SIM_DT);
        }

        let input = hard_starboard();
        for _ in 0..(60.0 / SIM_DT) as usize {
            tick(&mut state, &input, SIM_DT);
        }
        assert!(!state.collision);
        assert_eq!(state.vessel.state().phase, VesselPhase::Running);
    }

    #[test]
    fn test_zero_dt_is_noop() {
        let mut state = SessionState::new(3, Difficulty::Rough, SimConfig::default()).unwrap();
        tick(&mut state, &TickInput::default(), SIM_DT);

        let vessel = state.vessel.state().clone();
        let obstacles = state.field.obstacles().to_vec();
        let history = state.predictor.history().len();
        let ticks = state.time_ticks;

        let input = TickInput {
            throttle: 5.0,
            steering: 1.0,
            emergency_maneuver: true,
            full_astern: true,
        };
        tick(&mut state, &input, 0.0);

        assert_eq!(state.vessel.state(), &vessel);
        assert_eq!(state.field.obstacles(), obstacles.as_slice());
        assert_eq!(state.predictor.history().len(), history);
        assert_eq!(state.time_ticks, ticks);
    }

    #[test]
    fn test_determinism() {
        let mut a = SessionState::new(99999, Difficulty::Storm, SimConfig::default()).unwrap();
        let mut b = SessionState::new(99999, Difficulty::Storm, SimConfig::default()).unwrap();

        let inputs = [
            TickInput {
                steering: -0.5,
                ..Default::default()
            },
            TickInput {
                throttle: -2.0,
                emergency_maneuver: true,
                ..Default::default()
            },
            TickInput::default(),
        ];

        for i in 0..600 {
            let input = &inputs[i % inputs.len()];
            let sa = tick(&mut a, input, SIM_DT);
            let sb = tick(&mut b, input, SIM_DT);
            assert_eq!(sa, sb);
        }
        assert_eq!(a.vessel.state(), b.vessel.state());
    }

    #[test]
    fn test_voyage_won_in_open_water() {
        let mut state = SessionState::open_water(5, Difficulty::Calm, SimConfig::default()).unwrap();
        let input = TickInput::default();
        while !state.is_finished() && state.elapsed < VOYAGE_DURATION_SECS + 1.0 {
            tick(&mut state, &input, 0.5);
        }
        assert_eq!(state.phase, SessionPhase::Won);
        assert_eq!(state.prediction.survival_percentage, 100.0);

        let speed = state.vessel.state().speed;
        tick(
            &mut state,
            &TickInput {
                throttle: -10.0,
                ..Default::default()
            },
            0.5,
        );
        assert_eq!(state.vessel.state().speed, speed);
    }

    #[test]
    fn test_sinking_vessel_ignores_orders() {
        let mut state = single_obstacle(450.0, false);
        while !state.collision && state.elapsed < 40.0 {
            tick(&mut state, &TickInput::default(), SIM_DT);
        }
        assert!(state.collision);
        assert_eq!(state.encounter, Encounter::NotSpotted);

        let y = state.vessel.state().position.y;
        let snapshot = tick(
            &mut state,
            &TickInput {
                throttle: 10.0,
                ..Default::default()
            },
            1.0,
        );
        assert_eq!(snapshot.vessel.speed, 0.0);
        assert!(snapshot.vessel.position.y < y);
        assert_eq!(snapshot.phase, SessionPhase::Lost);
    }

    #[test]
    fn test_stepper_bounds_substeps_and_consumes_one_shots() {
        let mut state = SessionState::open_water(2, Difficulty::Calm, SimConfig::default()).unwrap();
        let mut stepper = FixedStepper::new();
        let mut input = TickInput {
            emergency_maneuver: true,
            ..Default::default()
        };
        let mut presented = Vec::new();
        let mut sink = |s: &Snapshot| presented.push(s.time_ticks);

        let ran = stepper.advance(&mut state, &mut input, 1.0, &mut sink);
        assert_eq!(ran, MAX_SUBSTEPS);
        assert!(!input.emergency_maneuver);
        assert!(state.vessel.state().emergency_active);

        let ran = stepper.advance(&mut state, &mut input, 0.0, &mut sink);
        assert!(ran <= MAX_SUBSTEPS);
        assert_eq!(presented.first(), Some(&(MAX_SUBSTEPS as u64)));
    }

    #[test]
    fn test_frame_input_applies_once_regardless_of_substeps() {
        let steer = |frame_dt: f32| {
            let mut state =
                SessionState::open_water(4, Difficulty::Calm, SimConfig::default()).unwrap();
            let mut stepper = FixedStepper::new();
            let mut input = TickInput {
                throttle: -1.0,
                steering: 0.1,
                ..Default::default()
            };
            let ran = stepper.advance(&mut state, &mut input, frame_dt, &mut |_: &Snapshot| {});
            assert_eq!(input.steering, 0.0);
            assert_eq!(input.throttle, 0.0);
            (ran, state.vessel.state().steering_input, state.vessel.state().speed)
        };

        let (short_ran, short_steering, short_speed) = steer(SIM_DT * 1.5);
        let (long_ran, long_steering, long_speed) = steer(1.0);
        assert_eq!(short_ran, 1);
        assert_eq!(long_ran, MAX_SUBSTEPS);
        assert_eq!(short_steering, 0.1);
        assert_eq!(long_steering, short_steering);
        assert_eq!(long_speed, START_SPEED - 1.0);
        assert_eq!(long_speed, short_speed);
    }
}
