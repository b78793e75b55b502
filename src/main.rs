//! Bergwatch entry point
//!
//! Runs one headless session with a helmsman that follows the predictor's
//! recommendations, then reports the outcome.
//!
//! Usage: `bergwatch [difficulty] [seed]`. Tuning is read from
//! `bergwatch.json` when present.

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Bergwatch (native) starting...");

    if let Err(e) = native::run() {
        log::error!("Session aborted: {}", e);
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The simulation core is driven by the embedding page on the web
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use bergwatch::consts::VOYAGE_DURATION_SECS;
    use bergwatch::sim::{
        FixedStepper, PresentationSink, Recommendation, RiskLevel, SessionState, Snapshot,
        TickInput,
    };
    use bergwatch::{ConfigError, Difficulty, SimConfig};

    const DEFAULT_SEED: u64 = 1912;
    const CONFIG_PATH: &str = "bergwatch.json";
    /// Steering nudge per frame
    const HELM_STEP: f32 = 0.05;
    /// Extra time allowed for the survival requirement to be met
    const OVERTIME_SECS: f32 = 120.0;
    /// Simulated frame length fed to the stepper
    const FRAME_DT: f32 = 1.0 / 30.0;

    /// Logs risk changes and keeps the latest snapshot for the helm
    struct Bridge {
        latest: Option<Snapshot>,
        risk: RiskLevel,
    }

    impl PresentationSink for Bridge {
        fn present(&mut self, snapshot: &Snapshot) {
            let risk = snapshot.prediction.risk_level;
            if risk != self.risk {
                let advice: Vec<&str> = snapshot
                    .prediction
                    .recommendations
                    .iter()
                    .map(|r| r.as_str())
                    .collect();
                log::info!(
                    "t={:.1}s risk {} -> {} (survival {}%, advice: {})",
                    snapshot.elapsed,
                    self.risk.as_str(),
                    risk.as_str(),
                    snapshot.prediction.survival_percentage,
                    advice.join(", ")
                );
                self.risk = risk;
            }
            self.latest = Some(snapshot.clone());
        }
    }

    pub fn run() -> Result<(), ConfigError> {
        let mut args = std::env::args().skip(1);
        let difficulty = match args.next() {
            Some(label) => Difficulty::from_str(&label).unwrap_or_else(|| {
                log::warn!("Unknown difficulty '{}', using Calm", label);
                Difficulty::Calm
            }),
            None => Difficulty::default(),
        };
        let seed = args
            .next()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_SEED);
        let config = SimConfig::load_or_default(CONFIG_PATH)?;

        let mut state = SessionState::new(seed, difficulty, config)?;
        let mut stepper = FixedStepper::new();
        let mut bridge = Bridge {
            latest: None,
            risk: RiskLevel::Safe,
        };
        let mut input = TickInput::default();
        let deadline = VOYAGE_DURATION_SECS + OVERTIME_SECS;

        while !state.is_finished() && state.elapsed < deadline {
            stepper.advance(&mut state, &mut input, FRAME_DT, &mut bridge);
            if let Some(snapshot) = &bridge.latest {
                input = helm(snapshot, state.vessel.tuning().acceleration);
            }
        }

        let trend = state.predictor.trend();
        log::info!(
            "Session {} after {:.1}s: encounter {:?}, survival {}%, trend {}",
            state.phase.as_str(),
            state.elapsed,
            state.encounter,
            state.prediction.survival_percentage,
            trend.as_str()
        );
        println!(
            "{} | {} | seed {} | {:.1}s",
            state.phase.as_str(),
            difficulty.as_str(),
            seed,
            state.elapsed
        );
        Ok(())
    }

    /// Turn the latest advice into control events
    fn helm(snapshot: &Snapshot, acceleration: f32) -> TickInput {
        let mut input = TickInput::default();
        let steering = snapshot.vessel.steering_input;
        for advice in &snapshot.prediction.recommendations {
            match advice {
                Recommendation::EmergencyManeuver => input.emergency_maneuver = true,
                Recommendation::TurnLeft => input.steering = -HELM_STEP,
                Recommendation::TurnRight => input.steering = HELM_STEP,
                Recommendation::ReduceSpeed => input.throttle = -acceleration * FRAME_DT,
                Recommendation::FullStop => input.throttle = -2.0 * acceleration * FRAME_DT,
                Recommendation::Reverse => input.full_astern = snapshot.vessel.speed > 0.0,
                Recommendation::MaintainCourse => {
                    input.steering = -steering.signum() * steering.abs().min(HELM_STEP);
                }
            }
        }
        input
    }
}
