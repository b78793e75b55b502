//! Session state
//!
//! Everything one voyage owns: the vessel, the ice field, the analysis
//! components and the scripted encounter with the distinguished obstacle.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::obstacle::ObstacleField;
use super::predictor::{OutcomePredictor, Prediction};
use super::threat::{Threat, ThreatAnalyzer};
use super::vessel::Vessel;
use crate::consts::START_SPEED;
use crate::error::ConfigError;
use crate::settings::{Difficulty, EnvironmentFactors, SimConfig};

/// Outcome of the session so far
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionPhase {
    #[default]
    Playing,
    /// Voyage completed with survival above the minimum
    Won,
    /// The hull struck an obstacle
    Lost,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Playing => "playing",
            SessionPhase::Won => "won",
            SessionPhase::Lost => "lost",
        }
    }
}

/// Progress of the scripted encounter with the distinguished obstacle
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Encounter {
    #[default]
    NotSpotted,
    /// Lookouts have it; `countdown` seconds of reaction budget remain
    Spotted { countdown: f32 },
    Avoided,
    Struck,
}

impl Encounter {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Encounter::Avoided | Encounter::Struck)
    }
}

/// One navigation session
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Field seed for reproducibility
    pub seed: u64,
    pub difficulty: Difficulty,
    pub config: SimConfig,
    pub phase: SessionPhase,
    /// Simulation tick counter
    pub time_ticks: u64,
    /// Simulated seconds since the session started
    pub elapsed: f32,
    pub vessel: Vessel,
    pub field: ObstacleField,
    pub analyzer: ThreatAnalyzer,
    pub predictor: OutcomePredictor,
    pub encounter: Encounter,
    /// Set once the hull has touched an obstacle
    pub collision: bool,
    /// Threats from the latest tick, most severe first
    pub threats: Vec<Threat>,
    /// Prediction from the latest tick
    pub prediction: Prediction,
}

impl SessionState {
    /// Validate `config`, generate the field and put the vessel underway
    pub fn new(seed: u64, difficulty: Difficulty, config: SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut state = Self {
            seed,
            difficulty,
            vessel: Vessel::new(config.vessel.clone()),
            field: ObstacleField::new(seed, config.field.clone()),
            analyzer: ThreatAnalyzer::new(config.threat.clone()),
            predictor: OutcomePredictor::new(config.predictor.clone()),
            config,
            phase: SessionPhase::Playing,
            time_ticks: 0,
            elapsed: 0.0,
            encounter: Encounter::NotSpotted,
            collision: false,
            threats: Vec::new(),
            prediction: Prediction::all_clear(),
        };
        state.start()?;
        log::info!(
            "Session started: seed={} difficulty={}",
            seed,
            difficulty.as_str()
        );
        Ok(state)
    }

    /// Session on an empty field, for scripted scenarios
    pub fn open_water(
        seed: u64,
        difficulty: Difficulty,
        mut config: SimConfig,
    ) -> Result<Self, ConfigError> {
        config.field.obstacle_count = 0;
        config.field.place_distinguished = false;
        Self::new(seed, difficulty, config)
    }

    fn start(&mut self) -> Result<(), ConfigError> {
        self.field.generate_scenario()?;
        self.vessel.set_underway(Vec3::ZERO, 0.0, START_SPEED);
        Ok(())
    }

    /// Restart with the same seed and difficulty, reusing every component
    pub fn reset(&mut self) -> Result<(), ConfigError> {
        self.vessel.reset();
        self.field.reset();
        self.predictor.reset();
        self.phase = SessionPhase::Playing;
        self.time_ticks = 0;
        self.elapsed = 0.0;
        self.encounter = Encounter::NotSpotted;
        self.collision = false;
        self.threats.clear();
        self.prediction = Prediction::all_clear();
        self.start()?;
        log::info!("Session reset (seed={})", self.seed);
        Ok(())
    }

    /// Restart on a freshly seeded field
    pub fn reseed(&mut self, seed: u64) -> Result<(), ConfigError> {
        self.seed = seed;
        self.field.reseed(seed);
        self.reset()
    }

    pub fn environment(&self) -> EnvironmentFactors {
        self.difficulty.factors()
    }

    pub fn is_finished(&self) -> bool {
        self.phase != SessionPhase::Playing
    }
}
