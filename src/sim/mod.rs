//! Deterministic simulation module
//!
//! All navigation logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by obstacle ID)
//! - No rendering, audio or platform dependencies

pub mod collision;
pub mod obstacle;
pub mod predictor;
pub mod state;
pub mod threat;
pub mod tick;
pub mod vessel;

pub use collision::Aabb;
pub use obstacle::{Obstacle, ObstacleField, SizeClass};
pub use predictor::{
    OutcomePredictor, Prediction, Recommendation, RiskLevel, RiskThresholds, Trend,
};
pub use state::{Encounter, SessionPhase, SessionState};
pub use threat::{AvoidanceDirection, AvoidanceOption, Threat, ThreatAnalyzer};
pub use tick::{FixedStepper, PresentationSink, Snapshot, TickInput, tick};
pub use vessel::{EngineStatus, Vessel, VesselPhase, VesselState, VesselStatus};
