//! Obstacle population and proximity queries
//!
//! Obstacles live on the water plane (y = 0). They are created when the field
//! is generated, drift every tick, and are only ever removed by regenerating
//! or resetting the whole field.

use std::f32::consts::TAU;

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::collision::Aabb;
use crate::error::ConfigError;
use crate::settings::FieldTuning;

/// Size class, ordered smallest to largest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SizeClass {
    Small,
    Medium,
    Large,
    Massive,
}

impl SizeClass {
    pub const ALL: [SizeClass; 4] = [
        SizeClass::Small,
        SizeClass::Medium,
        SizeClass::Large,
        SizeClass::Massive,
    ];

    /// Index into per-class tables
    #[inline]
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Classify a scale in [1, 4)
    pub fn from_scale(scale: f32) -> Self {
        if scale < 1.5 {
            SizeClass::Small
        } else if scale < 2.5 {
            SizeClass::Medium
        } else if scale < 3.5 {
            SizeClass::Large
        } else {
            SizeClass::Massive
        }
    }

    /// Physical radius per unit of scale
    pub fn base_radius(&self) -> f32 {
        match self {
            SizeClass::Small => 5.0,
            SizeClass::Medium => 8.0,
            SizeClass::Large => 12.0,
            SizeClass::Massive => 18.0,
        }
    }

    /// Size contribution to threat severity, in (0, 1]
    pub fn severity_factor(&self) -> f32 {
        (self.index() + 1) as f32 / SizeClass::ALL.len() as f32
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SizeClass::Small => "small",
            SizeClass::Medium => "medium",
            SizeClass::Large => "large",
            SizeClass::Massive => "massive",
        }
    }
}

/// A drifting obstacle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: u32,
    pub position: Vec3,
    pub drift_velocity: Vec3,
    pub size_class: SizeClass,
    /// Generation scale; radius = base radius x scale
    pub scale: f32,
    pub radius: f32,
    pub bounds: Aabb,
    /// The single scripted hazard placed in the vessel's initial path
    pub is_distinguished: bool,
}

impl Obstacle {
    /// Create an obstacle, deriving size class and radius from scale
    pub fn new(id: u32, position: Vec3, drift_velocity: Vec3, scale: f32) -> Self {
        Self::with_class(id, position, drift_velocity, SizeClass::from_scale(scale), scale)
    }

    pub fn with_class(
        id: u32,
        position: Vec3,
        drift_velocity: Vec3,
        size_class: SizeClass,
        scale: f32,
    ) -> Self {
        let radius = size_class.base_radius() * scale.max(0.0);
        Self {
            id,
            position,
            drift_velocity,
            size_class,
            scale,
            radius,
            bounds: Aabb::from_sphere(position, radius),
            is_distinguished: false,
        }
    }

    fn drift(&mut self, dt: f32) {
        self.position += self.drift_velocity * dt;
        self.bounds = Aabb::from_sphere(self.position, self.radius);
    }
}

/// The obstacle population for one session
#[derive(Debug, Clone)]
pub struct ObstacleField {
    obstacles: Vec<Obstacle>,
    tuning: FieldTuning,
    seed: u64,
    rng: Pcg32,
    next_id: u32,
}

impl ObstacleField {
    /// Empty field with a seeded generator
    pub fn new(seed: u64, tuning: FieldTuning) -> Self {
        Self {
            obstacles: Vec::new(),
            tuning,
            seed,
            rng: Pcg32::seed_from_u64(seed),
            next_id: 1,
        }
    }

    fn next_obstacle_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Replace the field with `count` randomly placed obstacles
    pub fn generate(
        &mut self,
        count: usize,
        field_radius: f32,
        min_spawn_distance: f32,
    ) -> Result<(), ConfigError> {
        check_radii(field_radius, min_spawn_distance)?;
        self.clear();
        self.scatter(count, field_radius, min_spawn_distance);
        log::info!("Generated {} obstacles (field radius {})", count, field_radius);
        Ok(())
    }

    /// Replace the field according to the configured tuning, including the
    /// distinguished obstacle when enabled
    pub fn generate_scenario(&mut self) -> Result<(), ConfigError> {
        let FieldTuning {
            obstacle_count,
            field_radius,
            min_spawn_distance,
            place_distinguished,
            ..
        } = self.tuning;
        check_radii(field_radius, min_spawn_distance)?;
        self.clear();
        if place_distinguished {
            self.place_distinguished();
        }
        self.scatter(obstacle_count, field_radius, min_spawn_distance);
        log::info!(
            "Generated scenario field: {} obstacles, distinguished={}",
            self.obstacles.len(),
            place_distinguished
        );
        Ok(())
    }

    /// Place the distinguished obstacle straight ahead of the origin,
    /// replacing any previous one. Skips rejection sampling. Returns its id.
    pub fn place_distinguished(&mut self) -> u32 {
        self.obstacles.retain(|o| !o.is_distinguished);
        let id = self.next_obstacle_id();
        let position = Vec3::new(0.0, 0.0, -self.tuning.distinguished_distance);
        let mut obstacle = Obstacle::with_class(
            id,
            position,
            self.tuning.distinguished_drift,
            SizeClass::Massive,
            self.tuning.distinguished_scale,
        );
        obstacle.is_distinguished = true;
        log::info!("Distinguished obstacle placed {} ahead", self.tuning.distinguished_distance);
        self.obstacles.push(obstacle);
        id
    }

    /// Insert a pre-built obstacle (scripted scenarios)
    pub fn insert(&mut self, mut obstacle: Obstacle) {
        if obstacle.is_distinguished {
            self.obstacles.retain(|o| !o.is_distinguished);
        }
        obstacle.id = self.next_obstacle_id();
        self.obstacles.push(obstacle);
    }

    fn scatter(&mut self, count: usize, field_radius: f32, min_spawn_distance: f32) {
        let max_attempts = self.tuning.max_placement_attempts.max(1);
        let max_drift = self.tuning.max_drift_speed.max(0.0);

        for _ in 0..count {
            let scale = 1.0 + self.rng.random::<f32>() * 3.0;
            let mut attempts = 0;

            // Best effort: on exhaustion the last candidate is kept
            let position = loop {
                let angle = self.rng.random::<f32>() * TAU;
                let distance =
                    min_spawn_distance + self.rng.random::<f32>() * (field_radius - min_spawn_distance);
                let candidate = Vec3::new(angle.cos() * distance, 0.0, angle.sin() * distance);
                attempts += 1;

                if !self.is_too_close(candidate, scale) {
                    break candidate;
                }
                if attempts >= max_attempts {
                    log::debug!("Placement budget exhausted after {} attempts", attempts);
                    break candidate;
                }
            };

            let drift = Vec3::new(
                (self.rng.random::<f32>() - 0.5) * 2.0 * max_drift,
                0.0,
                (self.rng.random::<f32>() - 0.5) * 2.0 * max_drift,
            );
            let id = self.next_obstacle_id();
            self.obstacles.push(Obstacle::new(id, position, drift, scale));
        }
    }

    fn is_too_close(&self, position: Vec3, scale: f32) -> bool {
        let min_separation = scale * self.tuning.separation_per_scale;
        self.obstacles
            .iter()
            .any(|o| o.position.distance(position) < min_separation)
    }

    /// Advance every obstacle by its drift
    pub fn update(&mut self, dt: f32) {
        if !(dt > 0.0) {
            return;
        }
        for obstacle in &mut self.obstacles {
            obstacle.drift(dt);
        }
    }

    /// The `k` closest obstacles, ascending by distance. Equal distances keep
    /// insertion order.
    pub fn nearest(&self, position: Vec3, k: usize) -> Vec<&Obstacle> {
        let mut by_distance: Vec<(f32, &Obstacle)> = self
            .obstacles
            .iter()
            .map(|o| (o.position.distance(position), o))
            .collect();
        by_distance.sort_by(|a, b| a.0.total_cmp(&b.0));
        by_distance.into_iter().take(k).map(|(_, o)| o).collect()
    }

    /// Whether any obstacle's bounds intersect `volume`
    pub fn check_collision(&self, volume: &Aabb) -> bool {
        self.first_collision(volume).is_some()
    }

    /// First obstacle (in insertion order) whose bounds intersect `volume`
    pub fn first_collision(&self, volume: &Aabb) -> Option<&Obstacle> {
        self.obstacles.iter().find(|o| o.bounds.intersects(volume))
    }

    pub fn distinguished(&self) -> Option<&Obstacle> {
        self.obstacles.iter().find(|o| o.is_distinguished)
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn tuning(&self) -> &FieldTuning {
        &self.tuning
    }

    fn clear(&mut self) {
        self.obstacles.clear();
    }

    /// Empty the field and rewind the generator, so the next generation
    /// reproduces the same layout
    pub fn reset(&mut self) {
        self.clear();
        self.rng = Pcg32::seed_from_u64(self.seed);
        self.next_id = 1;
    }

    /// Reset with a new seed
    pub fn reseed(&mut self, seed: u64) {
        self.seed = seed;
        self.reset();
    }
}

fn check_radii(field_radius: f32, min_spawn_distance: f32) -> Result<(), ConfigError> {
    if field_radius > min_spawn_distance && min_spawn_distance >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::FieldRadiusTooSmall {
            field_radius,
            min_spawn_distance,
        })
    }
}
