//! Bounding volumes and overlap tests
//!
//! Obstacles and the hull are both approximated by axis-aligned boxes. The
//! hull box is the world-space box around the rotated hull rectangle, so it
//! grows slightly when the vessel is not aligned with an axis.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::consts::{HULL_CENTER_Y, HULL_HEIGHT, HULL_LENGTH, HULL_WIDTH};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        let half = half_extents.abs();
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Box enclosing a sphere
    pub fn from_sphere(center: Vec3, radius: f32) -> Self {
        Self::from_center_half_extents(center, Vec3::splat(radius.max(0.0)))
    }

    /// World-space box around a hull at `position` with the given heading
    pub fn hull(position: Vec3, heading: f32) -> Self {
        let (sin, cos) = heading.sin_cos();
        let half_w = HULL_WIDTH / 2.0;
        let half_l = HULL_LENGTH / 2.0;
        let half_extents = Vec3::new(
            cos.abs() * half_w + sin.abs() * half_l,
            HULL_HEIGHT / 2.0,
            sin.abs() * half_w + cos.abs() * half_l,
        );
        let center = position + Vec3::Y * HULL_CENTER_Y;
        Self::from_center_half_extents(center, half_extents)
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Touching boxes count as intersecting
    #[inline]
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }

    #[inline]
    pub fn contains_point(&self, p: Vec3) -> bool {
        self.min.cmple(p).all() && p.cmple(self.max).all()
    }
}
