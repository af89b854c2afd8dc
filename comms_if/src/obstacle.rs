//! # Obstacle observation messages

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A snapshot of obstacle points around the platform.
///
/// Points are expressed in the platform body frame (X forwards, Y to the left) in meters. Each
/// new cloud replaces the previous one, clouds are never merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObstacleCloud {
    pub stamp_s: f64,
    pub points_m: Vec<[f64; 2]>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ObstacleCloud {
    pub fn new(stamp_s: f64, points_m: Vec<[f64; 2]>) -> Self {
        Self { stamp_s, points_m }
    }

    pub fn is_empty(&self) -> bool {
        self.points_m.is_empty()
    }

    /// Distance from the body origin to the closest point, or `None` for an empty cloud.
    pub fn nearest_distance_m(&self) -> Option<f64> {
        self.points_m
            .iter()
            .map(|p| (p[0] * p[0] + p[1] * p[1]).sqrt())
            .fold(None, |acc: Option<f64>, d| match acc {
                Some(a) if a <= d => Some(a),
                _ => Some(d),
            })
    }
}
