//! # Course prediction
//!
//! Estimates the direction and speed the platform is currently travelling in from a short
//! history of its positions. Used by motion controllers and obstacle avoiders to look along the
//! actual course rather than the commanded one.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::collections::VecDeque;

use nalgebra::Vector2;
use serde::Deserialize;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CourseParams {
    /// Maximum number of samples kept in the history
    pub history_len: usize,

    /// New positions closer than this to the newest sample are not recorded, only its time is
    /// updated
    pub min_sample_dist_m: f64,
}

/// Estimated course of the platform.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CourseEstimate {
    /// Unit vector along the direction of travel, in the world frame
    pub direction: Vector2<f64>,

    /// Speed along the direction of travel
    pub speed_ms: f64,
}

#[derive(Debug, Clone)]
pub struct CoursePredictor {
    params: CourseParams,

    /// `(time_s, position_m)` samples, oldest first
    history: VecDeque<(f64, Vector2<f64>)>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CoursePredictor {
    pub fn new(params: CourseParams) -> Self {
        Self {
            history: VecDeque::with_capacity(params.history_len.max(2)),
            params,
        }
    }

    /// Forget all history, to be called when a new goal starts.
    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn num_samples(&self) -> usize {
        self.history.len()
    }

    /// Record a new world frame position at the given time.
    pub fn update(&mut self, time_s: f64, position_m: Vector2<f64>) {
        // Holding still only refreshes the time of the newest sample
        if let Some((newest_s, newest)) = self.history.back_mut() {
            if (position_m - *newest).norm() < self.params.min_sample_dist_m {
                *newest_s = time_s;
                return;
            }
        }

        self.history.push_back((time_s, position_m));

        // Always keep at least two samples so a prediction is possible
        while self.history.len() > self.params.history_len.max(2) {
            self.history.pop_front();
        }
    }

    /// Predict the current course.
    ///
    /// Returns `None` if there are fewer than two samples or the platform has not moved.
    pub fn predict(&self) -> Option<CourseEstimate> {
        let (t0, p0) = self.history.front()?;
        let (t1, p1) = self.history.back()?;

        if self.history.len() < 2 {
            return None;
        }

        let delta = p1 - p0;
        let dist_m = delta.norm();
        if dist_m <= std::f64::EPSILON {
            return None;
        }

        let dt_s = t1 - t0;
        let speed_ms = if dt_s > 0.0 { dist_m / dt_s } else { 0.0 };

        Some(CourseEstimate {
            direction: delta / dist_m,
            speed_ms,
        })
    }
}
