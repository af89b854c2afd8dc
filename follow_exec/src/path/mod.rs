//! # Path
//!
//! This module defines the path followed by the platform. A goal path is split into a sequence
//! of subpaths at its turning points (see [`segmenter`]), and each subpath is followed on its
//! own by the motion controller.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod segmenter;
pub use segmenter::{segment, SegmenterParams};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::Serialize;

use comms_if::follow::GoalWaypoint;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A waypoint of the path, in the world frame.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Waypoint {
    pub position_m: Vector2<f64>,

    /// Desired heading at the waypoint
    pub heading_rad: f64,

    /// Drive backwards through this waypoint
    pub reverse: bool,

    /// Speed limit on the approach to this waypoint
    pub max_speed_ms: Option<f64>,
}

/// A run of waypoints followed without a turning point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subpath {
    pub waypoints: Vec<Waypoint>,
}

/// A goal path, split into subpaths.
///
/// Neighbouring subpaths share their boundary waypoint: the last waypoint of one subpath is the
/// first waypoint of the next.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Path {
    pub subpaths: Vec<Subpath>,
}

/// A segment between two path points
#[derive(Debug, Default, Clone, Copy)]
pub struct PathSegment {
    /// The target of the segment
    pub target_m: Vector2<f64>,

    /// The start point of the segment
    pub start_m: Vector2<f64>,

    /// The length of the segment
    pub length_m: f64,

    /// The heading (angle to the +ve x axis) of the segment
    pub heading_rad: f64,

    /// Unit vector pointing in the direction of the segment
    pub direction: Vector2<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Waypoint {
    pub fn new(x_m: f64, y_m: f64, heading_rad: f64) -> Self {
        Self {
            position_m: Vector2::new(x_m, y_m),
            heading_rad,
            reverse: false,
            max_speed_ms: None,
        }
    }
}

impl From<&GoalWaypoint> for Waypoint {
    fn from(wp: &GoalWaypoint) -> Self {
        Self {
            position_m: Vector2::new(wp.pose.x_m, wp.pose.y_m),
            heading_rad: wp.pose.theta_rad,
            reverse: wp.reverse,
            max_speed_ms: wp.max_speed_ms,
        }
    }
}

impl Subpath {
    pub fn new(waypoints: Vec<Waypoint>) -> Self {
        Self { waypoints }
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn first(&self) -> Option<&Waypoint> {
        self.waypoints.first()
    }

    pub fn last(&self) -> Option<&Waypoint> {
        self.waypoints.last()
    }

    /// Returns the path segment connecting the target point and the previous
    /// point.
    ///
    /// If no segment exists (the target is the first point in the sequence or
    /// is beyond the end of the sequence) then `None` will be returned
    pub fn get_segment_to_target(&self, target_index: usize) -> Option<PathSegment> {
        if target_index == 0 || target_index >= self.waypoints.len() {
            return None;
        }

        let target_m = self.waypoints[target_index].position_m;
        let start_m = self.waypoints[target_index - 1].position_m;
        let diff = target_m - start_m;
        let length_m = diff.norm();

        // Zero length segments have no defined direction
        let direction = if length_m > 0.0 {
            diff / length_m
        } else {
            Vector2::zeros()
        };

        Some(PathSegment {
            target_m,
            start_m,
            length_m,
            heading_rad: diff.y.atan2(diff.x),
            direction,
        })
    }

    /// Iterate over all segments of the subpath in order.
    pub fn segments(&self) -> impl Iterator<Item = PathSegment> + '_ {
        (1..self.waypoints.len()).filter_map(move |i| self.get_segment_to_target(i))
    }

    /// Return the traversable length of the subpath in meters.
    pub fn length_m(&self) -> f64 {
        self.segments().map(|s| s.length_m).sum()
    }

    /// Minimum distance between the point and any segment of the subpath.
    ///
    /// For a single waypoint subpath this is the distance to that waypoint. `None` if the
    /// subpath is empty.
    pub fn distance_to(&self, point_m: &Vector2<f64>) -> Option<f64> {
        if self.waypoints.len() == 1 {
            return Some((self.waypoints[0].position_m - point_m).norm());
        }

        self.segments()
            .map(|s| s.distance_to(point_m))
            .fold(None, |acc: Option<f64>, d| match acc {
                Some(a) if a <= d => Some(a),
                _ => Some(d),
            })
    }

    /// Distance covered along the subpath up to the point's projection on it.
    pub fn projected_progress_m(&self, point_m: &Vector2<f64>) -> f64 {
        let mut best_dist = std::f64::INFINITY;
        let mut best_progress = 0f64;
        let mut covered_m = 0f64;

        for seg in self.segments() {
            let t = seg.project(point_m);
            let dist = (seg.start_m + seg.direction * t - point_m).norm();
            if dist < best_dist {
                best_dist = dist;
                best_progress = covered_m + t;
            }
            covered_m += seg.length_m;
        }

        best_progress
    }
}

impl Path {
    pub fn new(subpaths: Vec<Subpath>) -> Self {
        Self { subpaths }
    }

    pub fn num_subpaths(&self) -> usize {
        self.subpaths.len()
    }

    pub fn subpath(&self, index: usize) -> Option<&Subpath> {
        self.subpaths.get(index)
    }

    pub fn last_waypoint(&self) -> Option<&Waypoint> {
        self.subpaths.last().and_then(|s| s.last())
    }

    /// Total traversable length of the path in meters.
    pub fn length_m(&self) -> f64 {
        self.subpaths.iter().map(|s| s.length_m()).sum()
    }

    /// The waypoints of the whole path in order, with the boundary waypoints shared between
    /// neighbouring subpaths listed once.
    pub fn flatten(&self) -> Vec<Waypoint> {
        let mut points = Vec::new();

        for (i, sub) in self.subpaths.iter().enumerate() {
            let skip = if i == 0 { 0 } else { 1 };
            points.extend(sub.waypoints.iter().skip(skip).cloned());
        }

        points
    }
}

impl PathSegment {
    /// Distance along the segment of the point's projection, clamped to the segment.
    pub fn project(&self, point_m: &Vector2<f64>) -> f64 {
        (point_m - self.start_m)
            .dot(&self.direction)
            .max(0.0)
            .min(self.length_m)
    }

    /// Distance between the point and the closest point of the segment.
    pub fn distance_to(&self, point_m: &Vector2<f64>) -> f64 {
        let closest = self.start_m + self.direction * self.project(point_m);
        (closest - point_m).norm()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn l_shaped() -> Subpath {
        Subpath::new(vec![
            Waypoint::new(0.0, 0.0, 0.0),
            Waypoint::new(2.0, 0.0, 0.0),
            Waypoint::new(2.0, 2.0, 0.0),
        ])
    }

    #[test]
    fn test_segment_to_target() {
        let sub = l_shaped();

        assert!(sub.get_segment_to_target(0).is_none());
        assert!(sub.get_segment_to_target(3).is_none());

        let seg = sub.get_segment_to_target(2).unwrap();
        assert_eq!(seg.length_m, 2.0);
        assert!((seg.heading_rad - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert!((seg.direction - Vector2::new(0.0, 1.0)).norm() < 1e-12);
    }

    #[test]
    fn test_length_and_distance() {
        let sub = l_shaped();
        assert_eq!(sub.length_m(), 4.0);

        // Beside the first leg
        assert!((sub.distance_to(&Vector2::new(1.0, 0.5)).unwrap() - 0.5).abs() < 1e-12);
        // Beyond the end of the path, distance to the final waypoint
        assert!((sub.distance_to(&Vector2::new(2.0, 3.0)).unwrap() - 1.0).abs() < 1e-12);

        let single = Subpath::new(vec![Waypoint::new(1.0, 1.0, 0.0)]);
        assert_eq!(single.length_m(), 0.0);
        assert!((single.distance_to(&Vector2::new(1.0, 2.0)).unwrap() - 1.0).abs() < 1e-12);

        assert!(Subpath::new(vec![]).distance_to(&Vector2::zeros()).is_none());
    }

    #[test]
    fn test_projected_progress() {
        let sub = l_shaped();
        assert!((sub.projected_progress_m(&Vector2::new(1.0, -0.2)) - 1.0).abs() < 1e-12);
        assert!((sub.projected_progress_m(&Vector2::new(2.2, 1.0)) - 3.0).abs() < 1e-12);
    }
}
