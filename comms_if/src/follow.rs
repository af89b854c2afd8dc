//! # Path following messages
//!
//! The goal accepted by the follower, the velocity command it emits every cycle, and the
//! feedback or result value describing the state of the task.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::odom::Pose2D;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A waypoint of a goal path, in the world frame.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalWaypoint {
    pub pose: Pose2D,

    /// If true the platform should drive backwards through this waypoint.
    #[serde(default)]
    pub reverse: bool,

    /// Optional speed limit for the approach to this waypoint.
    #[serde(default)]
    pub max_speed_ms: Option<f64>,
}

/// A request to follow a path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FollowPathGoal {
    pub waypoints: Vec<GoalWaypoint>,

    /// Do not split the path at turning points, follow it as a single subpath.
    #[serde(default)]
    pub force_single_segment: bool,

    /// Name of the motion controller to use for this goal. If `None` the configured default is
    /// used.
    #[serde(default)]
    pub controller: Option<String>,
}

/// Velocity demand for one control cycle.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VelocityCmd {
    /// Forwards speed, negative is backwards.
    pub linear_ms: f64,

    /// Turn rate, positive is anticlockwise (right hand rule about +Z).
    pub angular_rads: f64,
}

/// Feedback on a running path following task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FollowPathFeedback {
    /// Index of the subpath currently being followed.
    pub subpath_index: usize,

    pub num_subpaths: usize,

    /// Warnings raised by the supervisors (and the obstacle avoider) on this cycle.
    pub warnings: Vec<String>,

    /// Estimated fraction of the path length already covered, in [0, 1].
    pub progress: f64,

    /// True if the obstacle avoider modified or vetoed the command on this cycle.
    pub obstacle_ahead: bool,

    /// The command emitted on this cycle, `None` if no command was issued.
    pub cmd: Option<VelocityCmd>,
}

/// The final outcome of a path following task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowPathResult {
    pub status: StatusCode,
    pub message: Option<String>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Status codes carried by a [`FollowPathResult`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    Success,
    MoveFailed,
    Obstacle,
    Timeout,
    PathLost,
    SlamFail,
    TfFail,
    InternalError,
    Aborted,
    EmergencyStop,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl GoalWaypoint {
    pub fn new(x_m: f64, y_m: f64, theta_rad: f64) -> Self {
        Self {
            pose: Pose2D::new(x_m, y_m, theta_rad),
            ..Default::default()
        }
    }
}

impl FollowPathGoal {
    /// Build a goal from a list of `(x, y)` positions, headings left at zero.
    pub fn from_positions(positions: &[(f64, f64)]) -> Self {
        Self {
            waypoints: positions
                .iter()
                .map(|(x, y)| GoalWaypoint::new(*x, *y, 0.0))
                .collect(),
            ..Default::default()
        }
    }
}

impl VelocityCmd {
    pub fn new(linear_ms: f64, angular_rads: f64) -> Self {
        Self {
            linear_ms,
            angular_rads,
        }
    }

    /// A command bringing the platform to a full stop.
    pub fn stop() -> Self {
        Self::default()
    }

    pub fn is_stop(&self) -> bool {
        self.linear_ms == 0.0 && self.angular_rads == 0.0
    }
}

impl StatusCode {
    pub fn is_success(&self) -> bool {
        matches!(self, StatusCode::Success)
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StatusCode::Success => "success",
            StatusCode::MoveFailed => "move failed",
            StatusCode::Obstacle => "obstacle",
            StatusCode::Timeout => "timeout",
            StatusCode::PathLost => "path lost",
            StatusCode::SlamFail => "localisation failed",
            StatusCode::TfFail => "transform failed",
            StatusCode::InternalError => "internal error",
            StatusCode::Aborted => "aborted",
            StatusCode::EmergencyStop => "emergency stop",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_goal_from_json() {
        let json = r#"{
            "waypoints": [
                {"pose": {"x_m": 0.0, "y_m": 0.0, "theta_rad": 0.0}},
                {"pose": {"x_m": 1.0, "y_m": 0.0, "theta_rad": 0.0}, "reverse": true}
            ],
            "controller": "carrot"
        }"#;

        let goal: FollowPathGoal = serde_json::from_str(json).unwrap();

        assert_eq!(goal.waypoints.len(), 2);
        assert!(!goal.waypoints[0].reverse);
        assert!(goal.waypoints[1].reverse);
        assert!(!goal.force_single_segment);
        assert_eq!(goal.controller.as_deref(), Some("carrot"));
    }
}
