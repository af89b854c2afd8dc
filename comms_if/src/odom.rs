//! # Odometry messages

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A planar pose, position in meters and heading in radians.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose2D {
    pub x_m: f64,
    pub y_m: f64,

    /// Heading, positive anticlockwise from the frame's +X axis.
    pub theta_rad: f64,
}

/// Velocity of the platform expressed in its body frame.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Twist {
    pub linear_ms: f64,
    pub angular_rads: f64,
}

/// A single odometry observation.
///
/// The pose is given in the odometry frame. Twist and covariance are carried for completeness,
/// the follower only consumes the pose.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OdomObs {
    /// Time of the observation in seconds, in the producer's clock.
    pub stamp_s: f64,

    pub pose: Pose2D,

    #[serde(default)]
    pub twist: Twist,

    /// Row-major 3x3 covariance of (x, y, theta), if the producer provides one.
    #[serde(default)]
    pub covariance: Option<[f64; 9]>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Pose2D {
    pub fn new(x_m: f64, y_m: f64, theta_rad: f64) -> Self {
        Self {
            x_m,
            y_m,
            theta_rad,
        }
    }
}

impl OdomObs {
    /// Build an observation which only carries a pose.
    pub fn from_pose(stamp_s: f64, pose: Pose2D) -> Self {
        Self {
            stamp_s,
            pose,
            ..Default::default()
        }
    }
}
