//! # Localisation module
//!
//! The follower does not localise the platform itself. It receives odometry observations and a
//! relationship between the odometry frame and the world frame from outside, and keeps a pair of
//! frame-consistent poses built from them.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod frame;
pub use frame::{FrameError, FrameParams, FrameTransformer};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::odom::Pose2D;
use nalgebra::{Isometry2, Vector2};
use serde::Serialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A planar pose of the platform body in a particular frame.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Pose {
    /// The frame the pose is expressed in
    pub frame: Frame,

    /// Position of the body origin in the frame
    pub position_m: Vector2<f64>,

    /// Heading of the body X axis, anticlockwise from the frame's +X axis
    pub heading_rad: f64,
}

/// The world and odometry poses of the platform, built from the same observation.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct PosePair {
    pub world: Pose,
    pub odom: Pose,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Reference frames known to the follower.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum Frame {
    /// The global frame goal paths are given in
    World,

    /// The drift-prone frame odometry is reported in
    Odom,

    /// Attached to the platform, +X forward and +Y to the left
    Body,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    pub fn new(frame: Frame, x_m: f64, y_m: f64, heading_rad: f64) -> Self {
        Self {
            frame,
            position_m: Vector2::new(x_m, y_m),
            heading_rad,
        }
    }

    pub fn from_pose2d(frame: Frame, pose: &Pose2D) -> Self {
        Self::new(frame, pose.x_m, pose.y_m, pose.theta_rad)
    }

    pub fn to_pose2d(&self) -> Pose2D {
        Pose2D::new(self.position_m.x, self.position_m.y, self.heading_rad)
    }

    /// The transform taking points from the body frame into this pose's frame.
    pub fn isometry(&self) -> Isometry2<f64> {
        Isometry2::new(self.position_m, self.heading_rad)
    }

    pub fn from_isometry(frame: Frame, iso: &Isometry2<f64>) -> Self {
        Self {
            frame,
            position_m: iso.translation.vector,
            heading_rad: iso.rotation.angle(),
        }
    }

    /// Unit vector pointing along the body X axis.
    pub fn forward2(&self) -> Vector2<f64> {
        Vector2::new(self.heading_rad.cos(), self.heading_rad.sin())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::Point2;

    #[test]
    fn test_pose_isometry() {
        let pose = Pose::new(Frame::World, 1.0, 2.0, std::f64::consts::FRAC_PI_2);

        // A point 1 m ahead of the body is 1 m along +Y in the world
        let p = pose.isometry() * Point2::new(1.0, 0.0);
        assert!((p.x - 1.0).abs() < 1e-9);
        assert!((p.y - 3.0).abs() < 1e-9);

        let back = Pose::from_isometry(Frame::World, &pose.isometry());
        assert!((back.heading_rad - pose.heading_rad).abs() < 1e-9);
        assert!((back.position_m - pose.position_m).norm() < 1e-9);
    }
}
