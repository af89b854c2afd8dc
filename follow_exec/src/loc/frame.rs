//! Frame transformations between the world and odometry frames

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{Isometry2, Vector2};
use serde::Deserialize;

use super::{Frame, Pose, PosePair};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Holds the best known relationship between the odometry and world frames.
#[derive(Debug, Clone, Default)]
pub struct FrameTransformer {
    /// Transform taking odometry frame coordinates into the world frame.
    world_from_odom: Option<Isometry2<f64>>,
}

/// Frame parameters
#[derive(Debug, Clone, Deserialize)]
pub struct FrameParams {
    /// Name of the world (fixed) frame
    #[serde(default = "default_world_frame_id")]
    pub world_frame_id: String,

    /// Name of the odometry frame
    #[serde(default = "default_odom_frame_id")]
    pub odom_frame_id: String,

    /// Initial pose `[x, y, theta]` of the odometry frame in the world frame. If not given no
    /// transform is available until one is set at runtime.
    #[serde(default)]
    pub initial_world_from_odom: Option<[f64; 3]>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum FrameError {
    #[error("No transform between the world and odometry frames has been established")]
    TransformUnavailable,

    #[error("A body frame pose can only be converted together with the pose of the platform")]
    BodyRelative,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FrameTransformer {
    pub fn new(world_from_odom: Option<Isometry2<f64>>) -> Self {
        Self { world_from_odom }
    }

    pub fn from_params(params: &FrameParams) -> Self {
        Self::new(
            params
                .initial_world_from_odom
                .map(|t| Isometry2::new(Vector2::new(t[0], t[1]), t[2])),
        )
    }

    /// Set the pose of the odometry frame within the world frame.
    pub fn set_world_from_odom(&mut self, world_from_odom: Isometry2<f64>) {
        self.world_from_odom = Some(world_from_odom);
    }

    /// Express a pose in the world frame.
    pub fn to_world(&self, pose: &Pose) -> Result<Pose, FrameError> {
        match pose.frame {
            Frame::World => Ok(*pose),
            Frame::Odom => {
                let t = self.world_from_odom.ok_or(FrameError::TransformUnavailable)?;
                Ok(Pose::from_isometry(Frame::World, &(t * pose.isometry())))
            }
            Frame::Body => Err(FrameError::BodyRelative),
        }
    }

    /// Express a pose in the odometry frame.
    pub fn to_odom(&self, pose: &Pose) -> Result<Pose, FrameError> {
        match pose.frame {
            Frame::Odom => Ok(*pose),
            Frame::World => {
                let t = self.world_from_odom.ok_or(FrameError::TransformUnavailable)?;
                Ok(Pose::from_isometry(
                    Frame::Odom,
                    &(t.inverse() * pose.isometry()),
                ))
            }
            Frame::Body => Err(FrameError::BodyRelative),
        }
    }

    /// Express a pose relative to the platform body, whose pose is given by `body`.
    pub fn to_local(&self, body: &PosePair, pose: &Pose) -> Result<Pose, FrameError> {
        if pose.frame == Frame::Body {
            return Ok(*pose);
        }

        let world = self.to_world(pose)?;
        Ok(Pose::from_isometry(
            Frame::Body,
            &(body.world.isometry().inverse() * world.isometry()),
        ))
    }

    /// Express a pose in the world frame, using `body` for poses relative to the platform.
    pub fn to_global(&self, body: &PosePair, pose: &Pose) -> Result<Pose, FrameError> {
        match pose.frame {
            Frame::Body => Ok(Pose::from_isometry(
                Frame::World,
                &(body.world.isometry() * pose.isometry()),
            )),
            _ => self.to_world(pose),
        }
    }

    /// Build the frame-consistent pose pair from an odometry pose.
    pub fn pose_pair(&self, odom: &Pose) -> Result<PosePair, FrameError> {
        let odom = Pose { frame: Frame::Odom, ..*odom };
        Ok(PosePair {
            world: self.to_world(&odom)?,
            odom,
        })
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn default_world_frame_id() -> String {
    String::from("map")
}

fn default_odom_frame_id() -> String {
    String::from("odom")
}

impl Default for FrameParams {
    fn default() -> Self {
        Self {
            world_frame_id: default_world_frame_id(),
            odom_frame_id: default_odom_frame_id(),
            initial_world_from_odom: None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn approx_pose(a: &Pose, b: &Pose) -> bool {
        a.frame == b.frame
            && (a.position_m - b.position_m).norm() < 1e-9
            && util::maths::get_ang_dist(a.heading_rad, b.heading_rad).abs() < 1e-9
    }

    #[test]
    fn test_unavailable() {
        let ft = FrameTransformer::default();
        let odom = Pose::new(Frame::Odom, 1.0, 0.0, 0.0);

        assert_eq!(ft.to_world(&odom), Err(FrameError::TransformUnavailable));
        assert_eq!(ft.pose_pair(&odom), Err(FrameError::TransformUnavailable));

        // A world pose needs no transform to be expressed in the world
        let world = Pose::new(Frame::World, 1.0, 0.0, 0.0);
        assert_eq!(ft.to_world(&world), Ok(world));
    }

    #[test]
    fn test_world_odom_round_trip() {
        // Odometry frame is at (10, 5) in the world, rotated a quarter turn
        let ft = FrameTransformer::new(Some(Isometry2::new(Vector2::new(10.0, 5.0), FRAC_PI_2)));

        let odom = Pose::new(Frame::Odom, 1.0, 0.0, 0.0);
        let world = ft.to_world(&odom).unwrap();
        assert!(approx_pose(&world, &Pose::new(Frame::World, 10.0, 6.0, FRAC_PI_2)));

        let back = ft.to_odom(&world).unwrap();
        assert!(approx_pose(&back, &odom));
    }

    #[test]
    fn test_local_global() {
        let ft = FrameTransformer::from_params(&FrameParams {
            initial_world_from_odom: Some([0.0, 0.0, 0.0]),
            ..Default::default()
        });
        let pair = ft.pose_pair(&Pose::new(Frame::Odom, 2.0, 2.0, FRAC_PI_2)).unwrap();

        // A waypoint 1 m in front of the platform
        let target = Pose::new(Frame::World, 2.0, 3.0, FRAC_PI_2);
        let local = ft.to_local(&pair, &target).unwrap();
        assert_eq!(local.frame, Frame::Body);
        assert!((local.position_m - Vector2::new(1.0, 0.0)).norm() < 1e-9);
        assert!(local.heading_rad.abs() < 1e-9);
        assert_eq!(ft.to_local(&pair, &local), Ok(local));

        let global = ft.to_global(&pair, &local).unwrap();
        assert!(approx_pose(&global, &target));

        // Odometry poses go through the world transform, not the platform pose
        let odom = Pose::new(Frame::Odom, 1.0, 0.0, 0.0);
        let global = ft.to_global(&pair, &odom).unwrap();
        assert!(approx_pose(&global, &Pose::new(Frame::World, 1.0, 0.0, 0.0)));

        let local = ft.to_local(&pair, &odom).unwrap();
        assert!(approx_pose(&local, &Pose::new(Frame::Body, -2.0, 1.0, -FRAC_PI_2)));
    }

    #[test]
    fn test_body_needs_platform_pose() {
        let ft = FrameTransformer::new(Some(Isometry2::identity()));
        let body = Pose::new(Frame::Body, 1.0, 0.0, 0.0);

        assert_eq!(ft.to_world(&body), Err(FrameError::BodyRelative));
        assert_eq!(ft.to_odom(&body), Err(FrameError::BodyRelative));
    }
}
