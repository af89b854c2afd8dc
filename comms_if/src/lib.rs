//! # Communications interface crate.
//!
//! Provides the message types exchanged between the path follower and the outside world: the
//! odometry and obstacle inputs, the goal, and the command, feedback and result outputs. The
//! transport itself is not defined here.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Goal, command, feedback and result definitions for path following
pub mod follow;

/// Obstacle observations
pub mod obstacle;

/// Odometry observations
pub mod odom;
