//! # Path follower library.
//!
//! Closed loop path following for a mobile platform. A goal path is split into subpaths at its
//! turning points, and a [`follower::PathFollower`] drives the platform along them one control
//! cycle at a time, supervised by a chain of safety and progress checks.
//!
//! The control laws and obstacle avoidance algorithms are not part of this library, they are
//! provided by the user through the [`factory`] registries.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Obstacle avoidance interface - checks commands against the latest obstacle observation
pub mod avoid;

/// Course prediction - estimates the current direction of travel from the pose history
pub mod course;

/// Motion control interface - turns the pose and subpath into velocity commands
pub mod ctrl;

/// Strategy factories - build controllers and avoiders by name
pub mod factory;

/// Path follower - the top level state machine
pub mod follower;

/// Localisation module - poses and the world/odometry frame relationship
pub mod loc;

/// Path module - paths, subpaths and segmentation
pub mod path;

/// Supervisors - safety and progress checks run every cycle
pub mod supervisor;

/// Visualisation outputs - planned and driven paths
pub mod viz;
