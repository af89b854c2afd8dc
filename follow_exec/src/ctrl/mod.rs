//! # Motion control interface
//!
//! Motion controllers turn the current pose and the active subpath into a velocity command for
//! one cycle. The control laws themselves live outside this crate, they are registered in a
//! [`ControllerFactory`](crate::factory::ControllerFactory) and selected by name when a goal is
//! set.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::follow::{StatusCode, VelocityCmd};

use crate::{course::CourseEstimate, loc::PosePair, path::Subpath};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Everything a controller may use to compute a command on one cycle.
#[derive(Debug, Clone, Copy)]
pub struct ControlInput<'a> {
    pub pose: &'a PosePair,

    /// The subpath being followed
    pub subpath: &'a Subpath,

    pub subpath_index: usize,

    pub num_subpaths: usize,

    pub course: Option<CourseEstimate>,

    /// Index of the current cycle since the goal was started, starting at 1
    pub tick: u64,

    /// Seconds since the goal was started
    pub time_s: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Outcome of one controller step.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlStep {
    /// Keep going with this command
    Command(VelocityCmd),

    /// The active subpath has been completed
    SubpathDone,

    /// The whole path has been completed
    PathDone,

    /// No valid command can be produced
    Failed { code: StatusCode, message: String },
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A motion control law.
///
/// A new instance is built for every goal, so any state a controller keeps between cycles only
/// lives as long as one goal.
pub trait MotionController: Send {
    /// Name the controller is registered under.
    fn name(&self) -> &str;

    /// Called whenever a new subpath becomes active, before the first `step` on it.
    fn start_subpath(&mut self, _subpath: &Subpath) {}

    /// Compute the outcome of this cycle.
    fn step(&mut self, input: &ControlInput) -> ControlStep;
}
