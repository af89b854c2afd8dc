//! # Obstacle avoidance interface
//!
//! An obstacle avoider inspects the command produced by the motion controller against the
//! latest obstacle observation and either lets it through, adjusts it, or vetoes it. Avoiders
//! are pure functions of their inputs, so they can be called every cycle without any
//! sequencing assumptions.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{follow::VelocityCmd, obstacle::ObstacleCloud};

use crate::{course::CourseEstimate, loc::PosePair};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Avoider which never changes the command.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Decision of an obstacle avoider.
#[derive(Debug, Clone, PartialEq)]
pub enum Avoidance {
    /// The command is safe as is
    Clear(VelocityCmd),

    /// The command was changed to stay clear of obstacles
    Adjusted(VelocityCmd),

    /// No command can be issued safely on this cycle
    Veto(String),
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

pub trait ObstacleAvoider: Send {
    fn name(&self) -> &str;

    /// Check the command against the obstacles.
    ///
    /// `obstacles` is `None` if no observation has been received yet.
    fn adjust(
        &self,
        cmd: &VelocityCmd,
        obstacles: Option<&ObstacleCloud>,
        pose: &PosePair,
        course: Option<&CourseEstimate>,
    ) -> Avoidance;
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ObstacleAvoider for PassThrough {
    fn name(&self) -> &str {
        "none"
    }

    fn adjust(
        &self,
        cmd: &VelocityCmd,
        _obstacles: Option<&ObstacleCloud>,
        _pose: &PosePair,
        _course: Option<&CourseEstimate>,
    ) -> Avoidance {
        Avoidance::Clear(*cmd)
    }
}

impl Avoidance {
    /// The command to emit after this decision, a full stop for a veto.
    pub fn command(&self) -> VelocityCmd {
        match self {
            Avoidance::Clear(c) | Avoidance::Adjusted(c) => *c,
            Avoidance::Veto(_) => VelocityCmd::stop(),
        }
    }
}
