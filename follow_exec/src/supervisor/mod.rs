//! # Supervisor chain
//!
//! Supervisors are independent safety and progress checks run at the start of every control
//! cycle, before the motion controller. Each one looks at the shared state of the cycle (the
//! [`TickContext`]) and returns a [`Verdict`].
//!
//! The chain runs its supervisors in the configured order. Warnings are collected and reported
//! in the feedback, the first abort ends the evaluation so that later supervisors are not run on
//! that cycle.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod checks;
mod params;

pub use checks::*;
pub use params::SupervisorParams;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{follow::StatusCode, obstacle::ObstacleCloud};
use log::{debug, trace};

use crate::{loc::PosePair, path::Path};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The data shared by all supervisors on one cycle.
#[derive(Debug, Clone, Copy)]
pub struct TickContext<'a> {
    pub pose: PoseStatus,

    /// The path being followed
    pub path: &'a Path,

    /// Index of the active subpath
    pub subpath_index: usize,

    /// Latest obstacle observation, if any has been received
    pub obstacles: Option<&'a ObstacleCloud>,

    /// Seconds since the goal was started
    pub time_s: f64,

    pub tick: u64,
}

/// An ordered list of supervisors.
#[derive(Default)]
pub struct SupervisorChain {
    supervisors: Vec<Box<dyn Supervisor>>,
}

/// Outcome of running the whole chain on one cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainReport {
    /// Warnings raised before evaluation ended, prefixed with the name of the supervisor
    pub warnings: Vec<String>,

    /// The abort which ended the evaluation, if any
    pub abort: Option<ChainAbort>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainAbort {
    /// Name of the supervisor which aborted
    pub supervisor: String,

    pub code: StatusCode,

    pub message: String,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Availability of the platform pose on this cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PoseStatus {
    /// Both world and odometry poses are known
    Available(PosePair),

    /// No odometry observation has been received yet
    NoObservation,

    /// Odometry was received but it can't be expressed in the world frame
    TransformUnavailable,
}

/// The verdict of one supervisor on one cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Continue,

    /// Keep going but report the message
    Warning(String),

    /// Stop following the path with the given code
    Abort { code: StatusCode, message: String },
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

pub trait Supervisor: Send {
    fn name(&self) -> &str;

    /// Check the state of this cycle.
    fn supervise(&mut self, ctx: &TickContext) -> Verdict;

    /// Clear any memory kept between cycles, called when a new goal is accepted.
    fn on_new_goal(&mut self) {}

    /// Called when the subpath with the given index becomes active.
    fn on_new_subpath(&mut self, _index: usize) {}
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PoseStatus {
    pub fn pose(&self) -> Option<&PosePair> {
        match self {
            PoseStatus::Available(p) => Some(p),
            _ => None,
        }
    }
}

impl SupervisorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the chain described by the parameters, keeping their order.
    ///
    /// A missing pose is always reported: if no `pose_available` check is configured one without
    /// a time limit is put at the head of the chain.
    pub fn from_params(params: &[SupervisorParams]) -> Self {
        let mut supervisors: Vec<Box<dyn Supervisor>> = Vec::with_capacity(params.len() + 1);

        let has_pose_check = params
            .iter()
            .any(|p| matches!(p, SupervisorParams::PoseAvailable { .. }));
        if !has_pose_check {
            debug!("No pose_available supervisor configured, adding one without a time limit");
            supervisors.push(Box::new(PoseAvailable::new(None)));
        }

        supervisors.extend(params.iter().map(|p| p.build()));

        Self { supervisors }
    }

    /// Add a supervisor at the end of the chain.
    pub fn push(&mut self, supervisor: Box<dyn Supervisor>) {
        self.supervisors.push(supervisor);
    }

    pub fn len(&self) -> usize {
        self.supervisors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.supervisors.is_empty()
    }

    /// Names of the supervisors in evaluation order.
    pub fn names(&self) -> Vec<&str> {
        self.supervisors.iter().map(|s| s.name()).collect()
    }

    /// Run the supervisors in order until the first abort.
    pub fn supervise(&mut self, ctx: &TickContext) -> ChainReport {
        let mut report = ChainReport::default();

        for sup in self.supervisors.iter_mut() {
            match sup.supervise(ctx) {
                Verdict::Continue => (),
                Verdict::Warning(msg) => {
                    trace!("{} warning: {}", sup.name(), msg);
                    report.warnings.push(format!("{}: {}", sup.name(), msg));
                }
                Verdict::Abort { code, message } => {
                    report.abort = Some(ChainAbort {
                        supervisor: sup.name().to_string(),
                        code,
                        message,
                    });
                    break;
                }
            }
        }

        report
    }

    pub fn on_new_goal(&mut self) {
        for sup in self.supervisors.iter_mut() {
            sup.on_new_goal();
        }
    }

    pub fn on_new_subpath(&mut self, index: usize) {
        for sup in self.supervisors.iter_mut() {
            sup.on_new_subpath(index);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::path::{Subpath, Waypoint};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    /// Counts how often it is run and always returns the same verdict.
    struct Counting {
        name: &'static str,
        verdict: Verdict,
        calls: Arc<AtomicUsize>,
    }

    impl Supervisor for Counting {
        fn name(&self) -> &str {
            self.name
        }

        fn supervise(&mut self, _ctx: &TickContext) -> Verdict {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.verdict.clone()
        }
    }

    fn counting(name: &'static str, verdict: Verdict) -> (Box<dyn Supervisor>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Box::new(Counting {
                name,
                verdict,
                calls: calls.clone(),
            }),
            calls,
        )
    }

    fn path() -> Path {
        Path::new(vec![Subpath::new(vec![
            Waypoint::new(0.0, 0.0, 0.0),
            Waypoint::new(1.0, 0.0, 0.0),
        ])])
    }

    #[test]
    fn test_first_abort_wins() {
        let (warn, warn_calls) = counting("warn", Verdict::Warning("careful".into()));
        let (first, first_calls) = counting(
            "first",
            Verdict::Abort {
                code: StatusCode::PathLost,
                message: "lost".into(),
            },
        );
        let (second, second_calls) = counting(
            "second",
            Verdict::Abort {
                code: StatusCode::Timeout,
                message: "late".into(),
            },
        );

        let mut chain = SupervisorChain::new();
        chain.push(warn);
        chain.push(first);
        chain.push(second);
        assert_eq!(chain.names(), vec!["warn", "first", "second"]);

        let path = path();
        let ctx = TickContext {
            pose: PoseStatus::NoObservation,
            path: &path,
            subpath_index: 0,
            obstacles: None,
            time_s: 0.0,
            tick: 1,
        };

        let report = chain.supervise(&ctx);

        assert_eq!(report.warnings, vec![String::from("warn: careful")]);
        let abort = report.abort.unwrap();
        assert_eq!(abort.code, StatusCode::PathLost);
        assert_eq!(abort.supervisor, "first");

        assert_eq!(warn_calls.load(Ordering::SeqCst), 1);
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_warnings_do_not_stop_evaluation() {
        let (a, a_calls) = counting("a", Verdict::Warning("one".into()));
        let (b, b_calls) = counting("b", Verdict::Continue);
        let (c, c_calls) = counting("c", Verdict::Warning("two".into()));

        let mut chain = SupervisorChain::new();
        chain.push(a);
        chain.push(b);
        chain.push(c);

        let path = path();
        let ctx = TickContext {
            pose: PoseStatus::TransformUnavailable,
            path: &path,
            subpath_index: 0,
            obstacles: None,
            time_s: 0.0,
            tick: 1,
        };

        let report = chain.supervise(&ctx);
        assert!(report.abort.is_none());
        assert_eq!(report.warnings.len(), 2);
        for calls in &[a_calls, b_calls, c_calls] {
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_pose_check_always_present() {
        assert_eq!(SupervisorChain::from_params(&[]).names(), vec!["pose_available"]);

        let chain = SupervisorChain::from_params(&[SupervisorParams::GoalReached {
            tolerance_m: 0.1,
        }]);
        assert_eq!(chain.names(), vec!["pose_available", "goal_reached"]);

        // A configured one keeps its place and is not duplicated
        let chain = SupervisorChain::from_params(&[
            SupervisorParams::GoalReached { tolerance_m: 0.1 },
            SupervisorParams::PoseAvailable {
                max_wait_s: Some(1.0),
            },
        ]);
        assert_eq!(chain.names(), vec!["goal_reached", "pose_available"]);
    }
}
