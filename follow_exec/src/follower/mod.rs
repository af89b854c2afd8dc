//! # Path follower
//!
//! The path follower is the top level state machine of the crate. It owns the goal path, the
//! motion controller and obstacle avoider built for that goal, the supervisor chain, and the
//! pose of the platform.
//!
//! Each call to [`PathFollower::update`] is one control cycle:
//!
//!  1. Apply stop requests made through a [`FollowerHandle`], and finalise the goal if an error
//!     is pending from the previous cycle.
//!  2. Refresh the world and odometry poses from the latest odometry observation.
//!  3. Run the supervisor chain. An abort does not stop the goal immediately, it is recorded as
//!     pending, a stop command is emitted and the goal is finalised on the next cycle.
//!  4. Step the motion controller on the active subpath, moving on to the next subpath when it
//!     reports the current one as done.
//!  5. Pass the command through the obstacle avoider.
//!  6. Emit the command and return the feedback, or the result on the cycle the goal ends.
//!
//! Emergency stops are the exception to the one cycle deferral, they stop the goal straight
//! away.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod handle;
mod params;

pub use handle::FollowerHandle;
pub use params::{FollowerParams, StrategyParams};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::{sync::Arc, time::Instant};

use comms_if::{
    follow::{FollowPathFeedback, FollowPathGoal, FollowPathResult, StatusCode, VelocityCmd},
    obstacle::ObstacleCloud,
    odom::OdomObs,
};
use log::{debug, info, trace, warn};

use crate::{
    avoid::{Avoidance, ObstacleAvoider},
    course::CoursePredictor,
    ctrl::{ControlInput, ControlStep, MotionController},
    factory::{AvoiderFactory, ControllerFactory, FactoryError},
    loc::{Frame, FrameError, FrameTransformer, Pose, PosePair},
    path::{segment, Path, Waypoint},
    supervisor::{PoseStatus, SupervisorChain, TickContext},
    viz::{NullVisualizer, Visualizer},
};
use handle::{Shared, StopRequest};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct PathFollower {
    params: FollowerParams,

    controllers: ControllerFactory,
    avoiders: AvoiderFactory,

    supervisors: SupervisorChain,
    course: CoursePredictor,
    frames: FrameTransformer,

    /// Data shared with the handles
    shared: Arc<Shared>,

    sink: Box<dyn CmdSink>,
    visualizer: Box<dyn Visualizer>,

    state: FollowerState,

    /// The accepted goal, kept after it finishes so it can still be inspected
    goal: Option<ActiveGoal>,

    /// Error to finalise the goal with on the next cycle
    pending: Option<PendingError>,

    /// Result of a goal stopped outside of `update`, returned by the next call to it
    unreported: Option<FollowPathResult>,

    pose: Option<PosePair>,
    obstacles: Option<Arc<ObstacleCloud>>,

    /// The last command sent to the sink
    last_cmd: VelocityCmd,

    last_obstacle_warn: Option<Instant>,
}

/// A goal and the strategies built for it.
struct ActiveGoal {
    path: Path,
    controller: Box<dyn MotionController>,
    avoider: Box<dyn ObstacleAvoider>,
    subpath_index: usize,

    /// Number of cycles run on this goal
    tick: u64,

    started: Option<Instant>,
}

#[derive(Debug, Clone)]
struct PendingError {
    code: StatusCode,
    message: String,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FollowerState {
    /// Nothing is being followed, `update` does nothing
    Idle,

    Running,

    /// The last goal has ended
    Stopped(StopReason),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopReason {
    Success,
    Aborted(StatusCode),
    EmergencyStop,
}

/// What a cycle produced.
#[derive(Debug, Clone, PartialEq)]
pub enum FollowOutcome {
    /// The goal is still running
    Feedback(FollowPathFeedback),

    /// The goal ended on this cycle
    Result(FollowPathResult),
}

#[derive(Debug, thiserror::Error)]
pub enum FollowerError {
    #[error("Could not load parameters: {0}")]
    ParamLoadError(util::params::LoadError),

    #[error("Cannot follow a path with no waypoints")]
    EmptyPath,

    #[error("No goal has been set")]
    NoGoal,

    #[error("A goal is already running")]
    AlreadyRunning,

    #[error("The pose of the platform is not known")]
    NoPose,

    #[error("Could not build strategy: {0}")]
    StrategyError(FactoryError),

    #[error("Frame error: {0}")]
    FrameError(FrameError),
}

/// Outcome of stepping the controller, after subpath changes have been handled.
enum StepOutcome {
    Command(VelocityCmd),
    PathDone,
    Failed { code: StatusCode, message: String },
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Receives the velocity commands emitted by the follower.
pub trait CmdSink: Send {
    fn send_cmd(&mut self, cmd: &VelocityCmd);
}

impl<F> CmdSink for F
where
    F: FnMut(&VelocityCmd) + Send,
{
    fn send_cmd(&mut self, cmd: &VelocityCmd) {
        self(cmd)
    }
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PathFollower {
    /// Create a new follower.
    ///
    /// The configured default controller and the avoider are built once here so that unknown
    /// names or bad parameters are reported at startup rather than on the first goal.
    pub fn new(
        params: FollowerParams,
        controllers: ControllerFactory,
        avoiders: AvoiderFactory,
        sink: Box<dyn CmdSink>,
    ) -> Result<Self, FollowerError> {
        let strategy = &params.strategy;
        controllers
            .build(&strategy.controller, &strategy.controller_table(&strategy.controller))
            .map_err(FollowerError::StrategyError)?;
        avoiders
            .build(&strategy.avoider, &strategy.avoider_table(&strategy.avoider))
            .map_err(FollowerError::StrategyError)?;

        Ok(Self {
            supervisors: SupervisorChain::from_params(&params.supervisors),
            course: CoursePredictor::new(params.course.clone()),
            frames: FrameTransformer::from_params(&params.frames),
            params,
            controllers,
            avoiders,
            shared: Arc::new(Shared::default()),
            sink,
            visualizer: Box::new(NullVisualizer),
            state: FollowerState::Idle,
            goal: None,
            pending: None,
            unreported: None,
            pose: None,
            obstacles: None,
            last_cmd: VelocityCmd::stop(),
            last_obstacle_warn: None,
        })
    }

    /// Create a new follower, loading the parameters from the given file in the parameters
    /// directory.
    pub fn init(
        params_path: &str,
        controllers: ControllerFactory,
        avoiders: AvoiderFactory,
        sink: Box<dyn CmdSink>,
    ) -> Result<Self, FollowerError> {
        let params = util::params::load(params_path).map_err(FollowerError::ParamLoadError)?;

        Self::new(params, controllers, avoiders, sink)
    }

    /// Use the given visualizer instead of discarding the visualisation outputs.
    pub fn with_visualizer(mut self, visualizer: Box<dyn Visualizer>) -> Self {
        self.visualizer = visualizer;
        self
    }

    /// Get a handle through which other threads can feed observations and request stops.
    pub fn handle(&self) -> FollowerHandle {
        FollowerHandle::new(self.shared.clone())
    }

    /// Accept a new goal.
    ///
    /// The path is segmented and the goal's strategies are built, but following only begins
    /// after a call to `start`. If a goal is running it is stopped first and its result is
    /// discarded. An invalid goal is rejected without affecting the current one.
    pub fn set_goal(&mut self, goal: &FollowPathGoal) -> Result<(), FollowerError> {
        if goal.waypoints.is_empty() {
            return Err(FollowerError::EmptyPath);
        }

        let strategy = &self.params.strategy;
        let controller_name = goal
            .controller
            .clone()
            .unwrap_or_else(|| strategy.controller.clone());

        let controller = self
            .controllers
            .build(&controller_name, &strategy.controller_table(&controller_name))
            .map_err(FollowerError::StrategyError)?;
        let avoider = self
            .avoiders
            .build(&strategy.avoider, &strategy.avoider_table(&strategy.avoider))
            .map_err(FollowerError::StrategyError)?;

        let waypoints: Vec<Waypoint> = goal.waypoints.iter().map(Waypoint::from).collect();
        let path = segment(&waypoints, goal.force_single_segment, &self.params.segmenter);

        if self.state == FollowerState::Running {
            warn!("New goal received while running, stopping the current goal");
            let discarded = self.finalise(StatusCode::Aborted, "preempted by a new goal".into());
            debug!("Discarded result of the preempted goal: {:?}", discarded);
        }
        if let Some(r) = self.unreported.take() {
            warn!("Result of the previous goal was never reported: {:?}", r);
        }

        info!(
            "Goal accepted: {} waypoints in {} subpath(s), {:.2} m, controller \"{}\"",
            waypoints.len(),
            path.num_subpaths(),
            path.length_m(),
            controller_name
        );

        self.goal = Some(ActiveGoal {
            path,
            controller,
            avoider,
            subpath_index: 0,
            tick: 0,
            started: None,
        });

        self.state = FollowerState::Idle;
        self.pending = None;
        self.last_obstacle_warn = None;
        self.course.reset();
        self.supervisors.on_new_goal();

        Ok(())
    }

    /// Start following the goal set by `set_goal`.
    pub fn start(&mut self) -> Result<(), FollowerError> {
        match self.state {
            FollowerState::Running => return Err(FollowerError::AlreadyRunning),
            // The previous goal has finished, a new one must be set
            FollowerState::Stopped(_) => return Err(FollowerError::NoGoal),
            FollowerState::Idle => (),
        }

        let goal = self.goal.as_mut().ok_or(FollowerError::NoGoal)?;
        goal.started = Some(Instant::now());
        goal.tick = 0;
        goal.subpath_index = 0;
        Self::enter_subpath(goal, &mut self.supervisors, self.visualizer.as_mut());

        info!("Starting goal");
        self.state = FollowerState::Running;

        Ok(())
    }

    /// Request the running goal to end with the given code on the next cycle.
    ///
    /// If an error is already pending it takes precedence.
    pub fn stop(&mut self, code: StatusCode) {
        if self.state == FollowerState::Running {
            self.set_pending(code, format!("stop requested ({})", code));
        } else {
            debug!("Stop({}) ignored, no goal is running", code);
        }
    }

    /// Stop the platform immediately.
    ///
    /// A running goal ends straight away, its `EmergencyStop` result is returned by the next
    /// call to `update`.
    pub fn emergency_stop(&mut self) {
        if self.state == FollowerState::Running {
            let result = self.finalise(StatusCode::EmergencyStop, "emergency stop".into());
            self.unreported = Some(result);
        } else {
            self.emit(VelocityCmd::stop());
        }
    }

    /// Run one control cycle.
    ///
    /// Returns `None` if there is nothing to report, i.e. no goal is running and no result is
    /// waiting to be returned.
    pub fn update(&mut self) -> Option<FollowOutcome> {
        let snapshot = self.shared.snapshot();

        if let Some(t) = snapshot.world_from_odom {
            self.frames.set_world_from_odom(t);
        }
        self.obstacles = snapshot.obstacles;
        let pose_status = self.refresh_pose(snapshot.odom.as_ref());

        if let Some(result) = self.unreported.take() {
            return Some(FollowOutcome::Result(result));
        }

        if self.state != FollowerState::Running {
            if let Some(req) = snapshot.request {
                debug!("{:?} ignored, no goal is running", req);
            }
            return None;
        }

        // ---- REQUESTS AND PENDING ERRORS ----

        match snapshot.request {
            Some(StopRequest::Emergency) => {
                let result =
                    self.finalise(StatusCode::EmergencyStop, "emergency stop requested".into());
                return Some(FollowOutcome::Result(result));
            }
            Some(StopRequest::Stop(code)) => {
                self.set_pending(code, format!("stop requested ({})", code))
            }
            None => (),
        }

        if let Some(p) = self.pending.take() {
            return Some(FollowOutcome::Result(self.finalise(p.code, p.message)));
        }

        let (tick, time_s) = match self.goal.as_mut() {
            Some(g) => {
                g.tick += 1;
                (g.tick, g.started.map_or(0.0, |s| s.elapsed().as_secs_f64()))
            }
            None => {
                let result =
                    self.finalise(StatusCode::InternalError, "running without a goal".into());
                return Some(FollowOutcome::Result(result));
            }
        };

        if let PoseStatus::Available(pose) = pose_status {
            self.course.update(time_s, pose.world.position_m);
            self.visualizer.publish_driven_pose(time_s, &pose);
        }

        // ---- SUPERVISION ----

        let report = match &self.goal {
            Some(goal) => {
                let ctx = TickContext {
                    pose: pose_status,
                    path: &goal.path,
                    subpath_index: goal.subpath_index,
                    obstacles: self.obstacles.as_deref(),
                    time_s,
                    tick,
                };
                self.supervisors.supervise(&ctx)
            }
            None => Default::default(),
        };
        let mut warnings = report.warnings;

        if let Some(abort) = report.abort {
            let message = format!("{}: {}", abort.supervisor, abort.message);

            if abort.code == StatusCode::EmergencyStop {
                return Some(FollowOutcome::Result(self.finalise(abort.code, message)));
            }

            warn!("Supervisor abort with {}, {}", abort.code, message);
            self.set_pending(abort.code, message);

            let cmd = VelocityCmd::stop();
            self.emit(cmd);
            return Some(FollowOutcome::Feedback(self.feedback(warnings, false, Some(cmd))));
        }

        // ---- MOTION CONTROL ----

        let pose = match pose_status.pose() {
            Some(p) => *p,
            None => {
                trace!("No pose available, holding position");
                let cmd = VelocityCmd::stop();
                self.emit(cmd);
                return Some(FollowOutcome::Feedback(self.feedback(warnings, false, Some(cmd))));
            }
        };

        let mut obstacle_ahead = false;
        let cmd = match self.step_controller(&pose, tick, time_s) {
            StepOutcome::Command(cmd) => {
                // ---- OBSTACLE AVOIDANCE ----
                Some(self.avoid(cmd, &pose, &mut warnings, &mut obstacle_ahead))
            }
            StepOutcome::PathDone => {
                info!("Path completed");
                self.set_pending(StatusCode::Success, "path completed");
                None
            }
            StepOutcome::Failed { code, message } => {
                warn!("Motion controller failed with {}: {}", code, message);
                self.set_pending(code, message);
                Some(VelocityCmd::stop())
            }
        };

        if let Some(c) = cmd {
            self.emit(c);
        }

        Some(FollowOutcome::Feedback(self.feedback(warnings, obstacle_ahead, cmd)))
    }

    // ---- ACCESSORS ----

    pub fn state(&self) -> FollowerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == FollowerState::Running
    }

    /// The last command sent to the sink.
    pub fn get_velocity(&self) -> VelocityCmd {
        self.last_cmd
    }

    pub fn get_world_pose(&self) -> Option<Pose> {
        self.pose.map(|p| p.world)
    }

    pub fn get_odom_pose(&self) -> Option<Pose> {
        self.pose.map(|p| p.odom)
    }

    /// The path of the current or last goal.
    pub fn get_path(&self) -> Option<&Path> {
        self.goal.as_ref().map(|g| &g.path)
    }

    pub fn get_subpath_index(&self) -> Option<usize> {
        self.goal.as_ref().map(|g| g.subpath_index)
    }

    pub fn get_obstacle_cloud(&self) -> Option<Arc<ObstacleCloud>> {
        self.obstacles.clone()
    }

    pub fn course_predictor(&self) -> &CoursePredictor {
        &self.course
    }

    pub fn frame_transformer(&self) -> &FrameTransformer {
        &self.frames
    }

    pub fn params(&self) -> &FollowerParams {
        &self.params
    }

    /// Name of the frame goal paths are given in.
    pub fn fixed_frame_id(&self) -> &str {
        &self.params.frames.world_frame_id
    }

    /// Name of the controller built for the current or last goal.
    pub fn controller_name(&self) -> Option<&str> {
        self.goal.as_ref().map(|g| g.controller.name())
    }

    /// Express a pose relative to the platform body.
    pub fn transform_to_local(&self, pose: &Pose) -> Result<Pose, FollowerError> {
        let body = self.pose.as_ref().ok_or(FollowerError::NoPose)?;
        self.frames
            .to_local(body, pose)
            .map_err(FollowerError::FrameError)
    }

    /// Express a pose in the world frame. Body frame poses are taken relative to the platform.
    pub fn transform_to_global(&self, local: &Pose) -> Result<Pose, FollowerError> {
        let body = self.pose.as_ref().ok_or(FollowerError::NoPose)?;
        self.frames
            .to_global(body, local)
            .map_err(FollowerError::FrameError)
    }

    // ---- PRIVATE ----

    /// Build the pose pair from the latest odometry observation.
    fn refresh_pose(&mut self, odom: Option<&OdomObs>) -> PoseStatus {
        let odom = match odom {
            Some(o) => o,
            None => return PoseStatus::NoObservation,
        };

        match self
            .frames
            .pose_pair(&Pose::from_pose2d(Frame::Odom, &odom.pose))
        {
            Ok(pair) => {
                self.pose = Some(pair);
                PoseStatus::Available(pair)
            }
            Err(e) => {
                trace!("No world pose: {}", e);
                PoseStatus::TransformUnavailable
            }
        }
    }

    /// Step the controller, advancing through completed and zero length subpaths.
    fn step_controller(&mut self, pose: &PosePair, tick: u64, time_s: f64) -> StepOutcome {
        let course = self.course.predict();

        let goal = match self.goal.as_mut() {
            Some(g) => g,
            None => {
                return StepOutcome::Failed {
                    code: StatusCode::InternalError,
                    message: "no goal".into(),
                }
            }
        };
        let num_subpaths = goal.path.num_subpaths();

        loop {
            // Subpaths which can't be driven are never given to the controller
            while goal
                .path
                .subpath(goal.subpath_index)
                .map_or(true, |s| s.length_m() <= 0.0)
            {
                debug!("Skipping zero length subpath {}", goal.subpath_index);
                if goal.subpath_index + 1 >= num_subpaths {
                    return StepOutcome::PathDone;
                }
                goal.subpath_index += 1;
                Self::enter_subpath(goal, &mut self.supervisors, self.visualizer.as_mut());
            }

            let index = goal.subpath_index;
            let input = ControlInput {
                pose,
                subpath: &goal.path.subpaths[index],
                subpath_index: index,
                num_subpaths,
                course,
                tick,
                time_s,
            };

            match goal.controller.step(&input) {
                ControlStep::Command(cmd) => return StepOutcome::Command(cmd),
                ControlStep::SubpathDone => {
                    if index + 1 >= num_subpaths {
                        return StepOutcome::PathDone;
                    }
                    goal.subpath_index += 1;
                    Self::enter_subpath(goal, &mut self.supervisors, self.visualizer.as_mut());
                }
                ControlStep::PathDone => return StepOutcome::PathDone,
                ControlStep::Failed { code, message } => {
                    return StepOutcome::Failed { code, message }
                }
            }
        }
    }

    /// Notify everything that keeps per-subpath state that the goal's current subpath is new.
    fn enter_subpath(
        goal: &mut ActiveGoal,
        supervisors: &mut SupervisorChain,
        visualizer: &mut dyn Visualizer,
    ) {
        let index = goal.subpath_index;

        if let Some(sub) = goal.path.subpath(index) {
            debug!(
                "Entering subpath {} of {} ({} waypoints, {:.2} m)",
                index + 1,
                goal.path.num_subpaths(),
                sub.len(),
                sub.length_m()
            );
            goal.controller.start_subpath(sub);
            visualizer.publish_subpath(index, sub);
        }

        supervisors.on_new_subpath(index);
    }

    /// Pass the command through the obstacle avoider.
    fn avoid(
        &mut self,
        cmd: VelocityCmd,
        pose: &PosePair,
        warnings: &mut Vec<String>,
        obstacle_ahead: &mut bool,
    ) -> VelocityCmd {
        let course = self.course.predict();
        let (avoidance, avoider_name) = match &self.goal {
            Some(g) => (
                g.avoider
                    .adjust(&cmd, self.obstacles.as_deref(), pose, course.as_ref()),
                g.avoider.name().to_string(),
            ),
            None => return cmd,
        };

        let out = avoidance.command();

        match avoidance {
            Avoidance::Clear(_) => (),
            Avoidance::Adjusted(c) => {
                *obstacle_ahead = true;
                self.warn_obstacle(&format!(
                    "command adjusted from {:?} to {:?} by {}",
                    cmd, c, avoider_name
                ));
            }
            Avoidance::Veto(reason) => {
                *obstacle_ahead = true;
                self.warn_obstacle(&format!("command vetoed by {}: {}", avoider_name, reason));
                warnings.push(format!("{}: {}", avoider_name, reason));

                if self.params.strategy.abort_on_veto {
                    self.set_pending(StatusCode::Obstacle, reason);
                }
            }
        }

        out
    }

    /// Record an error to finalise the goal with on the next cycle. The first one wins.
    fn set_pending<S: Into<String>>(&mut self, code: StatusCode, message: S) {
        let message = message.into();

        if let Some(p) = &self.pending {
            info!(
                "{} ({}) not applied, {} is already pending",
                code, message, p.code
            );
            return;
        }

        debug!("Pending {}: {}", code, message);
        self.pending = Some(PendingError { code, message });
    }

    /// End the running goal, stopping the platform.
    fn finalise(&mut self, code: StatusCode, message: String) -> FollowPathResult {
        self.pending = None;
        self.emit(VelocityCmd::stop());
        self.state = FollowerState::Stopped(StopReason::from(code));

        if code.is_success() {
            info!("Goal succeeded: {}", message);
        } else {
            warn!("Goal ended with {}: {}", code, message);
        }

        FollowPathResult {
            status: code,
            message: Some(message),
        }
    }

    fn emit(&mut self, cmd: VelocityCmd) {
        self.sink.send_cmd(&cmd);
        self.last_cmd = cmd;
    }

    /// Log an obstacle warning at most once per `obstacle_warn_period_s`.
    fn warn_obstacle(&mut self, msg: &str) {
        let now = Instant::now();
        let due = match self.last_obstacle_warn {
            Some(t) => {
                now.duration_since(t).as_secs_f64() >= self.params.obstacle_warn_period_s
            }
            None => true,
        };

        if due {
            warn!("Obstacle: {}", msg);
            self.last_obstacle_warn = Some(now);
        } else {
            trace!("Obstacle: {}", msg);
        }
    }

    fn feedback(
        &self,
        warnings: Vec<String>,
        obstacle_ahead: bool,
        cmd: Option<VelocityCmd>,
    ) -> FollowPathFeedback {
        let (subpath_index, num_subpaths) = match &self.goal {
            Some(g) => (g.subpath_index, g.path.num_subpaths()),
            None => (0, 0),
        };

        FollowPathFeedback {
            subpath_index,
            num_subpaths,
            warnings,
            progress: self.progress(),
            obstacle_ahead,
            cmd,
        }
    }

    /// Fraction of the path length covered, from the projection of the pose on the active
    /// subpath.
    fn progress(&self) -> f64 {
        let goal = match &self.goal {
            Some(g) => g,
            None => return 0.0,
        };

        let total_m = goal.path.length_m();
        if total_m <= 0.0 {
            return 0.0;
        }

        let done_m: f64 = goal
            .path
            .subpaths
            .iter()
            .take(goal.subpath_index)
            .map(|s| s.length_m())
            .sum();
        let current_m = match (self.pose, goal.path.subpath(goal.subpath_index)) {
            (Some(p), Some(s)) => s.projected_progress_m(&p.world.position_m),
            _ => 0.0,
        };

        ((done_m + current_m) / total_m).max(0.0).min(1.0)
    }
}

impl From<StatusCode> for StopReason {
    fn from(code: StatusCode) -> Self {
        match code {
            StatusCode::Success => StopReason::Success,
            StatusCode::EmergencyStop => StopReason::EmergencyStop,
            c => StopReason::Aborted(c),
        }
    }
}
