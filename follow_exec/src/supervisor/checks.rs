//! # Built-in supervisors

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::follow::StatusCode;
use log::debug;

use super::{PoseStatus, Supervisor, TickContext, Verdict};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Warns while no pose is available, and aborts if that lasts longer than `max_wait_s`.
#[derive(Debug, Clone)]
pub struct PoseAvailable {
    max_wait_s: Option<f64>,

    /// Time at which the pose was first found to be unavailable
    unavailable_since_s: Option<f64>,
}

/// Aborts when the platform strays too far from the active subpath.
#[derive(Debug, Clone)]
pub struct PathDeviation {
    max_distance_m: f64,
    warn_distance_m: Option<f64>,
}

/// Aborts when an obstacle is closer than `min_distance_m` to the platform.
#[derive(Debug, Clone)]
pub struct ObstacleProximity {
    min_distance_m: f64,
    warn_distance_m: Option<f64>,
}

/// Ends the goal successfully once the final waypoint is reached.
#[derive(Debug, Clone)]
pub struct GoalReached {
    tolerance_m: f64,
}

/// Aborts if the platform stops making progress towards the end of the active subpath.
#[derive(Debug, Clone)]
pub struct WaypointTimeout {
    timeout_s: f64,
    min_progress_m: f64,

    /// Smallest remaining distance seen on the active subpath
    best_remaining_m: Option<f64>,

    /// Time at which the best remaining distance was achieved
    last_progress_s: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PoseAvailable {
    pub fn new(max_wait_s: Option<f64>) -> Self {
        Self {
            max_wait_s,
            unavailable_since_s: None,
        }
    }
}

impl Supervisor for PoseAvailable {
    fn name(&self) -> &str {
        "pose_available"
    }

    fn supervise(&mut self, ctx: &TickContext) -> Verdict {
        let (code, msg) = match ctx.pose {
            PoseStatus::Available(_) => {
                if let Some(since) = self.unavailable_since_s.take() {
                    debug!("Pose available again after {:.2} s", ctx.time_s - since);
                }
                return Verdict::Continue;
            }
            PoseStatus::NoObservation => (StatusCode::SlamFail, "no pose observation received"),
            PoseStatus::TransformUnavailable => {
                (StatusCode::TfFail, "world to odometry transform unavailable")
            }
        };

        let since = *self.unavailable_since_s.get_or_insert(ctx.time_s);
        let waited_s = ctx.time_s - since;

        match self.max_wait_s {
            Some(max) if waited_s > max => Verdict::Abort {
                code,
                message: format!("{} for {:.2} s", msg, waited_s),
            },
            _ => Verdict::Warning(msg.to_string()),
        }
    }

    fn on_new_goal(&mut self) {
        self.unavailable_since_s = None;
    }
}

impl PathDeviation {
    pub fn new(max_distance_m: f64, warn_distance_m: Option<f64>) -> Self {
        Self {
            max_distance_m,
            warn_distance_m,
        }
    }
}

impl Supervisor for PathDeviation {
    fn name(&self) -> &str {
        "path_deviation"
    }

    fn supervise(&mut self, ctx: &TickContext) -> Verdict {
        let pose = match ctx.pose.pose() {
            Some(p) => p,
            None => return Verdict::Continue,
        };

        let dist_m = match ctx
            .path
            .subpath(ctx.subpath_index)
            .and_then(|s| s.distance_to(&pose.world.position_m))
        {
            Some(d) => d,
            None => return Verdict::Continue,
        };

        if dist_m > self.max_distance_m {
            Verdict::Abort {
                code: StatusCode::PathLost,
                message: format!(
                    "{:.2} m from subpath {}, limit is {:.2} m",
                    dist_m, ctx.subpath_index, self.max_distance_m
                ),
            }
        } else if self.warn_distance_m.map_or(false, |w| dist_m > w) {
            Verdict::Warning(format!("{:.2} m from the path", dist_m))
        } else {
            Verdict::Continue
        }
    }
}

impl ObstacleProximity {
    pub fn new(min_distance_m: f64, warn_distance_m: Option<f64>) -> Self {
        Self {
            min_distance_m,
            warn_distance_m,
        }
    }
}

impl Supervisor for ObstacleProximity {
    fn name(&self) -> &str {
        "obstacle_proximity"
    }

    fn supervise(&mut self, ctx: &TickContext) -> Verdict {
        // Points are in the body frame so the distance is to the platform itself
        let dist_m = match ctx.obstacles.and_then(|o| o.nearest_distance_m()) {
            Some(d) => d,
            None => return Verdict::Continue,
        };

        if dist_m < self.min_distance_m {
            Verdict::Abort {
                code: StatusCode::Obstacle,
                message: format!(
                    "obstacle at {:.2} m, minimum is {:.2} m",
                    dist_m, self.min_distance_m
                ),
            }
        } else if self.warn_distance_m.map_or(false, |w| dist_m < w) {
            Verdict::Warning(format!("obstacle at {:.2} m", dist_m))
        } else {
            Verdict::Continue
        }
    }
}

impl GoalReached {
    pub fn new(tolerance_m: f64) -> Self {
        Self { tolerance_m }
    }
}

impl Supervisor for GoalReached {
    fn name(&self) -> &str {
        "goal_reached"
    }

    fn supervise(&mut self, ctx: &TickContext) -> Verdict {
        if ctx.subpath_index + 1 < ctx.path.num_subpaths() {
            return Verdict::Continue;
        }

        let (pose, goal) = match (ctx.pose.pose(), ctx.path.last_waypoint()) {
            (Some(p), Some(g)) => (p, g),
            _ => return Verdict::Continue,
        };

        let dist_m = (goal.position_m - pose.world.position_m).norm();
        if dist_m <= self.tolerance_m {
            Verdict::Abort {
                code: StatusCode::Success,
                message: format!("goal reached, {:.3} m from the final waypoint", dist_m),
            }
        } else {
            Verdict::Continue
        }
    }
}

impl WaypointTimeout {
    pub fn new(timeout_s: f64, min_progress_m: f64) -> Self {
        Self {
            timeout_s,
            min_progress_m,
            best_remaining_m: None,
            last_progress_s: 0.0,
        }
    }

    fn reset(&mut self) {
        self.best_remaining_m = None;
        self.last_progress_s = 0.0;
    }
}

impl Supervisor for WaypointTimeout {
    fn name(&self) -> &str {
        "waypoint_timeout"
    }

    fn supervise(&mut self, ctx: &TickContext) -> Verdict {
        let (pose, target) = match (
            ctx.pose.pose(),
            ctx.path.subpath(ctx.subpath_index).and_then(|s| s.last()),
        ) {
            (Some(p), Some(t)) => (p, t),
            _ => return Verdict::Continue,
        };

        let remaining_m = (target.position_m - pose.world.position_m).norm();

        match self.best_remaining_m {
            Some(best) if remaining_m > best - self.min_progress_m => (),
            _ => {
                self.best_remaining_m = Some(remaining_m);
                self.last_progress_s = ctx.time_s;
                return Verdict::Continue;
            }
        }

        let stalled_s = ctx.time_s - self.last_progress_s;
        if stalled_s > self.timeout_s {
            Verdict::Abort {
                code: StatusCode::Timeout,
                message: format!(
                    "no progress towards the end of subpath {} for {:.1} s",
                    ctx.subpath_index, stalled_s
                ),
            }
        } else {
            Verdict::Continue
        }
    }

    fn on_new_goal(&mut self) {
        self.reset();
    }

    fn on_new_subpath(&mut self, _index: usize) {
        self.reset();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        loc::{Frame, Pose, PosePair},
        path::{Path, Subpath, Waypoint},
    };
    use comms_if::obstacle::ObstacleCloud;

    /// Two subpaths: (0,0) -> (2,0) then (2,0) -> (2,2)
    fn path() -> Path {
        Path::new(vec![
            Subpath::new(vec![
                Waypoint::new(0.0, 0.0, 0.0),
                Waypoint::new(1.0, 0.0, 0.0),
                Waypoint::new(2.0, 0.0, 0.0),
            ]),
            Subpath::new(vec![
                Waypoint::new(2.0, 0.0, 0.0),
                Waypoint::new(2.0, 1.0, 0.0),
                Waypoint::new(2.0, 2.0, 0.0),
            ]),
        ])
    }

    fn at(x: f64, y: f64) -> PoseStatus {
        PoseStatus::Available(PosePair {
            world: Pose::new(Frame::World, x, y, 0.0),
            odom: Pose::new(Frame::Odom, x, y, 0.0),
        })
    }

    fn ctx<'a>(
        path: &'a Path,
        pose: PoseStatus,
        subpath_index: usize,
        time_s: f64,
    ) -> TickContext<'a> {
        TickContext {
            pose,
            path,
            subpath_index,
            obstacles: None,
            time_s,
            tick: 1,
        }
    }

    fn code(v: &Verdict) -> Option<StatusCode> {
        match v {
            Verdict::Abort { code, .. } => Some(*code),
            _ => None,
        }
    }

    #[test]
    fn test_pose_available() {
        let path = path();

        // Without a limit only warnings are raised
        let mut s = PoseAvailable::new(None);
        for i in 0..10 {
            let v = s.supervise(&ctx(&path, PoseStatus::NoObservation, 0, i as f64 * 10.0));
            assert!(matches!(v, Verdict::Warning(_)));
        }

        let mut s = PoseAvailable::new(Some(1.0));
        let v = s.supervise(&ctx(&path, PoseStatus::TransformUnavailable, 0, 0.0));
        assert!(matches!(v, Verdict::Warning(_)));
        let v = s.supervise(&ctx(&path, PoseStatus::TransformUnavailable, 0, 1.5));
        assert_eq!(code(&v), Some(StatusCode::TfFail));

        // Recovery restarts the wait
        assert_eq!(s.supervise(&ctx(&path, at(0.0, 0.0), 0, 2.0)), Verdict::Continue);
        let v = s.supervise(&ctx(&path, PoseStatus::NoObservation, 0, 3.0));
        assert!(matches!(v, Verdict::Warning(_)));
        let v = s.supervise(&ctx(&path, PoseStatus::NoObservation, 0, 4.5));
        assert_eq!(code(&v), Some(StatusCode::SlamFail));
    }

    #[test]
    fn test_path_deviation() {
        let path = path();
        let mut s = PathDeviation::new(1.0, Some(0.5));

        assert_eq!(s.supervise(&ctx(&path, at(1.0, 0.1), 0, 0.0)), Verdict::Continue);
        assert!(matches!(
            s.supervise(&ctx(&path, at(1.0, 0.7), 0, 0.0)),
            Verdict::Warning(_)
        ));
        assert_eq!(
            code(&s.supervise(&ctx(&path, at(1.0, 1.5), 0, 0.0))),
            Some(StatusCode::PathLost)
        );

        // The same position is on the second subpath
        assert_eq!(s.supervise(&ctx(&path, at(2.0, 1.5), 1, 0.0)), Verdict::Continue);

        // No pose is left to pose_available
        assert_eq!(
            s.supervise(&ctx(&path, PoseStatus::NoObservation, 0, 0.0)),
            Verdict::Continue
        );
    }

    #[test]
    fn test_obstacle_proximity() {
        let path = path();
        let mut s = ObstacleProximity::new(0.3, Some(1.0));

        let far = ObstacleCloud::new(0.0, vec![[3.0, 0.0]]);
        let near = ObstacleCloud::new(0.0, vec![[3.0, 0.0], [0.6, 0.0]]);
        let close = ObstacleCloud::new(0.0, vec![[0.2, 0.1]]);

        let mut c = ctx(&path, at(0.0, 0.0), 0, 0.0);
        assert_eq!(s.supervise(&c), Verdict::Continue);

        c.obstacles = Some(&far);
        assert_eq!(s.supervise(&c), Verdict::Continue);

        c.obstacles = Some(&near);
        assert!(matches!(s.supervise(&c), Verdict::Warning(_)));

        c.obstacles = Some(&close);
        assert_eq!(code(&s.supervise(&c)), Some(StatusCode::Obstacle));
    }

    #[test]
    fn test_goal_reached() {
        let path = path();
        let mut s = GoalReached::new(0.1);

        // At the end of the first subpath, not the goal
        assert_eq!(s.supervise(&ctx(&path, at(2.0, 2.0), 0, 0.0)), Verdict::Continue);
        assert_eq!(s.supervise(&ctx(&path, at(2.0, 1.5), 1, 0.0)), Verdict::Continue);
        assert_eq!(
            code(&s.supervise(&ctx(&path, at(2.05, 1.95), 1, 0.0))),
            Some(StatusCode::Success)
        );
    }

    #[test]
    fn test_waypoint_timeout() {
        let path = path();
        let mut s = WaypointTimeout::new(2.0, 0.1);

        assert_eq!(s.supervise(&ctx(&path, at(0.0, 0.0), 0, 0.0)), Verdict::Continue);
        assert_eq!(s.supervise(&ctx(&path, at(0.5, 0.0), 0, 1.0)), Verdict::Continue);

        // Stuck at 0.5 m
        assert_eq!(s.supervise(&ctx(&path, at(0.55, 0.0), 0, 2.5)), Verdict::Continue);
        assert_eq!(
            code(&s.supervise(&ctx(&path, at(0.55, 0.0), 0, 3.5))),
            Some(StatusCode::Timeout)
        );

        // A new subpath restarts the timer
        s.on_new_subpath(1);
        assert_eq!(s.supervise(&ctx(&path, at(2.0, 0.0), 1, 4.0)), Verdict::Continue);
        assert_eq!(s.supervise(&ctx(&path, at(2.0, 0.0), 1, 5.0)), Verdict::Continue);
        assert_eq!(
            code(&s.supervise(&ctx(&path, at(2.0, 0.0), 1, 6.5))),
            Some(StatusCode::Timeout)
        );

        s.on_new_goal();
        assert_eq!(s.supervise(&ctx(&path, at(2.0, 0.0), 1, 7.0)), Verdict::Continue);
    }
}
