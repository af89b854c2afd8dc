//! # Kinematic simulation
//!
//! A unicycle model of the platform driven by the follower's commands, running on its own thread
//! and publishing odometry and obstacle observations through a [`FollowerHandle`]. Also provides
//! a simple carrot chasing controller so the executable can drive a goal end to end.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use comms_if::{
    follow::{StatusCode, VelocityCmd},
    obstacle::ObstacleCloud,
    odom::{OdomObs, Twist},
};
use follow_lib::{
    ctrl::{ControlInput, ControlStep, MotionController},
    factory::{parse_params, ControllerFactory},
    follower::FollowerHandle,
    loc::{Frame, Pose},
    path::Subpath,
};
use log::{debug, info, warn};
use nalgebra::{Isometry2, Point2, Vector2};
use serde::Deserialize;
use util::maths::get_ang_dist;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SimParams {
    /// Period of the simulation thread
    pub period_s: f64,

    /// Initial pose `[x, y, theta]` of the platform in the world frame. The odometry frame
    /// starts here.
    pub initial_pose: [f64; 3],

    /// Obstacle points fixed in the world frame
    #[serde(default)]
    pub obstacles_m: Vec<[f64; 2]>,

    /// Obstacles further than this from the platform are not observed
    #[serde(default = "default_sensor_range_m")]
    pub sensor_range_m: f64,
}

/// A running simulation.
pub struct Sim {
    run: Arc<AtomicBool>,
    jh: Option<JoinHandle<()>>,
}

/// Parameters of the [`Carrot`] controller.
#[derive(Debug, Clone, Deserialize)]
pub struct CarrotParams {
    /// Distance ahead of the platform's projection on the subpath at which the carrot is placed
    pub lookahead_m: f64,

    pub speed_ms: f64,

    /// Turn rate demand per radian of heading error
    pub heading_gain: f64,

    pub max_turn_rate_rads: f64,

    /// Distance to the end of a subpath at which it is considered done
    pub tolerance_m: f64,
}

/// Chases a point a fixed distance ahead along the subpath.
#[derive(Debug, Clone)]
pub struct Carrot {
    params: CarrotParams,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Sim {
    /// Start the simulation thread.
    ///
    /// `cmd` is read every step as the current velocity demand.
    pub fn start(params: SimParams, handle: FollowerHandle, cmd: Arc<Mutex<VelocityCmd>>) -> Self {
        let run = Arc::new(AtomicBool::new(true));
        let bg_run = run.clone();

        // The odometry frame is where the platform starts, which localisation reports exactly
        let [x, y, theta] = params.initial_pose;
        let world_from_odom = Isometry2::new(Vector2::new(x, y), theta);
        handle.set_world_from_odom(world_from_odom);

        let jh = thread::spawn(move || bg_thread(params, world_from_odom, handle, cmd, bg_run));

        Self { run, jh: Some(jh) }
    }

    /// Stop the simulation thread and wait for it to exit.
    pub fn stop(&mut self) {
        self.run.store(false, Ordering::Relaxed);

        if let Some(jh) = self.jh.take() {
            if jh.join().is_err() {
                warn!("Simulation thread panicked");
            }
        }
    }
}

impl Drop for Sim {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Carrot {
    pub fn new(params: CarrotParams) -> Self {
        Self { params }
    }

    /// The point `dist_m` along the subpath, clamped to its end.
    fn point_along(subpath: &Subpath, dist_m: f64) -> Option<Vector2<f64>> {
        let mut covered_m = 0.0;

        for seg in subpath.segments() {
            if covered_m + seg.length_m >= dist_m {
                return Some(seg.start_m + seg.direction * (dist_m - covered_m));
            }
            covered_m += seg.length_m;
        }

        subpath.last().map(|w| w.position_m)
    }
}

impl MotionController for Carrot {
    fn name(&self) -> &str {
        "carrot"
    }

    fn step(&mut self, input: &ControlInput) -> ControlStep {
        let pose = &input.pose.world;

        let end = match input.subpath.last() {
            Some(w) => w,
            None => return ControlStep::SubpathDone,
        };

        if (end.position_m - pose.position_m).norm() < self.params.tolerance_m {
            return ControlStep::SubpathDone;
        }

        let progress_m = input.subpath.projected_progress_m(&pose.position_m);
        let carrot = match Self::point_along(input.subpath, progress_m + self.params.lookahead_m) {
            Some(c) => c,
            None => {
                return ControlStep::Failed {
                    code: StatusCode::InternalError,
                    message: "subpath has no waypoints".into(),
                }
            }
        };

        let to_carrot = carrot - pose.position_m;
        let bearing_rad = to_carrot.y.atan2(to_carrot.x);

        // Reversing, the back of the platform points at the carrot
        let (facing_rad, sign) = if end.reverse {
            (pose.heading_rad + std::f64::consts::PI, -1.0)
        } else {
            (pose.heading_rad, 1.0)
        };
        let heading_err_rad = get_ang_dist(facing_rad, bearing_rad);

        let max_speed_ms = end
            .max_speed_ms
            .map_or(self.params.speed_ms, |s| s.min(self.params.speed_ms));
        let linear_ms = sign * max_speed_ms * heading_err_rad.cos().max(0.0);
        let angular_rads = (self.params.heading_gain * heading_err_rad)
            .max(-self.params.max_turn_rate_rads)
            .min(self.params.max_turn_rate_rads);

        ControlStep::Command(VelocityCmd::new(linear_ms, angular_rads))
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Register the controllers provided by the executable.
pub fn register_controllers(factory: &mut ControllerFactory) {
    factory.register("carrot", |v| {
        let params: CarrotParams = parse_params("carrot", v)?;
        Ok(Box::new(Carrot::new(params)))
    });
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Background thread, integrates the platform motion and publishes observations.
fn bg_thread(
    params: SimParams,
    world_from_odom: Isometry2<f64>,
    handle: FollowerHandle,
    cmd: Arc<Mutex<VelocityCmd>>,
    run: Arc<AtomicBool>,
) {
    let [x, y, theta] = params.initial_pose;
    let mut world = Pose::new(Frame::World, x, y, theta);
    let period = Duration::from_secs_f64(params.period_s);
    let start = Instant::now();

    info!("Simulation started at ({:.2}, {:.2}, {:.2})", x, y, theta);

    while run.load(Ordering::Relaxed) {
        let step_start = Instant::now();

        let demand = match cmd.lock() {
            Ok(c) => *c,
            Err(_) => {
                warn!("Command mutex poisoned, stopping the simulation");
                break;
            }
        };

        // Unicycle integration
        let dt = params.period_s;
        let step_m = world.forward2() * demand.linear_ms * dt;
        world.position_m += step_m;
        world.heading_rad = util::maths::wrap_to_pi(world.heading_rad + demand.angular_rads * dt);

        let stamp_s = start.elapsed().as_secs_f64();
        let odom = Pose::from_isometry(Frame::Odom, &(world_from_odom.inverse() * world.isometry()));

        handle.set_odom(OdomObs {
            stamp_s,
            pose: odom.to_pose2d(),
            twist: Twist {
                linear_ms: demand.linear_ms,
                angular_rads: demand.angular_rads,
            },
            covariance: None,
        });

        // Obstacles in the body frame
        let body_from_world = world.isometry().inverse();
        let points_m: Vec<[f64; 2]> = params
            .obstacles_m
            .iter()
            .map(|p| body_from_world * Point2::new(p[0], p[1]))
            .filter(|p| p.coords.norm() <= params.sensor_range_m)
            .map(|p| [p.x, p.y])
            .collect();
        handle.set_obstacles(ObstacleCloud::new(stamp_s, points_m));

        if let Some(d) = period.checked_sub(step_start.elapsed()) {
            thread::sleep(d);
        }
    }

    debug!(
        "Simulation stopped at ({:.2}, {:.2}, {:.2})",
        world.position_m.x, world.position_m.y, world.heading_rad
    );
}

fn default_sensor_range_m() -> f64 {
    5.0
}

#[cfg(test)]
mod test {
    use super::*;
    use follow_lib::{loc::PosePair, path::Waypoint};

    fn carrot() -> Carrot {
        Carrot::new(CarrotParams {
            lookahead_m: 0.5,
            speed_ms: 0.4,
            heading_gain: 1.0,
            max_turn_rate_rads: 0.5,
            tolerance_m: 0.1,
        })
    }

    fn input_at<'a>(pose: &'a PosePair, subpath: &'a Subpath) -> ControlInput<'a> {
        ControlInput {
            pose,
            subpath,
            subpath_index: 0,
            num_subpaths: 1,
            course: None,
            tick: 1,
            time_s: 0.0,
        }
    }

    fn pair(x: f64, y: f64, heading_rad: f64) -> PosePair {
        PosePair {
            world: Pose::new(Frame::World, x, y, heading_rad),
            odom: Pose::new(Frame::Odom, x, y, heading_rad),
        }
    }

    #[test]
    fn test_carrot() {
        let sub = Subpath::new(vec![
            Waypoint::new(0.0, 0.0, 0.0),
            Waypoint::new(2.0, 0.0, 0.0),
        ]);
        let mut c = carrot();

        // On the path and aligned, straight ahead at full speed
        let p = pair(0.5, 0.0, 0.0);
        match c.step(&input_at(&p, &sub)) {
            ControlStep::Command(cmd) => {
                assert!((cmd.linear_ms - 0.4).abs() < 1e-9);
                assert!(cmd.angular_rads.abs() < 1e-9);
            }
            s => panic!("Unexpected step {:?}", s),
        }

        // Left of the path, turn right
        let p = pair(0.5, 0.5, 0.0);
        match c.step(&input_at(&p, &sub)) {
            ControlStep::Command(cmd) => assert!(cmd.angular_rads < 0.0),
            s => panic!("Unexpected step {:?}", s),
        }

        let p = pair(1.95, 0.0, 0.0);
        assert_eq!(c.step(&input_at(&p, &sub)), ControlStep::SubpathDone);
    }

    #[test]
    fn test_carrot_reverse() {
        let mut end = Waypoint::new(-2.0, 0.0, 0.0);
        end.reverse = true;
        let sub = Subpath::new(vec![Waypoint::new(0.0, 0.0, 0.0), end]);
        let mut c = carrot();

        let p = pair(0.0, 0.0, 0.0);
        match c.step(&input_at(&p, &sub)) {
            ControlStep::Command(cmd) => {
                assert!(cmd.linear_ms < 0.0);
                assert!(cmd.angular_rads.abs() < 1e-9);
            }
            s => panic!("Unexpected step {:?}", s),
        }
    }
}
