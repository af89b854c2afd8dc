//! Path follower executable entry point.
//!
//! Follows a goal path loaded from a JSON file with a kinematic simulation of the platform in
//! the loop:
//!
//!     - Initialise the session, logging and parameters
//!     - Build the follower with the executable's controllers
//!     - Start the simulation thread, which feeds odometry and obstacles to the follower
//!     - Main loop, at a fixed period:
//!         - Follower update
//!         - Feedback reporting
//!     - Stop when the follower reports a result

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod sim;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, info, warn};
use std::{
    fs::File,
    path::PathBuf,
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};
use structopt::StructOpt;

// Internal
use comms_if::follow::{FollowPathGoal, StatusCode, VelocityCmd};
use follow_lib::{
    factory::{AvoiderFactory, ControllerFactory},
    follower::{FollowOutcome, FollowerParams, PathFollower},
    viz::ArchiveVisualizer,
};
use sim::{Sim, SimParams};
use util::{
    logger::{logger_init, LevelFilter, FOLLOWER_TARGET},
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Target period of one cycle.
const CYCLE_PERIOD_S: f64 = 0.10;

/// Cycles between two progress reports in the log
const REPORT_EVERY_CYCLES: u64 = 10;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "follow_exec", about = "Follow a goal path in a kinematic simulation")]
struct Opt {
    /// JSON file containing the goal
    #[structopt(parse(from_os_str))]
    goal: PathBuf,

    /// Follower parameter file, relative to the parameters directory
    #[structopt(short, long, default_value = "follow_exec.toml")]
    params: String,

    /// Simulation parameter file, relative to the parameters directory
    #[structopt(long, default_value = "sim.toml")]
    sim_params: String,

    /// Stop the goal with a timeout after this many seconds
    #[structopt(long, default_value = "120")]
    max_duration_s: f64,

    /// Directory in which the session directory is created
    #[structopt(long, parse(from_os_str), default_value = "sessions")]
    sessions_dir: PathBuf,

    /// Log debug messages
    #[structopt(short, long)]
    verbose: bool,

    /// Log trace messages from the follower library
    #[structopt(long)]
    trace_follower: bool,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session =
        Session::new("follow_exec", &opt.sessions_dir).wrap_err("Failed to create the session")?;

    // Initialise logger
    let level = if opt.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let targets: &[(&'static str, LevelFilter)] = if opt.trace_follower {
        &[(FOLLOWER_TARGET, LevelFilter::Trace)]
    } else {
        &[]
    };
    logger_init(level, targets, &session).wrap_err("Failed to initialise logging")?;

    info!("Path Follower Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let params: FollowerParams =
        util::params::load(&opt.params).wrap_err("Could not load follower params")?;
    let sim_params: SimParams =
        util::params::load(&opt.sim_params).wrap_err("Could not load simulation params")?;

    let goal: FollowPathGoal = {
        let file = File::open(&opt.goal)
            .wrap_err_with(|| format!("Could not open goal file {:?}", opt.goal))?;
        serde_json::from_reader(file).wrap_err("Could not parse the goal")?
    };

    info!("Parameters and goal loaded");

    // ---- INITIALISE FOLLOWER ----

    let mut controllers = ControllerFactory::controllers();
    sim::register_controllers(&mut controllers);
    let avoiders = AvoiderFactory::avoiders();

    // The simulation reads the last command emitted
    let cmd = Arc::new(Mutex::new(VelocityCmd::stop()));
    let sink_cmd = cmd.clone();
    let sink = Box::new(move |c: &VelocityCmd| {
        if let Ok(mut current) = sink_cmd.lock() {
            *current = *c;
        }
    });

    let visualizer =
        ArchiveVisualizer::new(&session).wrap_err("Failed to create the visualisation archives")?;

    let mut follower = PathFollower::new(params, controllers, avoiders, sink)
        .wrap_err("Failed to initialise the follower")?
        .with_visualizer(Box::new(visualizer));

    // ---- START ----

    let mut sim = Sim::start(sim_params, follower.handle(), cmd);
    info!("Simulation started");

    follower.set_goal(&goal).wrap_err("Goal rejected")?;
    follower.start().wrap_err("Could not start the goal")?;

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let goal_start = Instant::now();
    let mut num_cycles: u64 = 0;
    let mut timed_out = false;

    let result = loop {
        let cycle_start_instant = Instant::now();

        if !timed_out && goal_start.elapsed().as_secs_f64() > opt.max_duration_s {
            warn!("Goal took longer than {} s, stopping", opt.max_duration_s);
            follower.stop(StatusCode::Timeout);
            timed_out = true;
        }

        match follower.update() {
            Some(FollowOutcome::Feedback(fb)) => {
                for w in fb.warnings.iter() {
                    debug!("Warning: {}", w);
                }

                if num_cycles % REPORT_EVERY_CYCLES == 0 {
                    info!(
                        "Subpath {}/{}, {:.0} % done, cmd {:?}",
                        fb.subpath_index + 1,
                        fb.num_subpaths,
                        fb.progress * 100.0,
                        fb.cmd
                    );
                }
            }
            Some(FollowOutcome::Result(r)) => break r,
            None => return Err(eyre!("Follower stopped without a result")),
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        match Duration::from_secs_f64(CYCLE_PERIOD_S).checked_sub(cycle_dur) {
            Some(d) => thread::sleep(d),
            None => warn!(
                "Cycle overran by {:.06} s",
                cycle_dur.as_secs_f64() - CYCLE_PERIOD_S
            ),
        }

        num_cycles += 1;
    };

    // ---- SHUTDOWN ----

    sim.stop();

    if let Some(pose) = follower.get_world_pose() {
        info!(
            "Final pose in {}: ({:.3}, {:.3}, {:.3})",
            follower.fixed_frame_id(),
            pose.position_m.x,
            pose.position_m.y,
            pose.heading_rad
        );
    }

    info!(
        "End of execution after {} cycles, result {:?}",
        num_cycles, result
    );

    if result.status.is_success() {
        Ok(())
    } else {
        Err(eyre!(
            "Goal failed with {}: {}",
            result.status,
            result.message.unwrap_or_default()
        ))
    }
}
