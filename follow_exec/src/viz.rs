//! # Visualisation outputs
//!
//! The follower reports the subpath it is about to follow and every pose it drives through to a
//! [`Visualizer`]. Rendering is done elsewhere, the [`ArchiveVisualizer`] writes both streams to
//! CSV archives in the session directory so they can be plotted after a run.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::warn;
use serde::Serialize;
use util::{
    archive::{ArchiveError, Archiver},
    session::Session,
};

use crate::{loc::PosePair, path::Subpath};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

pub trait Visualizer: Send {
    /// Called when the subpath with the given index becomes active.
    fn publish_subpath(&mut self, _index: usize, _subpath: &Subpath) {}

    /// Called with the pose of the platform on every cycle it is known.
    fn publish_driven_pose(&mut self, _time_s: f64, _pose: &PosePair) {}
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Visualizer which discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullVisualizer;

/// Writes the planned subpaths and the driven poses to the session archive.
#[derive(Default)]
pub struct ArchiveVisualizer {
    arch_planned: Archiver,
    arch_driven: Archiver,
}

#[derive(Serialize)]
struct PlannedRecord {
    subpath_index: usize,
    point_index: usize,
    x_m: f64,
    y_m: f64,
    heading_rad: f64,
    reverse: bool,
}

#[derive(Serialize)]
struct DrivenRecord {
    time_s: f64,
    world_x_m: f64,
    world_y_m: f64,
    world_heading_rad: f64,
    odom_x_m: f64,
    odom_y_m: f64,
    odom_heading_rad: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Visualizer for NullVisualizer {}

impl ArchiveVisualizer {
    /// Create the archives under `follower/` in the session's archive root.
    pub fn new(session: &Session) -> Result<Self, ArchiveError> {
        Ok(Self {
            arch_planned: Archiver::from_path(session, "follower/planned.csv")?,
            arch_driven: Archiver::from_path(session, "follower/driven.csv")?,
        })
    }
}

impl Visualizer for ArchiveVisualizer {
    fn publish_subpath(&mut self, index: usize, subpath: &Subpath) {
        for (i, wp) in subpath.waypoints.iter().enumerate() {
            let rec = PlannedRecord {
                subpath_index: index,
                point_index: i,
                x_m: wp.position_m.x,
                y_m: wp.position_m.y,
                heading_rad: wp.heading_rad,
                reverse: wp.reverse,
            };

            if let Err(e) = self.arch_planned.serialise(rec) {
                warn!("Could not archive planned subpath: {}", e);
                return;
            }
        }
    }

    fn publish_driven_pose(&mut self, time_s: f64, pose: &PosePair) {
        let rec = DrivenRecord {
            time_s,
            world_x_m: pose.world.position_m.x,
            world_y_m: pose.world.position_m.y,
            world_heading_rad: pose.world.heading_rad,
            odom_x_m: pose.odom.position_m.x,
            odom_y_m: pose.odom.position_m.y,
            odom_heading_rad: pose.odom.heading_rad,
        };

        if let Err(e) = self.arch_driven.serialise(rec) {
            warn!("Could not archive driven pose: {}", e);
        }
    }
}
