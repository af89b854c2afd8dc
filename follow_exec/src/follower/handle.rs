//! # Follower handle
//!
//! Observations and stop requests arrive from other threads. They are written into a shared
//! snapshot which the control thread copies once at the start of each cycle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use comms_if::{follow::StatusCode, obstacle::ObstacleCloud, odom::OdomObs};
use log::debug;
use nalgebra::Isometry2;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Cloneable access to a running follower from other threads.
#[derive(Clone)]
pub struct FollowerHandle {
    shared: Arc<Shared>,
}

/// Data written by the handles and read by the control thread.
#[derive(Default)]
pub(crate) struct Shared {
    odom: Mutex<Option<OdomObs>>,

    /// The cloud is swapped as a whole so readers never see a partial update
    obstacles: Mutex<Option<Arc<ObstacleCloud>>>,

    /// New world to odometry transform, taken by the next cycle
    world_from_odom: Mutex<Option<Isometry2<f64>>>,

    request: Mutex<Option<StopRequest>>,
}

/// Copy of the shared data taken at the start of a cycle.
#[derive(Debug, Clone, Default)]
pub(crate) struct Snapshot {
    pub odom: Option<OdomObs>,
    pub obstacles: Option<Arc<ObstacleCloud>>,
    pub world_from_odom: Option<Isometry2<f64>>,
    pub request: Option<StopRequest>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A stop requested from outside the control thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum StopRequest {
    Stop(StatusCode),
    Emergency,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FollowerHandle {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Replace the latest odometry observation.
    pub fn set_odom(&self, odom: OdomObs) {
        *lock(&self.shared.odom) = Some(odom);
    }

    /// Replace the latest obstacle observation.
    pub fn set_obstacles(&self, cloud: ObstacleCloud) {
        *lock(&self.shared.obstacles) = Some(Arc::new(cloud));
    }

    /// Set the pose of the odometry frame in the world frame, as estimated by localisation.
    pub fn set_world_from_odom(&self, world_from_odom: Isometry2<f64>) {
        *lock(&self.shared.world_from_odom) = Some(world_from_odom);
    }

    /// Request that the current goal ends with the given code on the next cycles.
    ///
    /// If a stop is already requested the first one is kept.
    pub fn stop(&self, code: StatusCode) {
        let mut req = lock(&self.shared.request);
        match *req {
            Some(existing) => debug!(
                "Stop({:?}) request ignored, {:?} already requested",
                code, existing
            ),
            None => *req = Some(StopRequest::Stop(code)),
        }
    }

    /// Request an immediate stop on the next cycle, overriding any other request.
    pub fn emergency_stop(&self) {
        *lock(&self.shared.request) = Some(StopRequest::Emergency);
    }
}

impl Shared {
    /// Copy the observations and take the pending request and transform.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            odom: lock(&self.odom).clone(),
            obstacles: lock(&self.obstacles).clone(),
            world_from_odom: lock(&self.world_from_odom).take(),
            request: lock(&self.request).take(),
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Lock the mutex, recovering the data if a writer panicked. All shared values are replaced
/// whole so a poisoned value is still consistent.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::odom::Pose2D;

    #[test]
    fn test_snapshot() {
        let shared = Arc::new(Shared::default());
        let handle = FollowerHandle::new(shared.clone());

        let snap = shared.snapshot();
        assert!(snap.odom.is_none());
        assert!(snap.obstacles.is_none());

        handle.set_odom(OdomObs::from_pose(1.0, Pose2D::new(1.0, 2.0, 0.0)));
        handle.set_obstacles(ObstacleCloud::new(1.0, vec![[1.0, 0.0]]));
        handle.set_world_from_odom(Isometry2::identity());

        let snap = shared.snapshot();
        assert_eq!(snap.odom.unwrap().pose, Pose2D::new(1.0, 2.0, 0.0));
        assert_eq!(snap.obstacles.unwrap().points_m.len(), 1);
        assert!(snap.world_from_odom.is_some());

        // Observations persist, the transform is consumed
        let snap = shared.snapshot();
        assert!(snap.odom.is_some());
        assert!(snap.world_from_odom.is_none());
    }

    #[test]
    fn test_requests() {
        let shared = Arc::new(Shared::default());
        let handle = FollowerHandle::new(shared.clone());

        handle.stop(StatusCode::Aborted);
        handle.stop(StatusCode::Timeout);
        assert_eq!(
            shared.snapshot().request,
            Some(StopRequest::Stop(StatusCode::Aborted))
        );
        assert_eq!(shared.snapshot().request, None);

        // An emergency overrides a plain stop, and a plain stop does not replace it
        let other = handle.clone();
        handle.stop(StatusCode::Aborted);
        other.emergency_stop();
        handle.stop(StatusCode::Timeout);
        assert_eq!(shared.snapshot().request, Some(StopRequest::Emergency));
    }
}
