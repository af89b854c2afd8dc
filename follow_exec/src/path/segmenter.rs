//! # Path segmentation
//!
//! Splits a raw goal path into subpaths at its turning points. A turning point is a waypoint
//! where the heading of the path changes by more than the configured threshold, or where the
//! direction of travel (forwards/backwards) changes. The turning waypoint ends one subpath and
//! starts the next.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::debug;
use serde::Deserialize;
use util::maths::get_ang_dist;

use super::{Path, Subpath, Waypoint};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for path segmentation
#[derive(Debug, Clone, Deserialize)]
pub struct SegmenterParams {
    /// Heading change above which a waypoint is a turning point.
    pub turning_threshold_rad: f64,

    /// Consecutive waypoints closer than this are considered duplicates and collapsed into one.
    pub duplicate_tolerance_m: f64,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Split the waypoints into a path made of subpaths.
///
/// If `only_one_segment` is set no splitting is done and the (duplicate collapsed) waypoints
/// form a single subpath. An empty input produces a path with a single empty subpath, callers
/// are expected to reject empty goals before segmenting.
pub fn segment(waypoints: &[Waypoint], only_one_segment: bool, params: &SegmenterParams) -> Path {
    let points = collapse_duplicates(waypoints, params.duplicate_tolerance_m);

    if only_one_segment || points.len() < 3 {
        return Path::new(vec![Subpath::new(points)]);
    }

    let mut subpaths = Vec::new();
    let mut current = vec![points[0]];

    for i in 1..points.len() - 1 {
        current.push(points[i]);

        if is_turning_point(&points[i - 1], &points[i], &points[i + 1], params) {
            debug!("Turning point at waypoint {}", i);
            subpaths.push(Subpath::new(current));
            current = vec![points[i]];
        }
    }

    current.push(points[points.len() - 1]);
    subpaths.push(Subpath::new(current));

    Path::new(subpaths)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Remove waypoints which sit on top of their predecessor.
fn collapse_duplicates(waypoints: &[Waypoint], tolerance_m: f64) -> Vec<Waypoint> {
    let mut points: Vec<Waypoint> = Vec::with_capacity(waypoints.len());

    for wp in waypoints {
        match points.last() {
            Some(last) if (last.position_m - wp.position_m).norm() <= tolerance_m => (),
            _ => points.push(*wp),
        }
    }

    points
}

fn is_turning_point(
    prev: &Waypoint,
    curr: &Waypoint,
    next: &Waypoint,
    params: &SegmenterParams,
) -> bool {
    // Direction of travel reversal
    if curr.reverse != next.reverse {
        return true;
    }

    let a = curr.position_m - prev.position_m;
    let b = next.position_m - curr.position_m;

    let heading_change_rad = get_ang_dist(a.y.atan2(a.x), b.y.atan2(b.x));

    heading_change_rad.abs() > params.turning_threshold_rad
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn params() -> SegmenterParams {
        SegmenterParams {
            turning_threshold_rad: 1.2,
            duplicate_tolerance_m: 1e-6,
        }
    }

    fn wps(points: &[(f64, f64)]) -> Vec<Waypoint> {
        points.iter().map(|(x, y)| Waypoint::new(*x, *y, 0.0)).collect()
    }

    #[test]
    fn test_right_angle_turn() {
        let input = wps(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (2.0, 1.0), (2.0, 2.0)]);
        let path = segment(&input, false, &params());

        assert_eq!(path.num_subpaths(), 2);
        assert_eq!(path.subpaths[0].len(), 3);
        assert_eq!(path.subpaths[1].len(), 3);

        // The turning waypoint is shared at the boundary
        assert_eq!(path.subpaths[0].last(), path.subpaths[1].first());
        assert_eq!(path.flatten(), input);
    }

    #[test]
    fn test_below_threshold_not_split() {
        // A gentle curve, each heading change is about 0.46 rad
        let input = wps(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.5), (3.0, 1.5)]);
        let path = segment(&input, false, &params());
        assert_eq!(path.num_subpaths(), 1);
        assert_eq!(path.flatten(), input);
    }

    #[test]
    fn test_single_segment_mode() {
        let input = wps(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)]);

        let split = segment(&input, false, &params());
        assert_eq!(split.num_subpaths(), 4);

        let single = segment(&input, true, &params());
        assert_eq!(single.num_subpaths(), 1);
        assert_eq!(single.subpaths[0].waypoints, input);
    }

    #[test]
    fn test_reversal_splits() {
        // Straight line, but driven backwards from the third waypoint on
        let mut input = wps(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)]);
        input[2].reverse = true;
        input[3].reverse = true;

        let path = segment(&input, false, &params());
        assert_eq!(path.num_subpaths(), 2);
        assert_eq!(path.subpaths[0].len(), 2);
        assert_eq!(path.subpaths[1].len(), 3);
        assert_eq!(path.flatten(), input);
    }

    #[test]
    fn test_u_turn_splits() {
        let input = wps(&[(0.0, 0.0), (1.0, 0.0), (0.0, 0.0)]);
        let path = segment(&input, false, &params());
        assert_eq!(path.num_subpaths(), 2);
    }

    #[test]
    fn test_duplicates_collapsed() {
        let input = wps(&[(0.0, 0.0), (0.0, 0.0), (1.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
        let path = segment(&input, false, &params());

        let expected = wps(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
        assert_eq!(path.flatten(), expected);
        // The right angle turn at (1, 0) is still detected
        assert!(FRAC_PI_2 > params().turning_threshold_rad);
        assert_eq!(path.num_subpaths(), 2);
    }

    #[test]
    fn test_short_paths() {
        let one = wps(&[(3.0, 4.0)]);
        let path = segment(&one, false, &params());
        assert_eq!(path.num_subpaths(), 1);
        assert_eq!(path.subpaths[0].waypoints, one);

        let two = wps(&[(0.0, 0.0), (1.0, 0.0)]);
        let path = segment(&two, false, &params());
        assert_eq!(path.num_subpaths(), 1);
        assert_eq!(path.flatten(), two);
    }

    #[test]
    fn test_flatten_reproduces_input() {
        // A zig-zag with a mix of sharp and gentle turns
        let input = wps(&[
            (0.0, 0.0),
            (1.0, 0.0),
            (2.0, 0.2),
            (2.5, 1.5),
            (1.0, 1.6),
            (0.5, 3.0),
            (0.6, 4.0),
            (2.0, 4.0),
        ]);

        for threshold in &[0.1, 0.5, 1.0, 1.5, 3.0] {
            let p = SegmenterParams {
                turning_threshold_rad: *threshold,
                ..params()
            };
            let path = segment(&input, false, &p);
            assert_eq!(path.flatten(), input);
            assert!(path.subpaths.iter().all(|s| !s.is_empty()));
        }
    }
}
