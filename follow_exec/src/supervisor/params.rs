//! Supervisor parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use super::{
    GoalReached, ObstacleProximity, PathDeviation, PoseAvailable, Supervisor, WaypointTimeout,
};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// One entry of the `[[supervisors]]` list, selected by its `kind` key.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SupervisorParams {
    PoseAvailable {
        #[serde(default)]
        max_wait_s: Option<f64>,
    },

    PathDeviation {
        max_distance_m: f64,

        #[serde(default)]
        warn_distance_m: Option<f64>,
    },

    ObstacleProximity {
        min_distance_m: f64,

        #[serde(default)]
        warn_distance_m: Option<f64>,
    },

    GoalReached {
        tolerance_m: f64,
    },

    WaypointTimeout {
        timeout_s: f64,
        min_progress_m: f64,
    },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SupervisorParams {
    pub fn build(&self) -> Box<dyn Supervisor> {
        match *self {
            SupervisorParams::PoseAvailable { max_wait_s } => {
                Box::new(PoseAvailable::new(max_wait_s))
            }
            SupervisorParams::PathDeviation {
                max_distance_m,
                warn_distance_m,
            } => Box::new(PathDeviation::new(max_distance_m, warn_distance_m)),
            SupervisorParams::ObstacleProximity {
                min_distance_m,
                warn_distance_m,
            } => Box::new(ObstacleProximity::new(min_distance_m, warn_distance_m)),
            SupervisorParams::GoalReached { tolerance_m } => Box::new(GoalReached::new(tolerance_m)),
            SupervisorParams::WaypointTimeout {
                timeout_s,
                min_progress_m,
            } => Box::new(WaypointTimeout::new(timeout_s, min_progress_m)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::supervisor::SupervisorChain;

    #[derive(Deserialize)]
    struct Wrapper {
        supervisors: Vec<SupervisorParams>,
    }

    #[test]
    fn test_chain_from_toml() {
        let w: Wrapper = toml::from_str(
            r#"
            [[supervisors]]
            kind = "pose_available"

            [[supervisors]]
            kind = "path_deviation"
            max_distance_m = 1.0
            warn_distance_m = 0.5

            [[supervisors]]
            kind = "goal_reached"
            tolerance_m = 0.1
            "#,
        )
        .unwrap();

        assert_eq!(
            w.supervisors[0],
            SupervisorParams::PoseAvailable { max_wait_s: None }
        );

        let chain = SupervisorChain::from_params(&w.supervisors);
        assert_eq!(
            chain.names(),
            vec!["pose_available", "path_deviation", "goal_reached"]
        );
    }

    #[test]
    fn test_unknown_kind() {
        let res: Result<Wrapper, _> = toml::from_str(
            r#"
            [[supervisors]]
            kind = "battery_level"
            "#,
        );
        assert!(res.is_err());
    }
}
