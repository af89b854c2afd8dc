//! Path follower parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use crate::{
    course::CourseParams, loc::FrameParams, path::SegmenterParams,
    supervisor::SupervisorParams,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct FollowerParams {
    pub segmenter: SegmenterParams,

    pub course: CourseParams,

    #[serde(default)]
    pub frames: FrameParams,

    pub strategy: StrategyParams,

    /// Supervisors in evaluation order
    #[serde(default)]
    pub supervisors: Vec<SupervisorParams>,

    /// Minimum time between two obstacle warnings in the log
    #[serde(default = "default_obstacle_warn_period_s")]
    pub obstacle_warn_period_s: f64,
}

/// Selection of the motion controller and obstacle avoider.
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyParams {
    /// Name of the default motion controller, a goal may select another one
    pub controller: String,

    #[serde(default = "default_avoider")]
    pub avoider: String,

    /// If true a veto from the avoider aborts the goal with `Obstacle`, otherwise it only stops
    /// the platform for that cycle
    #[serde(default = "default_abort_on_veto")]
    pub abort_on_veto: bool,

    /// Parameter tables of the motion controllers, keyed by controller name
    #[serde(default = "empty_table")]
    pub controller_params: toml::Value,

    /// Parameter tables of the obstacle avoiders, keyed by avoider name
    #[serde(default = "empty_table")]
    pub avoider_params: toml::Value,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl StrategyParams {
    /// The parameter table of the named controller, empty if there is none.
    pub fn controller_table(&self, name: &str) -> toml::Value {
        self.controller_params
            .get(name)
            .cloned()
            .unwrap_or_else(empty_table)
    }

    /// The parameter table of the named avoider, empty if there is none.
    pub fn avoider_table(&self, name: &str) -> toml::Value {
        self.avoider_params
            .get(name)
            .cloned()
            .unwrap_or_else(empty_table)
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn default_obstacle_warn_period_s() -> f64 {
    1.0
}

fn default_avoider() -> String {
    String::from("none")
}

fn default_abort_on_veto() -> bool {
    true
}

fn empty_table() -> toml::Value {
    toml::Value::Table(toml::value::Table::new())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let p: FollowerParams = toml::from_str(
            r#"
            [segmenter]
            turning_threshold_rad = 0.5
            duplicate_tolerance_m = 0.001

            [course]
            history_len = 10
            min_sample_dist_m = 0.01

            [strategy]
            controller = "carrot"

            [strategy.controller_params.carrot]
            lookahead_m = 0.4
            "#,
        )
        .unwrap();

        assert_eq!(p.strategy.avoider, "none");
        assert!(p.strategy.abort_on_veto);
        assert!(p.supervisors.is_empty());
        assert_eq!(p.frames.world_frame_id, "map");
        assert!((p.obstacle_warn_period_s - 1.0).abs() < 1e-12);

        let carrot = p.strategy.controller_table("carrot");
        assert_eq!(carrot.get("lookahead_m").and_then(|v| v.as_float()), Some(0.4));
        assert_eq!(p.strategy.avoider_table("none"), empty_table());
    }
}
