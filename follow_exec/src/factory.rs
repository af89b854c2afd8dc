//! # Strategy factories
//!
//! Motion controllers and obstacle avoiders are selected by name from the configuration. Each
//! factory maps a name to a builder closure which receives the strategy's own parameter table.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::collections::HashMap;

use log::debug;
use serde::de::DeserializeOwned;

use crate::{
    avoid::{ObstacleAvoider, PassThrough},
    ctrl::MotionController,
};

// ------------------------------------------------------------------------------------------------
// TYPES
// ------------------------------------------------------------------------------------------------

/// Builds a strategy from its parameter table.
pub type Builder<T> = Box<dyn Fn(&toml::Value) -> Result<Box<T>, FactoryError> + Send + Sync>;

pub type ControllerFactory = Factory<dyn MotionController>;

pub type AvoiderFactory = Factory<dyn ObstacleAvoider>;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Registry of named strategy builders.
pub struct Factory<T: ?Sized> {
    /// What the factory builds, used in error messages
    kind: &'static str,

    builders: HashMap<String, Builder<T>>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    #[error("No {kind} named \"{name}\" is registered (known: {known:?})")]
    UnknownStrategy {
        kind: &'static str,
        name: String,
        known: Vec<String>,
    },

    #[error("Invalid parameters for \"{name}\": {reason}")]
    InvalidParams { name: String, reason: String },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<T: ?Sized> Factory<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            builders: HashMap::new(),
        }
    }

    /// Register a builder under the given name, replacing any previous one.
    pub fn register<F>(&mut self, name: &str, builder: F)
    where
        F: Fn(&toml::Value) -> Result<Box<T>, FactoryError> + Send + Sync + 'static,
    {
        debug!("Registering {} \"{}\"", self.kind, name);
        self.builders.insert(name.to_string(), Box::new(builder));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.builders.contains_key(name)
    }

    /// Sorted names of all registered strategies.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.builders.keys().cloned().collect();
        names.sort();
        names
    }

    /// Build the strategy registered under `name`.
    pub fn build(&self, name: &str, params: &toml::Value) -> Result<Box<T>, FactoryError> {
        match self.builders.get(name) {
            Some(b) => b(params),
            None => Err(FactoryError::UnknownStrategy {
                kind: self.kind,
                name: name.to_string(),
                known: self.names(),
            }),
        }
    }
}

impl ControllerFactory {
    /// An empty controller factory. Control laws have to be registered by the user.
    pub fn controllers() -> Self {
        Self::new("motion controller")
    }
}

impl AvoiderFactory {
    /// An avoider factory holding the pass-through avoider under `"none"`.
    pub fn avoiders() -> Self {
        let mut f = Self::new("obstacle avoider");
        f.register("none", |_| Ok(Box::new(PassThrough)));
        f
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Deserialise a strategy's parameter table, for use inside builders.
pub fn parse_params<P: DeserializeOwned>(name: &str, params: &toml::Value) -> Result<P, FactoryError> {
    params
        .clone()
        .try_into()
        .map_err(|e: toml::de::Error| FactoryError::InvalidParams {
            name: name.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ctrl::{ControlInput, ControlStep};
    use comms_if::follow::VelocityCmd;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct ConstParams {
        speed_ms: f64,
    }

    struct Const(f64);

    impl MotionController for Const {
        fn name(&self) -> &str {
            "const"
        }

        fn step(&mut self, _input: &ControlInput) -> ControlStep {
            ControlStep::Command(VelocityCmd::new(self.0, 0.0))
        }
    }

    fn factory() -> ControllerFactory {
        let mut f = ControllerFactory::controllers();
        f.register("const", |v| {
            let p: ConstParams = parse_params("const", v)?;
            Ok(Box::new(Const(p.speed_ms)))
        });
        f
    }

    #[test]
    fn test_build_known() {
        let f = factory();
        let params: toml::Value = toml::from_str("speed_ms = 0.3").unwrap();

        let c = f.build("const", &params).unwrap();
        assert_eq!(c.name(), "const");
        assert_eq!(f.names(), vec![String::from("const")]);
    }

    #[test]
    fn test_build_errors() {
        let f = factory();
        let empty = toml::Value::Table(Default::default());

        assert!(matches!(
            f.build("pid", &empty),
            Err(FactoryError::UnknownStrategy { .. })
        ));
        assert!(matches!(
            f.build("const", &empty),
            Err(FactoryError::InvalidParams { .. })
        ));
    }

    #[test]
    fn test_default_avoider() {
        let f = AvoiderFactory::avoiders();
        assert!(f.contains("none"));
        let a = f.build("none", &toml::Value::Table(Default::default())).unwrap();
        assert_eq!(a.name(), "none");
    }
}
