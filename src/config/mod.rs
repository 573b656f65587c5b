//! Settings for the configuration cache.
//!
//! Loading priority (lowest to highest):
//! 1. Hardcoded defaults
//! 2. Config file (explicit path, or `CONFKEEPER_CONFIG` env var)
//! 3. Environment variables with the `CONFKEEPER` prefix (highest priority)

mod coordination;
mod retry;
mod store;
pub use coordination::*;
pub use retry::*;
pub use store::*;


use std::env;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::{Error, Result};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    /// Coordination cluster endpoint and session parameters
    #[serde(default)]
    pub coordination: CoordinationConfig,
    /// Watched configuration path and resource lifecycle knobs
    #[serde(default)]
    pub store: StoreConfig,
    /// Retry budgets for initialization and watch-triggered reloads
    #[serde(default)]
    pub retry: RetryPolicies,
}

impl Settings {
    /// Load settings with the documented priority ordering.
    ///
    /// # Arguments
    /// * `path` - Optional explicit config file; overrides `CONFKEEPER_CONFIG`
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = Config::builder();

        if let Some(path) = path {
            config = config.add_source(File::with_name(path).required(true));
        } else if let Ok(path) = env::var("CONFKEEPER_CONFIG") {
            config = config.add_source(File::with_name(&path).required(true));
        }

        config = config.add_source(
            Environment::with_prefix("CONFKEEPER")
                .prefix_separator("__")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        config.build()?.try_deserialize().map_err(Error::Config)
    }
}
