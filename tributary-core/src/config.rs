//! Run Configuration
//!
//! Settings that shape how a run is driven, not what it computes.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Environment variable for [`RunConfig::max_ticks`].
pub const ENV_MAX_TICKS: &str = "TRIBUTARY_MAX_TICKS";

/// Environment variable for [`RunConfig::yield_every`].
pub const ENV_YIELD_EVERY: &str = "TRIBUTARY_YIELD_EVERY";

/// Configuration for blocking and async runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Stop after this many ticks. Reaching the limit cancels the run.
    pub max_ticks: Option<u64>,

    /// Async runs yield to the runtime every this many ticks.
    pub yield_every: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_ticks: None,
            yield_every: 1,
        }
    }
}

impl RunConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the number of ticks.
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }

    /// Set how often async runs yield. Zero is treated as one.
    pub fn with_yield_every(mut self, ticks: u32) -> Self {
        self.yield_every = ticks.max(1);
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Reads:
    /// - `TRIBUTARY_MAX_TICKS`: tick limit
    /// - `TRIBUTARY_YIELD_EVERY`: async yield interval
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse configuration from JSON, e.g. `{"max_ticks": 100}`.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|err| EngineError::Config(err.to_string()))
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_MAX_TICKS) {
            config.max_ticks = Some(parse_var(ENV_MAX_TICKS, &raw)?);
        }
        if let Some(raw) = lookup(ENV_YIELD_EVERY) {
            config = config.with_yield_every(parse_var(ENV_YIELD_EVERY, &raw)?);
        }
        Ok(config)
    }
}

fn parse_var<N: std::str::FromStr>(key: &str, raw: &str) -> Result<N> {
    raw.trim()
        .parse()
        .map_err(|_| EngineError::Config(format!("{key}: cannot parse {raw:?}")))
}
