//! Aggregator configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Aggregator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Minimum time between the first sighting of a behavior and the
    /// re-observation that persists it (seconds)
    pub cooldown_seconds: u64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self { cooldown_seconds: 10 }
    }
}

impl AggregatorConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }
}
