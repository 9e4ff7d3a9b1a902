//! Simulator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for a [`Simulator`](crate::Simulator) run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Seed for the delivery-delay generator. Equal seeds give equal runs.
    pub seed: u64,
    /// A message sent at tick `t` becomes deliverable at
    /// `t + 1 + uniform[0, max_delay)`.
    pub max_delay: u64,
    /// Upper bound on ticks spent waiting for a snapshot or for the network
    /// to drain.
    pub max_ticks: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            max_delay: 5,
            max_ticks: 10_000,
        }
    }
}

impl SimulatorConfig {
    /// Default configuration with the given seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Load from JSON, filling missing fields with defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
