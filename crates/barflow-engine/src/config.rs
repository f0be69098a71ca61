//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use barflow_broker::BrokerConfig;

use crate::sizer::SizingMethod;

/// How node values are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Preload every feed, bulk-compute nodes, then walk the bars
    #[default]
    Vectorized,
    /// Pull one bar per feed per tick; required for live and replay feeds
    EventDriven,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Vectorized => write!(f, "vectorized"),
            ExecutionMode::EventDriven => write!(f, "event_driven"),
        }
    }
}

fn default_idle_backoff_ms() -> u64 {
    10
}

/// Everything a [`crate::Scheduler`] needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(default)]
    pub broker: BrokerConfig,
    /// Default order size used by `StrategyContext::sized`
    #[serde(default)]
    pub sizing: SizingMethod,
    /// Sleep between polls when no feed has data
    #[serde(default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            broker: BrokerConfig::default(),
            sizing: SizingMethod::default(),
            idle_backoff_ms: default_idle_backoff_ms(),
        }
    }
}

impl EngineConfig {
    pub fn vectorized() -> Self {
        Self::default()
    }

    pub fn event_driven() -> Self {
        Self {
            mode: ExecutionMode::EventDriven,
            ..Self::default()
        }
    }

    pub fn with_broker(mut self, broker: BrokerConfig) -> Self {
        self.broker = broker;
        self
    }

    pub fn with_sizing(mut self, sizing: SizingMethod) -> Self {
        self.sizing = sizing;
        self
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }
}
