//! Reference strategies for barflow.
//!
//! - Moving average crossover
//! - Mean reversion on Bollinger Bands
//! - Buy and hold
//!
//! Strategies are built by name through the [`StrategyRegistry`].

mod buy_hold;
mod ma_crossover;
mod mean_reversion;
mod registry;

use barflow_core::ConfigError;

pub use buy_hold::{BuyHoldConfig, BuyHoldStrategy};
pub use ma_crossover::{MACrossoverConfig, MACrossoverStrategy};
pub use mean_reversion::{MeanReversionConfig, MeanReversionStrategy};
pub use registry::{StrategyInfo, StrategyRegistry};

/// Strategy parameters that can be checked before a run.
pub trait StrategyConfig {
    fn validate(&self) -> Result<(), ConfigError>;
}
