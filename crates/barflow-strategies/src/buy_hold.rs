//! Buy and hold: one entry per feed on the first ready bar.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use barflow_core::{ConfigError, EngineResult, FeedId};
use barflow_engine::{Setup, Strategy, StrategyContext};

use crate::StrategyConfig;

/// Configuration for the Buy and Hold strategy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuyHoldConfig {
    /// Units to buy; the engine's sizing method decides when unset
    pub size: Option<Decimal>,
}

impl StrategyConfig for BuyHoldConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        match self.size {
            Some(size) if size <= Decimal::ZERO => {
                Err(ConfigError::Invalid("Size must be positive".into()))
            }
            _ => Ok(()),
        }
    }
}

pub struct BuyHoldStrategy {
    config: BuyHoldConfig,
    feeds: Vec<FeedId>,
    bought: Vec<FeedId>,
}

impl BuyHoldStrategy {
    pub fn new(config: BuyHoldConfig) -> Self {
        Self {
            config,
            feeds: Vec::new(),
            bought: Vec::new(),
        }
    }
}

impl Strategy for BuyHoldStrategy {
    fn name(&self) -> &str {
        "buy_hold"
    }

    fn init(&mut self, setup: &mut Setup<'_>) -> EngineResult<()> {
        self.config.validate()?;
        self.feeds = setup.feeds().iter().map(|f| f.id).collect();
        Ok(())
    }

    fn next(&mut self, ctx: &mut StrategyContext<'_>) -> EngineResult<()> {
        for feed in self.feeds.clone() {
            if self.bought.contains(&feed) || ctx.len(feed) == 0 {
                continue;
            }
            let size = self.config.size.unwrap_or_else(|| ctx.sized(feed));
            if size.is_zero() {
                continue;
            }
            ctx.buy(feed, size);
            self.bought.push(feed);
        }
        Ok(())
    }

    fn stop(&mut self, ctx: &mut StrategyContext<'_>) {
        tracing::info!(strategy = self.name(), value = %ctx.value(), "Strategy finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use barflow_core::{Bar, Timeframe};
    use barflow_data::MemoryFeed;
    use barflow_engine::{EngineConfig, Scheduler};
    use rust_decimal_macros::dec;

    #[test]
    fn test_buys_once_and_holds() {
        let bars = (0..5)
            .map(|i| {
                let p = 10.0 + i as f64;
                Bar::new(i * 86400000, p, p + 1.0, p - 1.0, p, 100.0)
            })
            .collect();
        let mut scheduler = Scheduler::new(EngineConfig::event_driven());
        scheduler
            .add_feed(Box::new(MemoryFeed::new("m", Timeframe::days(1), bars)))
            .unwrap();
        let mut strategy = BuyHoldStrategy::new(BuyHoldConfig {
            size: Some(dec!(3)),
        });
        let report = scheduler.run(&mut strategy).unwrap();

        assert_eq!(report.orders.len(), 1);
        assert_eq!(report.positions[0].size, dec!(3));
        assert_eq!(report.positions[0].price, dec!(11));
        // bought at 11, marked at 14
        assert_eq!(report.final_value, dec!(100009));
    }

    #[test]
    fn test_rejects_non_positive_size() {
        let config = BuyHoldConfig {
            size: Some(dec!(0)),
        };
        assert!(config.validate().is_err());
    }
}
