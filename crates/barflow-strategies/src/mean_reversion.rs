//! Mean Reversion Strategy using Bollinger Bands.
//!
//! Enters long when the close falls to the lower band and short (optionally)
//! at the upper band. Every entry is a bracket: the take-profit sits at the
//! middle band, the stop-loss a fraction of the band width beyond the close.

use serde::{Deserialize, Serialize};

use barflow_core::{to_decimal, ConfigError, EngineResult, FeedId, Order, OrderRequest, Side};
use barflow_engine::{Setup, Strategy, StrategyContext};
use barflow_indicators::{BollingerBands, BollingerLines};

use crate::StrategyConfig;

/// Configuration for the Mean Reversion strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeanReversionConfig {
    /// Bollinger Bands period
    pub bb_period: usize,
    /// Bollinger Bands standard deviation multiplier
    pub bb_std_dev: f64,
    /// Entry threshold (%B value for entry, e.g., 0.05 = below 5%)
    pub entry_threshold: f64,
    /// Stop distance from the close, as a fraction of the band width
    pub stop_width: f64,
    /// Also fade the upper band
    pub allow_short: bool,
}

impl Default for MeanReversionConfig {
    fn default() -> Self {
        Self {
            bb_period: 20,
            bb_std_dev: 2.0,
            entry_threshold: 0.05,
            stop_width: 0.5,
            allow_short: false,
        }
    }
}

impl StrategyConfig for MeanReversionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.bb_period < 2 {
            return Err(ConfigError::Invalid("BB period must be at least 2".into()));
        }
        if self.bb_std_dev <= 0.0 {
            return Err(ConfigError::Invalid("BB std dev must be positive".into()));
        }
        if !(0.0..=0.5).contains(&self.entry_threshold) {
            return Err(ConfigError::Invalid(
                "Entry threshold must be between 0 and 0.5".into(),
            ));
        }
        if self.stop_width <= 0.0 {
            return Err(ConfigError::Invalid("Stop width must be positive".into()));
        }
        Ok(())
    }
}

/// Mean Reversion Strategy, run on every feed.
pub struct MeanReversionStrategy {
    config: MeanReversionConfig,
    bands: Vec<(FeedId, BollingerLines)>,
    entries: usize,
    stopped_out: usize,
}

impl MeanReversionStrategy {
    pub fn new(config: MeanReversionConfig) -> Self {
        Self {
            config,
            bands: Vec::new(),
            entries: 0,
            stopped_out: 0,
        }
    }

    pub fn entries(&self) -> usize {
        self.entries
    }
}

impl Strategy for MeanReversionStrategy {
    fn name(&self) -> &str {
        "mean_reversion"
    }

    fn init(&mut self, setup: &mut Setup<'_>) -> EngineResult<()> {
        self.config.validate()?;
        let closes: Vec<(FeedId, _)> = setup
            .feeds()
            .iter()
            .map(|f| (f.id, f.lines.close))
            .collect();
        for (feed, close) in closes {
            let bands =
                BollingerBands::attach(setup, close, self.config.bb_period, self.config.bb_std_dev)?;
            self.bands.push((feed, bands));
        }
        Ok(())
    }

    fn next(&mut self, ctx: &mut StrategyContext<'_>) -> EngineResult<()> {
        for (feed, bands) in self.bands.clone() {
            if !ctx.position(feed).is_flat()
                || ctx.open_orders().iter().any(|o| o.instrument == feed)
            {
                continue;
            }

            let close = ctx.price(feed)?;
            let (top, mid, bot) = (
                ctx.read(bands.top, 0)?,
                ctx.read(bands.mid, 0)?,
                ctx.read(bands.bot, 0)?,
            );
            let width = top - bot;
            if width.is_nan() || width <= 0.0 {
                continue;
            }
            let percent_b = (close - bot) / width;
            let stop_distance = width * self.config.stop_width;

            let side = if percent_b <= self.config.entry_threshold {
                Side::Buy
            } else if self.config.allow_short && percent_b >= 1.0 - self.config.entry_threshold {
                Side::Sell
            } else {
                continue;
            };
            let stop = match side {
                Side::Buy => close - stop_distance,
                Side::Sell => close + stop_distance,
            };

            let size = ctx.sized(feed);
            if size.is_zero() {
                continue;
            }
            tracing::debug!(feed = %feed, percent_b, stop, target = mid, %side, "Band touch");
            ctx.bracket(
                OrderRequest::market(feed, side, size),
                to_decimal(stop),
                to_decimal(mid),
            );
            self.entries += 1;
        }
        Ok(())
    }

    fn notify_order(&mut self, order: &Order) {
        if order.parent.is_some() && order.is_completed() && order.stop_price.is_some() {
            self.stopped_out += 1;
        }
    }

    fn stop(&mut self, ctx: &mut StrategyContext<'_>) {
        tracing::info!(
            strategy = self.name(),
            entries = self.entries,
            stopped_out = self.stopped_out,
            value = %ctx.value(),
            "Strategy finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use barflow_core::{Bar, OrderStatus, Timeframe};
    use barflow_data::MemoryFeed;
    use barflow_engine::{EngineConfig, Scheduler};
    use rust_decimal_macros::dec;

    fn prices() -> Vec<f64> {
        (0..30)
            .map(|i| match i {
                20 => 94.0,
                21 => 96.0,
                22 => 100.0,
                _ if i % 2 == 0 => 101.0,
                _ => 99.0,
            })
            .collect()
    }

    fn create_feed(prices: &[f64]) -> Box<MemoryFeed> {
        let bars = prices
            .iter()
            .enumerate()
            .map(|(i, &price)| {
                Bar::new(i as i64 * 86400000, price, price + 1.0, price - 1.0, price, 1000.0)
            })
            .collect();
        Box::new(MemoryFeed::new("TEST", Timeframe::days(1), bars))
    }

    #[test]
    fn test_config_validation() {
        let mut config = MeanReversionConfig::default();
        assert!(config.validate().is_ok());
        config.entry_threshold = 0.7;
        assert!(config.validate().is_err());
        config.entry_threshold = 0.05;
        config.bb_period = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_dip_is_bought_and_taken_at_mid() {
        let config = MeanReversionConfig {
            bb_period: 10,
            ..Default::default()
        };
        for engine in [EngineConfig::vectorized(), EngineConfig::event_driven()] {
            let mut strategy = MeanReversionStrategy::new(config.clone());
            let mut scheduler = Scheduler::new(engine);
            scheduler.add_feed(create_feed(&prices())).unwrap();
            let report = scheduler.run(&mut strategy).unwrap();

            assert_eq!(strategy.entries(), 1);
            assert_eq!(report.orders.len(), 3);
            assert_eq!(report.orders_with_status(OrderStatus::Completed), 2);
            assert_eq!(report.orders_with_status(OrderStatus::Canceled), 1);

            let trade = report.closed_trades().next().unwrap();
            assert_eq!(trade.pnl, dec!(4));
            assert!(report.positions.iter().all(|p| p.size.is_zero()));
        }
    }
}
