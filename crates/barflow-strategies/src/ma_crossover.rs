//! Moving Average Crossover Strategy.
//!
//! Goes long when the fast MA crosses above the slow MA and exits (or
//! reverses, when shorting is allowed) when it crosses below.

use serde::{Deserialize, Serialize};

use barflow_core::{ConfigError, EngineResult, FeedId, LineId, Trade};
use barflow_engine::{Setup, Strategy, StrategyContext};
use barflow_indicators::{CrossOver, Ema, Sma, SingleLine};

use crate::StrategyConfig;

/// Configuration for the MA Crossover strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MACrossoverConfig {
    /// Fast moving average period
    pub fast_period: usize,
    /// Slow moving average period
    pub slow_period: usize,
    /// Use EMA instead of SMA
    pub use_ema: bool,
    /// Reverse into a short on bearish crossovers
    pub allow_short: bool,
}

impl Default for MACrossoverConfig {
    fn default() -> Self {
        Self {
            fast_period: 10,
            slow_period: 30,
            use_ema: false,
            allow_short: false,
        }
    }
}

impl StrategyConfig for MACrossoverConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.fast_period == 0 {
            return Err(ConfigError::Invalid(
                "Fast period must be greater than 0".into(),
            ));
        }
        if self.fast_period >= self.slow_period {
            return Err(ConfigError::Invalid(
                "Fast period must be less than slow period".into(),
            ));
        }
        Ok(())
    }
}

/// Lines traded for one feed.
#[derive(Debug, Clone, Copy)]
struct Leg {
    feed: FeedId,
    fast: LineId,
    slow: LineId,
    cross: LineId,
}

/// Moving Average Crossover Strategy, run on every feed.
pub struct MACrossoverStrategy {
    config: MACrossoverConfig,
    legs: Vec<Leg>,
    signals_generated: usize,
    trades_closed: usize,
}

impl MACrossoverStrategy {
    pub fn new(config: MACrossoverConfig) -> Self {
        Self {
            config,
            legs: Vec::new(),
            signals_generated: 0,
            trades_closed: 0,
        }
    }

    pub fn signals_generated(&self) -> usize {
        self.signals_generated
    }

    fn attach_ma(&self, setup: &mut Setup<'_>, input: LineId, period: usize) -> EngineResult<SingleLine> {
        if self.config.use_ema {
            Ema::attach(setup, input, period)
        } else {
            Sma::attach(setup, input, period)
        }
    }
}

impl Strategy for MACrossoverStrategy {
    fn name(&self) -> &str {
        "ma_crossover"
    }

    fn init(&mut self, setup: &mut Setup<'_>) -> EngineResult<()> {
        self.config.validate()?;
        let closes: Vec<(FeedId, LineId)> = setup
            .feeds()
            .iter()
            .map(|f| (f.id, f.lines.close))
            .collect();

        for (feed, close) in closes {
            let fast = self.attach_ma(setup, close, self.config.fast_period)?;
            let slow = self.attach_ma(setup, close, self.config.slow_period)?;
            let cross = CrossOver::attach(setup, fast.line, slow.line)?;
            self.legs.push(Leg {
                feed,
                fast: fast.line,
                slow: slow.line,
                cross: cross.line,
            });
        }
        Ok(())
    }

    fn next(&mut self, ctx: &mut StrategyContext<'_>) -> EngineResult<()> {
        for leg in self.legs.clone() {
            let pending = ctx.open_orders().iter().any(|o| o.instrument == leg.feed);
            if pending {
                continue;
            }
            let signal = ctx.read(leg.cross, 0)?;
            if signal == 0.0 {
                continue;
            }

            self.signals_generated += 1;
            let (fast, slow) = (ctx.read(leg.fast, 0)?, ctx.read(leg.slow, 0)?);
            tracing::debug!(feed = %leg.feed, fast, slow, bullish = signal > 0.0, "Crossover");

            let position = ctx.position(leg.feed);
            let size = ctx.sized(leg.feed);
            if signal > 0.0 {
                if position.is_short() {
                    ctx.order_target_size(leg.feed, size);
                } else if position.is_flat() {
                    ctx.buy(leg.feed, size);
                }
            } else if position.is_long() {
                if self.config.allow_short {
                    ctx.order_target_size(leg.feed, -size);
                } else {
                    ctx.close_position(leg.feed);
                }
            } else if position.is_flat() && self.config.allow_short {
                ctx.sell(leg.feed, size);
            }
        }
        Ok(())
    }

    fn notify_trade(&mut self, trade: &Trade) {
        if trade.is_closed() {
            self.trades_closed += 1;
            tracing::debug!(trade = %trade.id, pnl = %trade.pnlcomm, "Trade closed");
        }
    }

    fn stop(&mut self, ctx: &mut StrategyContext<'_>) {
        tracing::info!(
            strategy = self.name(),
            signals = self.signals_generated,
            trades = self.trades_closed,
            value = %ctx.value(),
            "Strategy finished"
        );
    }
}
