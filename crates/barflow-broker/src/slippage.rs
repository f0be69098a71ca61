//! Slippage model.
//!
//! Fill prices go through a fixed pipeline: raw match price, slippage, limit
//! protection, range cap.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use barflow_core::Side;

/// How slippage is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlippageKind {
    #[default]
    None,
    /// Fraction of the price (0.001 = 0.1%)
    Percent,
    /// Absolute price units
    Fixed,
}

/// Slippage settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlippageConfig {
    #[serde(default)]
    pub kind: SlippageKind,
    #[serde(default)]
    pub amount: Decimal,
    /// Also slip fills at the bar's open
    #[serde(default = "default_true")]
    pub apply_to_open: bool,
    /// Keep slipped prices inside the bar's low/high
    #[serde(default = "default_true")]
    pub cap_to_range: bool,
    /// Never slip a limit order past its limit
    #[serde(default = "default_true")]
    pub respect_limit: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SlippageConfig {
    fn default() -> Self {
        Self {
            kind: SlippageKind::None,
            amount: Decimal::ZERO,
            apply_to_open: true,
            cap_to_range: true,
            respect_limit: true,
        }
    }
}

/// Context of one fill price.
#[derive(Debug, Clone, Copy)]
pub struct PriceContext {
    pub side: Side,
    /// The raw price is the bar's open
    pub at_open: bool,
    pub limit: Option<Decimal>,
    pub low: Decimal,
    pub high: Decimal,
}

impl SlippageConfig {
    pub fn percent(amount: Decimal) -> Self {
        Self {
            kind: SlippageKind::Percent,
            amount,
            ..Self::default()
        }
    }

    pub fn fixed(amount: Decimal) -> Self {
        Self {
            kind: SlippageKind::Fixed,
            amount,
            ..Self::default()
        }
    }

    /// Adverse price move for `price`.
    fn slip(&self, price: Decimal) -> Decimal {
        match self.kind {
            SlippageKind::None => Decimal::ZERO,
            SlippageKind::Percent => price * self.amount,
            SlippageKind::Fixed => self.amount,
        }
    }

    /// Turn a raw match price into the execution price.
    pub fn fill_price(&self, raw: Decimal, ctx: &PriceContext) -> Decimal {
        if ctx.at_open && !self.apply_to_open {
            return raw;
        }
        let slip = self.slip(raw);
        if slip.is_zero() {
            return raw;
        }

        let mut price = match ctx.side {
            Side::Buy => raw + slip,
            Side::Sell => raw - slip,
        };

        if self.respect_limit {
            if let Some(limit) = ctx.limit {
                price = match ctx.side {
                    Side::Buy => price.min(limit.max(raw)),
                    Side::Sell => price.max(limit.min(raw)),
                };
            }
        }

        if self.cap_to_range {
            price = match ctx.side {
                Side::Buy => price.min(ctx.high),
                Side::Sell => price.max(ctx.low),
            };
        }
        price
    }
}
