//! Market simulator settings.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use barflow_core::{FeedId, Validity};

use crate::commission::CommissionInfo;
use crate::slippage::SlippageConfig;

/// Reference price of market orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketFill {
    /// Open of the first bar after the order was created
    #[default]
    NextOpen,
    /// Close of the bar the order was created on
    SameClose,
}

/// How much of an order one bar can fill.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum FillPolicy {
    /// Everything at once
    #[default]
    Full,
    /// At most this fraction of the bar's volume, and at least one unit on
    /// a bar with any volume
    VolumeFraction(Decimal),
    /// At most this many units per bar
    MaxSize(Decimal),
}

impl FillPolicy {
    /// Fillable size for `remaining` on a bar trading `volume`.
    pub fn fillable(&self, remaining: Decimal, volume: Decimal) -> Decimal {
        match self {
            FillPolicy::Full => remaining,
            FillPolicy::VolumeFraction(fraction) => {
                let cap = (volume * fraction).trunc();
                if volume > Decimal::ZERO && cap < Decimal::ONE {
                    remaining.min(Decimal::ONE)
                } else {
                    remaining.min(cap)
                }
            }
            FillPolicy::MaxSize(max) => remaining.min(*max),
        }
        .max(Decimal::ZERO)
    }
}

/// Market simulator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerConfig {
    pub initial_cash: Decimal,
    #[serde(default)]
    pub market_fill: MarketFill,
    #[serde(default)]
    pub fill_policy: FillPolicy,
    /// Validity of orders that do not set one
    #[serde(default)]
    pub default_validity: Validity,
    /// Scheme for instruments without an override
    #[serde(default)]
    pub commission: CommissionInfo,
    /// Per-instrument overrides
    #[serde(default)]
    pub instrument_commission: BTreeMap<FeedId, CommissionInfo>,
    #[serde(default)]
    pub slippage: SlippageConfig,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            initial_cash: dec!(100000),
            market_fill: MarketFill::default(),
            fill_policy: FillPolicy::default(),
            default_validity: Validity::default(),
            commission: CommissionInfo::default(),
            instrument_commission: BTreeMap::new(),
            slippage: SlippageConfig::default(),
        }
    }
}

impl BrokerConfig {
    pub fn with_cash(mut self, cash: Decimal) -> Self {
        self.initial_cash = cash;
        self
    }

    pub fn with_commission(mut self, commission: CommissionInfo) -> Self {
        self.commission = commission;
        self
    }

    pub fn with_instrument_commission(mut self, instrument: FeedId, info: CommissionInfo) -> Self {
        self.instrument_commission.insert(instrument, info);
        self
    }

    pub fn with_slippage(mut self, slippage: SlippageConfig) -> Self {
        self.slippage = slippage;
        self
    }

    pub fn with_market_fill(mut self, market_fill: MarketFill) -> Self {
        self.market_fill = market_fill;
        self
    }

    pub fn with_fill_policy(mut self, fill_policy: FillPolicy) -> Self {
        self.fill_policy = fill_policy;
        self
    }

    pub fn with_default_validity(mut self, validity: Validity) -> Self {
        self.default_validity = validity;
        self
    }

    /// Commission scheme of `instrument`.
    pub fn commission_for(&self, instrument: FeedId) -> &CommissionInfo {
        self.instrument_commission
            .get(&instrument)
            .unwrap_or(&self.commission)
    }
}
