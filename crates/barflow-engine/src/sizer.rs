//! Default order sizing.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Sizing method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "method")]
pub enum SizingMethod {
    /// Fixed number of units
    Fixed { size: Decimal },
    /// Fixed cash amount
    FixedCash { amount: Decimal },
    /// Percentage of account value
    PercentValue { percent: Decimal },
    /// Everything the cash buys
    AllIn,
}

impl Default for SizingMethod {
    fn default() -> Self {
        SizingMethod::Fixed { size: dec!(1) }
    }
}

impl SizingMethod {
    /// Whole units to trade at `price` given the account state.
    pub fn size(&self, cash: Decimal, value: Decimal, price: Decimal) -> Decimal {
        if price <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let size = match self {
            SizingMethod::Fixed { size } => return (*size).max(Decimal::ZERO),
            SizingMethod::FixedCash { amount } => *amount / price,
            SizingMethod::PercentValue { percent } => value * (*percent / dec!(100)) / price,
            SizingMethod::AllIn => cash / price,
        };
        size.trunc().max(Decimal::ZERO)
    }
}
