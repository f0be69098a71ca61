//! Commission schemes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How the commission rate is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommissionMode {
    /// Fraction of the traded notional (0.001 = 0.1%)
    #[default]
    Percent,
    /// Fixed amount per unit traded
    Fixed,
}

/// Commission and valuation scheme of an instrument.
///
/// Without margin the instrument is stock-like: buying pays the full notional.
/// With margin it is futures-like: opening posts margin per unit, closing
/// releases it and books the profit and loss.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommissionInfo {
    pub rate: Decimal,
    #[serde(default)]
    pub mode: CommissionMode,
    #[serde(default)]
    pub margin: Option<Decimal>,
    #[serde(default = "default_multiplier")]
    pub multiplier: Decimal,
}

fn default_multiplier() -> Decimal {
    Decimal::ONE
}

impl Default for CommissionInfo {
    fn default() -> Self {
        Self::free()
    }
}

impl CommissionInfo {
    /// No commission, stock-like.
    pub fn free() -> Self {
        Self {
            rate: Decimal::ZERO,
            mode: CommissionMode::Percent,
            margin: None,
            multiplier: Decimal::ONE,
        }
    }

    /// Stock-like scheme charging a fraction of notional.
    pub fn percent(rate: Decimal) -> Self {
        Self {
            rate,
            ..Self::free()
        }
    }

    /// Stock-like scheme charging a fixed amount per unit.
    pub fn fixed(rate: Decimal) -> Self {
        Self {
            rate,
            mode: CommissionMode::Fixed,
            ..Self::free()
        }
    }

    /// Futures-like scheme with margin per unit and a contract multiplier.
    pub fn futures(rate: Decimal, margin: Decimal, multiplier: Decimal) -> Self {
        Self {
            rate,
            mode: CommissionMode::Fixed,
            margin: Some(margin),
            multiplier,
        }
    }

    pub fn is_stocklike(&self) -> bool {
        self.margin.is_none()
    }

    /// Commission for trading `size` at `price`.
    pub fn commission(&self, size: Decimal, price: Decimal) -> Decimal {
        match self.mode {
            CommissionMode::Percent => size.abs() * price * self.rate,
            CommissionMode::Fixed => size.abs() * self.rate,
        }
    }

    /// Cash tied up by opening `size` at `price`.
    pub fn operation_cost(&self, size: Decimal, price: Decimal) -> Decimal {
        match self.margin {
            Some(margin) => size.abs() * margin,
            None => size.abs() * price * self.multiplier,
        }
    }

    /// Profit and loss of holding `size` from `open_price` to `close_price`.
    pub fn pnl(&self, size: Decimal, open_price: Decimal, close_price: Decimal) -> Decimal {
        size * (close_price - open_price) * self.multiplier
    }

    /// Value of a position of `size` entered at `price`, marked at `mark`.
    pub fn position_value(&self, size: Decimal, price: Decimal, mark: Decimal) -> Decimal {
        match self.margin {
            Some(margin) => size.abs() * margin + self.pnl(size, price, mark),
            None => size * mark * self.multiplier,
        }
    }

    /// Cash change of an execution: `closed` units released from a position
    /// entered at `entry`, `opened` units taken, both at `price`.
    pub fn cash_delta(
        &self,
        closed: Decimal,
        opened: Decimal,
        entry: Decimal,
        price: Decimal,
        commission: Decimal,
    ) -> Decimal {
        match self.margin {
            Some(margin) => {
                let released = closed.abs() * margin + self.pnl(-closed, entry, price);
                released - opened.abs() * margin - commission
            }
            None => -(closed + opened) * price * self.multiplier - commission,
        }
    }
}
