//! Position and trade types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ids::{FeedId, TradeId};

/// Holding in a single instrument.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Signed size (positive long, negative short)
    pub size: Decimal,
    /// Average entry price, zero when flat
    pub price: Decimal,
}

/// Outcome of applying one fill to a position.
///
/// `opened` and `closed` carry the sign of the fill and always sum to it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub size: Decimal,
    pub price: Decimal,
    pub opened: Decimal,
    pub closed: Decimal,
}

impl Position {
    pub fn new(size: Decimal, price: Decimal) -> Self {
        Self { size, price }
    }

    pub fn is_long(&self) -> bool {
        self.size > Decimal::ZERO
    }

    pub fn is_short(&self) -> bool {
        self.size < Decimal::ZERO
    }

    pub fn is_flat(&self) -> bool {
        self.size.is_zero()
    }

    /// Market value at `mark`.
    pub fn value_at(&self, mark: Decimal) -> Decimal {
        self.size * mark
    }

    /// Apply a signed fill of `size` at `price`.
    ///
    /// Same direction or from flat: weighted average price. Opposite direction:
    /// the overlap closes at the old average, any excess opens at `price`.
    pub fn update(&mut self, size: Decimal, price: Decimal) -> PositionUpdate {
        let old_size = self.size;
        self.size += size;

        let (opened, closed) = if self.size.is_zero() {
            self.price = Decimal::ZERO;
            (Decimal::ZERO, size)
        } else if old_size.is_zero() {
            self.price = price;
            (size, Decimal::ZERO)
        } else if old_size.is_sign_positive() == size.is_sign_positive() {
            self.price = (self.price * old_size + price * size) / self.size;
            (size, Decimal::ZERO)
        } else if self.size.is_sign_positive() == old_size.is_sign_positive() {
            // reduced, price unchanged
            (Decimal::ZERO, size)
        } else {
            // flipped
            self.price = price;
            (self.size, -old_size)
        };

        PositionUpdate {
            size: self.size,
            price: self.price,
            opened,
            closed,
        }
    }
}

/// Lifecycle of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Created,
    Open,
    Closed,
}

/// One entry of a trade's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub status: TradeStatus,
    pub timestamp: i64,
    pub bar: usize,
    /// Size change of this event
    pub size: Decimal,
    pub price: Decimal,
    pub commission: Decimal,
    pub pnl: Decimal,
    /// Trade size after the event
    pub trade_size: Decimal,
}

/// One open-to-flat cycle of a position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub instrument: FeedId,
    pub status: TradeStatus,
    /// Current signed size
    pub size: Decimal,
    /// Weighted average entry price
    pub price: Decimal,
    /// Notional (or margin) value of the current size
    pub value: Decimal,
    pub commission: Decimal,
    pub pnl: Decimal,
    /// pnl net of commission
    pub pnlcomm: Decimal,
    /// Opened long
    pub long: bool,
    pub open_timestamp: i64,
    pub open_bar: usize,
    pub close_timestamp: Option<i64>,
    pub close_bar: Option<usize>,
    /// Bars between open and last update
    pub bar_len: usize,
    pub history: Vec<TradeEvent>,
}

impl Trade {
    pub fn new(id: TradeId, instrument: FeedId) -> Self {
        Self {
            id,
            instrument,
            status: TradeStatus::Created,
            size: Decimal::ZERO,
            price: Decimal::ZERO,
            value: Decimal::ZERO,
            commission: Decimal::ZERO,
            pnl: Decimal::ZERO,
            pnlcomm: Decimal::ZERO,
            long: true,
            open_timestamp: 0,
            open_bar: 0,
            close_timestamp: None,
            close_bar: None,
            bar_len: 0,
            history: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == TradeStatus::Open
    }

    pub fn is_closed(&self) -> bool {
        self.status == TradeStatus::Closed
    }

    /// Fold one execution into the trade.
    ///
    /// `size` is the signed part of the fill belonging to this trade and `value`
    /// the valuation of the resulting size. Returns the new status.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        size: Decimal,
        price: Decimal,
        value: Decimal,
        commission: Decimal,
        pnl: Decimal,
        timestamp: i64,
        bar: usize,
    ) -> TradeStatus {
        if size.is_zero() {
            return self.status;
        }

        let old_size = self.size;
        self.size += size;
        self.commission += commission;
        self.pnl += pnl;
        self.pnlcomm = self.pnl - self.commission;

        if old_size.is_zero() {
            self.long = size.is_sign_positive();
            self.open_timestamp = timestamp;
            self.open_bar = bar;
        }
        self.bar_len = bar.saturating_sub(self.open_bar);

        if self.size.abs() > old_size.abs() {
            self.price = (old_size * self.price + size * price) / self.size;
        }
        self.value = value;

        self.status = if self.size.is_zero() {
            self.close_timestamp = Some(timestamp);
            self.close_bar = Some(bar);
            TradeStatus::Closed
        } else {
            TradeStatus::Open
        };

        self.history.push(TradeEvent {
            status: self.status,
            timestamp,
            bar,
            size,
            price,
            commission,
            pnl,
            trade_size: self.size,
        });
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_open_and_extend() {
        let mut pos = Position::default();
        let up = pos.update(dec!(10), dec!(10));
        assert_eq!((up.opened, up.closed), (dec!(10), dec!(0)));

        let up = pos.update(dec!(10), dec!(12));
        assert_eq!(up.size, dec!(20));
        assert_eq!(up.price, dec!(11));
        assert_eq!(up.opened, dec!(10));
    }

    #[test]
    fn test_reduce_keeps_price() {
        let mut pos = Position::new(dec!(10), dec!(10));
        let up = pos.update(dec!(-4), dec!(15));
        assert_eq!(up.size, dec!(6));
        assert_eq!(up.price, dec!(10));
        assert_eq!((up.opened, up.closed), (dec!(0), dec!(-4)));
    }

    #[test]
    fn test_flip_long_to_short() {
        // long 10 @ 10, sell 15 @ 12
        let mut pos = Position::new(dec!(10), dec!(10));
        let up = pos.update(dec!(-15), dec!(12));
        assert_eq!(up.closed, dec!(-10));
        assert_eq!(up.opened, dec!(-5));
        assert_eq!(pos, Position::new(dec!(-5), dec!(12)));
    }

    #[test]
    fn test_close_to_flat() {
        let mut pos = Position::new(dec!(-3), dec!(7));
        let up = pos.update(dec!(3), dec!(5));
        assert!(pos.is_flat());
        assert_eq!(up.price, dec!(0));
        assert_eq!(up.closed, dec!(3));
    }

    #[test]
    fn test_trade_lifecycle() {
        let mut trade = Trade::new(TradeId(0), FeedId(0));
        assert_eq!(
            trade.update(dec!(10), dec!(10), dec!(100), dec!(1), dec!(0), 1_000, 2),
            TradeStatus::Open
        );
        assert!(trade.long);
        assert_eq!(trade.open_bar, 2);

        trade.update(dec!(10), dec!(12), dec!(220), dec!(1), dec!(0), 2_000, 3);
        assert_eq!(trade.price, dec!(11));

        let status = trade.update(dec!(-20), dec!(13), dec!(0), dec!(1), dec!(40), 3_000, 6);
        assert_eq!(status, TradeStatus::Closed);
        assert_eq!(trade.pnl, dec!(40));
        assert_eq!(trade.pnlcomm, dec!(37));
        assert_eq!(trade.bar_len, 4);
        assert_eq!(trade.close_timestamp, Some(3_000));
        assert_eq!(trade.history.len(), 3);
    }

    fn size_strategy() -> impl Strategy<Value = Decimal> {
        (-50i64..=50).prop_filter("non-zero", |s| *s != 0).prop_map(Decimal::from)
    }

    fn price_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=500).prop_map(Decimal::from)
    }

    proptest! {
        #[test]
        fn prop_update_then_reverse_is_flat(size in size_strategy(), p1 in price_strategy(), p2 in price_strategy()) {
            let mut pos = Position::default();
            pos.update(size, p1);
            let up = pos.update(-size, p2);
            prop_assert!(pos.is_flat());
            prop_assert_eq!(up.closed, -size);
            prop_assert_eq!(up.opened, Decimal::ZERO);
        }

        #[test]
        fn prop_opened_closed_account_for_fills(fills in prop::collection::vec((size_strategy(), price_strategy()), 1..40)) {
            let mut pos = Position::default();
            let mut opened_total = Decimal::ZERO;
            let mut closed_total = Decimal::ZERO;
            let mut size_total = Decimal::ZERO;
            for (size, price) in fills {
                let before = pos.size;
                let up = pos.update(size, price);
                prop_assert_eq!(up.opened + up.closed, size);
                // closing never exceeds what was held
                prop_assert!(up.closed.abs() <= before.abs());
                opened_total += up.opened;
                closed_total += up.closed;
                size_total += size;
            }
            prop_assert_eq!(pos.size, size_total);
            prop_assert_eq!(opened_total + closed_total, size_total);
        }
    }
}
