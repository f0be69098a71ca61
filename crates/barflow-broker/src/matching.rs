//! Per-bar trigger checks.
//!
//! Decides whether an order matches a bar and at which raw price, before
//! slippage. Gaps through a trigger fill at the open.

use rust_decimal::Decimal;

use barflow_core::{to_decimal, Bar, Order, OrderType, Side};

use crate::config::MarketFill;

/// Bar prices in broker precision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarPrices {
    pub timestamp: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl From<&Bar> for BarPrices {
    fn from(bar: &Bar) -> Self {
        Self {
            timestamp: bar.timestamp,
            open: to_decimal(bar.open),
            high: to_decimal(bar.high),
            low: to_decimal(bar.low),
            close: to_decimal(bar.close),
            volume: to_decimal(bar.volume),
        }
    }
}

/// Raw match of an order on a bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchResult {
    NoMatch,
    Fill {
        price: Decimal,
        /// The price is the bar's open
        at_open: bool,
    },
}

impl MatchResult {
    fn at_open(price: Decimal) -> Self {
        MatchResult::Fill {
            price,
            at_open: true,
        }
    }

    fn at(price: Decimal) -> Self {
        MatchResult::Fill {
            price,
            at_open: false,
        }
    }
}

/// Whether `order` may be matched on instrument bar `bar_no`.
///
/// Orders never fill on the bar they were created on, except market orders
/// when the close of that bar is the reference.
pub fn is_eligible(order: &Order, bar_no: usize, market_fill: MarketFill) -> bool {
    match (order.order_type, market_fill) {
        (OrderType::Market, MarketFill::SameClose) => bar_no >= order.created_bar,
        _ => bar_no > order.created_bar,
    }
}

/// Check `order` against `bar`. Mutates trigger state of stop-limit and
/// trailing orders.
pub fn match_order(order: &mut Order, bar: &BarPrices, market_fill: MarketFill) -> MatchResult {
    match order.order_type {
        OrderType::Market => match market_fill {
            MarketFill::NextOpen => MatchResult::at_open(bar.open),
            MarketFill::SameClose => MatchResult::at(bar.close),
        },
        OrderType::Close => MatchResult::at(bar.close),
        OrderType::Limit => match order.limit_price {
            Some(limit) => check_limit(order.side, limit, bar.open, bar),
            None => MatchResult::NoMatch,
        },
        OrderType::Stop => match order.stop_price {
            Some(stop) => check_stop(order.side, stop, bar),
            None => MatchResult::NoMatch,
        },
        OrderType::StopLimit => check_stop_limit(order, bar),
        OrderType::StopTrail => check_stop_trail(order, bar),
    }
}

/// Buy fills at `open` if it is at or below the limit, else at the limit if
/// the low reaches it. Sell mirrored.
fn check_limit(side: Side, limit: Decimal, open: Decimal, bar: &BarPrices) -> MatchResult {
    let gapped_price = |p: Decimal| {
        if p == bar.open {
            MatchResult::at_open(p)
        } else {
            MatchResult::at(p)
        }
    };
    match side {
        Side::Buy if open <= limit => gapped_price(open),
        Side::Buy if bar.low <= limit => MatchResult::at(limit),
        Side::Sell if open >= limit => gapped_price(open),
        Side::Sell if bar.high >= limit => MatchResult::at(limit),
        _ => MatchResult::NoMatch,
    }
}

/// Buy triggers at the open if it gapped above the stop, else at the stop if
/// the high reaches it. Sell mirrored.
fn check_stop(side: Side, stop: Decimal, bar: &BarPrices) -> MatchResult {
    match side {
        Side::Buy if bar.open >= stop => MatchResult::at_open(bar.open),
        Side::Buy if bar.high >= stop => MatchResult::at(stop),
        Side::Sell if bar.open <= stop => MatchResult::at_open(bar.open),
        Side::Sell if bar.low <= stop => MatchResult::at(stop),
        _ => MatchResult::NoMatch,
    }
}

fn check_stop_limit(order: &mut Order, bar: &BarPrices) -> MatchResult {
    let (Some(stop), Some(limit)) = (order.stop_price, order.limit_price) else {
        return MatchResult::NoMatch;
    };
    if order.triggered {
        return check_limit(order.side, limit, bar.open, bar);
    }
    let arm_price = match check_stop(order.side, stop, bar) {
        MatchResult::Fill { price, .. } => price,
        MatchResult::NoMatch => return MatchResult::NoMatch,
    };
    order.triggered = true;
    tracing::debug!(order = %order.id, price = %arm_price, "Stop-limit armed");
    check_limit(order.side, limit, arm_price, bar)
}

/// Stop level trailing `reference` for `order`.
fn trail_level(order: &Order, reference: Decimal) -> Option<Decimal> {
    let distance = match (order.trail_amount, order.trail_percent) {
        (Some(amount), _) => amount,
        (None, Some(pct)) => reference * pct,
        (None, None) => return None,
    };
    Some(match order.side {
        Side::Sell => reference - distance,
        Side::Buy => reference + distance,
    })
}

fn check_stop_trail(order: &mut Order, bar: &BarPrices) -> MatchResult {
    if order.stop_price.is_none() {
        order.stop_price = trail_level(order, order.created_price);
    }
    let Some(stop) = order.stop_price else {
        return MatchResult::NoMatch;
    };
    let result = check_stop(order.side, stop, bar);
    if result == MatchResult::NoMatch {
        // only tightens
        if let Some(level) = trail_level(order, bar.close) {
            order.stop_price = Some(match order.side {
                Side::Sell => stop.max(level),
                Side::Buy => stop.min(level),
            });
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use barflow_core::{FeedId, OrderId, OrderRequest, Validity};
    use rust_decimal_macros::dec;

    fn bar(open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> BarPrices {
        BarPrices {
            timestamp: 0,
            open,
            high,
            low,
            close,
            volume: dec!(1000),
        }
    }

    fn order(req: OrderRequest) -> Order {
        Order::from_request(OrderId(0), &req, Validity::GoodTillCancel, 0, 1, dec!(100))
    }

    #[test]
    fn test_market_reference() {
        let mut o = order(OrderRequest::market(FeedId(0), Side::Buy, dec!(1)));
        let b = bar(dec!(101), dec!(103), dec!(99), dec!(102));
        assert_eq!(match_order(&mut o, &b, MarketFill::NextOpen), MatchResult::at_open(dec!(101)));
        assert_eq!(match_order(&mut o, &b, MarketFill::SameClose), MatchResult::at(dec!(102)));
        assert!(!is_eligible(&o, 1, MarketFill::NextOpen));
        assert!(is_eligible(&o, 1, MarketFill::SameClose));
        assert!(is_eligible(&o, 2, MarketFill::NextOpen));
    }

    #[test]
    fn test_limit_gap_and_touch() {
        let mut buy = order(OrderRequest::limit(FeedId(0), Side::Buy, dec!(1), dec!(100)));
        let gap = bar(dec!(98), dec!(99), dec!(97), dec!(98));
        assert_eq!(match_order(&mut buy, &gap, MarketFill::NextOpen), MatchResult::at_open(dec!(98)));
        let touch = bar(dec!(102), dec!(103), dec!(99), dec!(101));
        assert_eq!(match_order(&mut buy, &touch, MarketFill::NextOpen), MatchResult::at(dec!(100)));
        let miss = bar(dec!(102), dec!(103), dec!(101), dec!(101));
        assert_eq!(match_order(&mut buy, &miss, MarketFill::NextOpen), MatchResult::NoMatch);

        let mut sell = order(OrderRequest::limit(FeedId(0), Side::Sell, dec!(1), dec!(105)));
        let up = bar(dec!(106), dec!(107), dec!(104), dec!(105));
        assert_eq!(match_order(&mut sell, &up, MarketFill::NextOpen), MatchResult::at_open(dec!(106)));
    }

    #[test]
    fn test_stop_gap_and_touch() {
        let mut sell = order(OrderRequest::stop(FeedId(0), Side::Sell, dec!(1), dec!(95)));
        let gap = bar(dec!(93), dec!(94), dec!(90), dec!(92));
        assert_eq!(match_order(&mut sell, &gap, MarketFill::NextOpen), MatchResult::at_open(dec!(93)));
        let touch = bar(dec!(97), dec!(98), dec!(94), dec!(96));
        assert_eq!(match_order(&mut sell, &touch, MarketFill::NextOpen), MatchResult::at(dec!(95)));

        let mut buy = order(OrderRequest::stop(FeedId(0), Side::Buy, dec!(1), dec!(105)));
        let quiet = bar(dec!(100), dec!(104), dec!(99), dec!(101));
        assert_eq!(match_order(&mut buy, &quiet, MarketFill::NextOpen), MatchResult::NoMatch);
    }

    #[test]
    fn test_stop_limit_arms_then_limits() {
        let req = OrderRequest::stop_limit(FeedId(0), Side::Buy, dec!(1), dec!(105), dec!(106));
        let mut o = order(req);

        // gaps over the limit: armed at open 108, limit not reachable above low 107
        let b1 = bar(dec!(108), dec!(110), dec!(107), dec!(109));
        assert_eq!(match_order(&mut o, &b1, MarketFill::NextOpen), MatchResult::NoMatch);
        assert!(o.triggered);

        // later bars behave as a plain limit
        let b2 = bar(dec!(107), dec!(108), dec!(105), dec!(106));
        assert_eq!(match_order(&mut o, &b2, MarketFill::NextOpen), MatchResult::at(dec!(106)));
    }

    #[test]
    fn test_stop_limit_fills_at_arm_price() {
        let req = OrderRequest::stop_limit(FeedId(0), Side::Buy, dec!(1), dec!(105), dec!(106));
        let mut o = order(req);
        let b = bar(dec!(101), dec!(107), dec!(100), dec!(106));
        assert_eq!(match_order(&mut o, &b, MarketFill::NextOpen), MatchResult::at(dec!(105)));
    }

    #[test]
    fn test_trailing_stop_only_tightens() {
        let mut o = order(OrderRequest::stop_trail(FeedId(0), Side::Sell, dec!(1), dec!(5)));
        let up = bar(dec!(100), dec!(111), dec!(99), dec!(110));
        assert_eq!(match_order(&mut o, &up, MarketFill::NextOpen), MatchResult::NoMatch);
        assert_eq!(o.stop_price, Some(dec!(105)));

        let down = bar(dec!(108), dec!(109), dec!(106), dec!(107));
        assert_eq!(match_order(&mut o, &down, MarketFill::NextOpen), MatchResult::NoMatch);
        assert_eq!(o.stop_price, Some(dec!(105)));

        let hit = bar(dec!(106), dec!(107), dec!(104), dec!(104));
        assert_eq!(match_order(&mut o, &hit, MarketFill::NextOpen), MatchResult::at(dec!(105)));
    }

    #[test]
    fn test_trailing_percent() {
        let req = OrderRequest::stop_trail_percent(FeedId(0), Side::Buy, dec!(1), dec!(0.1));
        let mut o = order(req);
        let b = bar(dec!(100), dec!(101), dec!(90), dec!(90));
        assert_eq!(match_order(&mut o, &b, MarketFill::NextOpen), MatchResult::NoMatch);
        assert_eq!(o.stop_price, Some(dec!(99.0)));
    }
}
