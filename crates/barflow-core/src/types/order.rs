//! Order types and structures.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ids::{FeedId, OrderId};

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Get the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Get the sign for position calculations (+1 for buy, -1 for sell).
    pub fn sign(&self) -> Decimal {
        match self {
            Side::Buy => Decimal::ONE,
            Side::Sell => -Decimal::ONE,
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, Side::Buy)
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Execute at the next available price
    Market,
    /// Execute at the close of the next bar
    Close,
    /// Execute at the limit price or better
    Limit,
    /// Becomes a market order once the stop price is touched
    Stop,
    /// Becomes a limit order once the stop price is touched
    StopLimit,
    /// Stop whose price follows the close by an amount or percentage
    StopTrail,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Close => write!(f, "CLOSE"),
            OrderType::Limit => write!(f, "LIMIT"),
            OrderType::Stop => write!(f, "STOP"),
            OrderType::StopLimit => write!(f, "STOP_LIMIT"),
            OrderType::StopTrail => write!(f, "STOP_TRAIL"),
        }
    }
}

/// How long an order stays eligible for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Validity {
    /// Good til canceled
    #[default]
    GoodTillCancel,
    /// Until the end of the (UTC) day the order was created on
    Day,
    /// Until the given timestamp (ms), inclusive
    Until(i64),
    /// For this many bars after creation
    Bars(usize),
}

/// Order status.
///
/// `Created -> Submitted -> Accepted -> (Partial)* -> terminal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Created,
    Submitted,
    Accepted,
    Partial,
    Completed,
    Canceled,
    Expired,
    /// Not enough cash to accept or execute
    Margin,
    Rejected,
}

impl OrderStatus {
    /// Check if the order is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed
                | OrderStatus::Canceled
                | OrderStatus::Expired
                | OrderStatus::Margin
                | OrderStatus::Rejected
        )
    }

    /// Check if the order can still be filled or canceled.
    pub fn is_alive(&self) -> bool {
        !self.is_terminal()
    }

    /// Terminal states other than completion.
    pub fn is_failure(&self) -> bool {
        self.is_terminal() && *self != OrderStatus::Completed
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Created => "Created",
            OrderStatus::Submitted => "Submitted",
            OrderStatus::Accepted => "Accepted",
            OrderStatus::Partial => "Partial",
            OrderStatus::Completed => "Completed",
            OrderStatus::Canceled => "Canceled",
            OrderStatus::Expired => "Expired",
            OrderStatus::Margin => "Margin",
            OrderStatus::Rejected => "Rejected",
        };
        f.write_str(s)
    }
}

/// Why an order ended without completing. Carried on the order, never an `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Size was zero or negative
    ZeroSize,
    /// A price required by the order type was missing
    MissingPrice,
    /// Not enough cash
    Margin,
    /// Validity ran out
    Expired,
    /// Bracket parent did not complete
    ParentFailed,
    /// Another order of the OCO group executed or was canceled
    OcoSibling,
    /// Canceled on request
    Requested,
}

/// Order request for submitting new orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Feed whose instrument is traded
    pub instrument: FeedId,
    /// Buy or sell
    pub side: Side,
    /// Type of order
    pub order_type: OrderType,
    /// Unsigned quantity to trade
    pub size: Decimal,
    /// Limit price (Limit, StopLimit)
    pub limit_price: Option<Decimal>,
    /// Stop price (Stop, StopLimit, optional initial price for StopTrail)
    pub stop_price: Option<Decimal>,
    /// Trailing distance in price units
    pub trail_amount: Option<Decimal>,
    /// Trailing distance as a fraction of price (0.02 = 2%)
    pub trail_percent: Option<Decimal>,
    /// Validity, the broker default when unset
    pub validity: Option<Validity>,
    /// Join the OCO group of this order
    pub oco: Option<OrderId>,
}

impl OrderRequest {
    fn base(instrument: FeedId, side: Side, order_type: OrderType, size: Decimal) -> Self {
        Self {
            instrument,
            side,
            order_type,
            size,
            limit_price: None,
            stop_price: None,
            trail_amount: None,
            trail_percent: None,
            validity: None,
            oco: None,
        }
    }

    /// Create a market order request.
    pub fn market(instrument: FeedId, side: Side, size: Decimal) -> Self {
        Self::base(instrument, side, OrderType::Market, size)
    }

    /// Create a market-on-close order request.
    pub fn close(instrument: FeedId, side: Side, size: Decimal) -> Self {
        Self::base(instrument, side, OrderType::Close, size)
    }

    /// Create a limit order request.
    pub fn limit(instrument: FeedId, side: Side, size: Decimal, limit_price: Decimal) -> Self {
        Self {
            limit_price: Some(limit_price),
            ..Self::base(instrument, side, OrderType::Limit, size)
        }
    }

    /// Create a stop order request.
    pub fn stop(instrument: FeedId, side: Side, size: Decimal, stop_price: Decimal) -> Self {
        Self {
            stop_price: Some(stop_price),
            ..Self::base(instrument, side, OrderType::Stop, size)
        }
    }

    /// Create a stop-limit order request.
    pub fn stop_limit(
        instrument: FeedId,
        side: Side,
        size: Decimal,
        stop_price: Decimal,
        limit_price: Decimal,
    ) -> Self {
        Self {
            stop_price: Some(stop_price),
            limit_price: Some(limit_price),
            ..Self::base(instrument, side, OrderType::StopLimit, size)
        }
    }

    /// Create a trailing stop that follows the close by a fixed amount.
    pub fn stop_trail(instrument: FeedId, side: Side, size: Decimal, amount: Decimal) -> Self {
        Self {
            trail_amount: Some(amount),
            ..Self::base(instrument, side, OrderType::StopTrail, size)
        }
    }

    /// Create a trailing stop that follows the close by a fraction of price.
    pub fn stop_trail_percent(
        instrument: FeedId,
        side: Side,
        size: Decimal,
        percent: Decimal,
    ) -> Self {
        Self {
            trail_percent: Some(percent),
            ..Self::base(instrument, side, OrderType::StopTrail, size)
        }
    }

    /// Set the validity.
    pub fn with_validity(mut self, validity: Validity) -> Self {
        self.validity = Some(validity);
        self
    }

    /// Link this order to the OCO group of `other`.
    pub fn with_oco(mut self, other: OrderId) -> Self {
        self.oco = Some(other);
        self
    }

    /// Set an initial stop price (trailing stops).
    pub fn with_stop_price(mut self, stop_price: Decimal) -> Self {
        self.stop_price = Some(stop_price);
        self
    }

    /// Size signed by side.
    pub fn signed_size(&self) -> Decimal {
        self.side.sign() * self.size
    }
}

/// Handles of the three orders of a bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketOrders {
    pub parent: OrderId,
    pub stop_loss: OrderId,
    pub take_profit: OrderId,
}

/// One (partial) execution of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    /// Timestamp of the bar the fill happened on
    pub timestamp: i64,
    /// Bar number (clock length) of the instrument at fill time
    pub bar: usize,
    /// Executed size, signed by side
    pub size: Decimal,
    /// Execution price after slippage
    pub price: Decimal,
    /// Part of `size` that reduced an existing position (signed like `size`)
    pub closed: Decimal,
    /// Part of `size` that opened or extended a position (signed like `size`)
    pub opened: Decimal,
    /// Realized profit and loss of the closed part
    pub pnl: Decimal,
    /// Commission charged for this execution
    pub commission: Decimal,
    /// Position size after the fill
    pub position_size: Decimal,
    /// Position average price after the fill
    pub position_price: Decimal,
}

/// Complete order with status and execution history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Sequential order ID
    pub id: OrderId,
    pub instrument: FeedId,
    pub side: Side,
    pub order_type: OrderType,
    /// Original unsigned size
    pub size: Decimal,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub trail_amount: Option<Decimal>,
    pub trail_percent: Option<Decimal>,
    pub validity: Validity,
    /// Current status
    pub status: OrderStatus,
    /// Set when the order ended without completing
    pub reason: Option<RejectReason>,
    /// Timestamp of the instrument's current bar at creation
    pub created_at: i64,
    /// Instrument bar number at creation
    pub created_bar: usize,
    /// Reference price at creation (instrument close), used for cash checks
    pub created_price: Decimal,
    /// Unsigned size filled so far
    pub filled: Decimal,
    /// Average fill price
    pub avg_price: Decimal,
    /// Commission charged so far
    pub commission: Decimal,
    /// Realized pnl across executions
    pub pnl: Decimal,
    /// Execution records in fill order
    pub executions: Vec<Execution>,
    /// Bracket parent
    pub parent: Option<OrderId>,
    /// Bracket children
    pub children: Vec<OrderId>,
    /// OCO group key (the id of the first order in the group)
    pub oco: Option<OrderId>,
    /// Inactive orders (bracket children) are not matched
    pub active: bool,
    /// Stop condition has been met (StopLimit)
    pub triggered: bool,
    pub cancel_requested: bool,
}

impl Order {
    /// Create a new order from a request.
    pub fn from_request(
        id: OrderId,
        request: &OrderRequest,
        validity: Validity,
        created_at: i64,
        created_bar: usize,
        created_price: Decimal,
    ) -> Self {
        Self {
            id,
            instrument: request.instrument,
            side: request.side,
            order_type: request.order_type,
            size: request.size,
            limit_price: request.limit_price,
            stop_price: request.stop_price,
            trail_amount: request.trail_amount,
            trail_percent: request.trail_percent,
            validity,
            status: OrderStatus::Created,
            reason: None,
            created_at,
            created_bar,
            created_price,
            filled: Decimal::ZERO,
            avg_price: Decimal::ZERO,
            commission: Decimal::ZERO,
            pnl: Decimal::ZERO,
            executions: Vec::new(),
            parent: None,
            children: Vec::new(),
            oco: request.oco,
            active: true,
            triggered: false,
            cancel_requested: false,
        }
    }

    /// Get the remaining unsigned size to be filled.
    pub fn remaining(&self) -> Decimal {
        self.size - self.filled
    }

    /// Remaining size signed by side.
    pub fn signed_remaining(&self) -> Decimal {
        self.side.sign() * self.remaining()
    }

    pub fn is_buy(&self) -> bool {
        self.side.is_buy()
    }

    pub fn is_alive(&self) -> bool {
        self.status.is_alive()
    }

    /// Check if the order is completely filled.
    pub fn is_completed(&self) -> bool {
        self.status == OrderStatus::Completed
    }

    /// Append an execution and move to Partial or Completed.
    pub fn add_execution(&mut self, execution: Execution) {
        let size = execution.size.abs();
        let total = self.filled + size;
        if !total.is_zero() {
            self.avg_price = (self.avg_price * self.filled + execution.price * size) / total;
        }
        self.filled = total;
        self.commission += execution.commission;
        self.pnl += execution.pnl;
        self.executions.push(execution);

        self.status = if self.remaining() <= Decimal::ZERO {
            OrderStatus::Completed
        } else {
            OrderStatus::Partial
        };
    }

    /// Whether the order's validity has run out on a bar at `timestamp` with
    /// instrument bar number `bar`.
    pub fn is_expired(&self, timestamp: i64, bar: usize) -> bool {
        match self.validity {
            Validity::GoodTillCancel => false,
            Validity::Day => {
                const MS_PER_DAY: i64 = 86_400_000;
                timestamp.div_euclid(MS_PER_DAY) > self.created_at.div_euclid(MS_PER_DAY)
            }
            Validity::Until(deadline) => timestamp > deadline,
            Validity::Bars(n) => bar > self.created_bar + n,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn execution(size: Decimal, price: Decimal) -> Execution {
        Execution {
            timestamp: 0,
            bar: 1,
            size,
            price,
            closed: Decimal::ZERO,
            opened: size,
            pnl: Decimal::ZERO,
            commission: dec!(1),
            position_size: size,
            position_price: price,
        }
    }

    #[test]
    fn test_side_sign() {
        assert_eq!(Side::Buy.sign(), dec!(1));
        assert_eq!(Side::Sell.sign(), dec!(-1));
        assert_eq!(Side::Buy.opposite(), Side::Sell);
    }

    #[test]
    fn test_status_classes() {
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Margin.is_terminal());
        assert!(OrderStatus::Partial.is_alive());
        assert!(!OrderStatus::Completed.is_failure());
        assert!(OrderStatus::Expired.is_failure());
    }

    #[test]
    fn test_request_builders() {
        let req = OrderRequest::stop_limit(FeedId(0), Side::Buy, dec!(5), dec!(101), dec!(102))
            .with_validity(Validity::Bars(3))
            .with_oco(OrderId(4));
        assert_eq!(req.order_type, OrderType::StopLimit);
        assert_eq!(req.stop_price, Some(dec!(101)));
        assert_eq!(req.limit_price, Some(dec!(102)));
        assert_eq!(req.validity, Some(Validity::Bars(3)));
        assert_eq!(req.oco, Some(OrderId(4)));
        assert_eq!(
            OrderRequest::market(FeedId(0), Side::Sell, dec!(2)).signed_size(),
            dec!(-2)
        );
    }

    #[test]
    fn test_partial_then_complete() {
        let req = OrderRequest::market(FeedId(0), Side::Buy, dec!(10));
        let mut order = Order::from_request(OrderId(0), &req, Validity::GoodTillCancel, 0, 1, dec!(10));

        order.add_execution(execution(dec!(4), dec!(10)));
        assert_eq!(order.status, OrderStatus::Partial);
        assert_eq!(order.remaining(), dec!(6));

        order.add_execution(execution(dec!(6), dec!(15)));
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.avg_price, dec!(13));
        assert_eq!(order.commission, dec!(2));
        assert_eq!(order.executions.len(), 2);
    }

    #[test]
    fn test_expiry() {
        let day = 86_400_000;
        let req = OrderRequest::limit(FeedId(0), Side::Buy, dec!(1), dec!(9));
        let by_day = Order::from_request(OrderId(0), &req, Validity::Day, day + 10, 1, dec!(10));
        assert!(!by_day.is_expired(day + 20, 2));
        assert!(by_day.is_expired(2 * day, 3));

        let by_bars = Order::from_request(OrderId(1), &req, Validity::Bars(2), 0, 5, dec!(10));
        assert!(!by_bars.is_expired(0, 7));
        assert!(by_bars.is_expired(0, 8));

        let until = Order::from_request(OrderId(2), &req, Validity::Until(100), 0, 1, dec!(10));
        assert!(!until.is_expired(100, 2));
        assert!(until.is_expired(101, 3));
    }
}
