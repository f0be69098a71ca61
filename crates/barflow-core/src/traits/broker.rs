//! Broker trait definition.

use rust_decimal::Decimal;

use crate::types::{FeedId, Order, OrderId, OrderRequest, Position};

/// Order entry and account queries.
///
/// Orders are acknowledged synchronously with an id; their progress is reported
/// through notifications delivered by the engine.
pub trait Broker {
    /// Submit a new order.
    fn submit(&mut self, request: OrderRequest) -> OrderId;

    /// Request cancellation. Returns false if the order is unknown or already terminal.
    fn cancel(&mut self, order: OrderId) -> bool;

    /// Get the available cash.
    fn get_cash(&self) -> Decimal;

    /// Get cash plus the marked-to-market value of all positions.
    fn get_value(&self) -> Decimal;

    /// Get the position in an instrument (flat if never traded).
    fn get_position(&self, instrument: FeedId) -> Position;

    /// Look up an order.
    fn get_order(&self, order: OrderId) -> Option<&Order>;
}
