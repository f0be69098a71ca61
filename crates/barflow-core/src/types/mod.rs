//! Core data types for the backtesting engine.

mod ids;
mod ohlcv;
mod order;
mod position;
mod timeframe;

pub use ids::{FeedId, LineId, NodeId, OrderId, TradeId};
pub use ohlcv::{to_decimal, Bar};
pub use order::{
    BracketOrders, Execution, Order, OrderRequest, OrderStatus, OrderType, RejectReason, Side,
    Validity,
};
pub use position::{Position, PositionUpdate, Trade, TradeEvent, TradeStatus};
pub use timeframe::{TimeUnit, Timeframe};
