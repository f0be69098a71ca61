//! Market simulator for barflow.
//!
//! Matches orders against bars, keeps cash, positions and trades, and queues
//! notifications for the strategy.

pub mod book;
pub mod commission;
pub mod config;
pub mod matching;
pub mod simulator;
pub mod slippage;

pub use book::OrderBook;
pub use commission::{CommissionInfo, CommissionMode};
pub use config::{BrokerConfig, FillPolicy, MarketFill};
pub use matching::{BarPrices, MatchResult};
pub use simulator::{MarketSimulator, Notification};
pub use slippage::{PriceContext, SlippageConfig, SlippageKind};
