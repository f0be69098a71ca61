//! Core types and traits for the backtesting engine.
//!
//! This crate provides the foundational building blocks:
//! - Market data types (Bar, Timeframe)
//! - Order, position and trade types
//! - Time-series buffers, the line store and series groups
//! - Core traits for feeds, brokers and compute nodes

pub mod error;
pub mod series;
pub mod traits;
pub mod types;

pub use error::{ConfigError, DataError, EngineError, EngineResult, GraphError, NodeError};
pub use series::*;
pub use traits::*;
pub use types::*;
