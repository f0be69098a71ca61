//! Core traits for the backtesting engine.

mod broker;
mod feed;
mod node;

pub use broker::Broker;
pub use feed::{Feed, FeedPoll};
pub use node::{ComputeNode, GraphBuilder, NodeHandle, NodeIo};
