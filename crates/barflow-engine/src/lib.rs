//! Backtesting engine.
//!
//! Wires feeds and compute nodes into a [`NodeGraph`], drives them with the
//! [`Scheduler`] and hands every tick to a [`Strategy`].

pub mod config;
pub mod graph;
mod report;
pub mod scheduler;
mod sizer;
mod strategy;

pub use config::{EngineConfig, ExecutionMode};
pub use graph::{FeedSeries, NodeGraph, NodeState};
pub use report::{EquityPoint, FeedSummary, PositionSummary, RunReport};
pub use scheduler::{Scheduler, StepOutcome, StopHandle};
pub use sizer::SizingMethod;
pub use strategy::{FeedHandle, Setup, Strategy, StrategyContext};
