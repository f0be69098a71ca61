//! Data feeds for the backtesting engine.
//!
//! - `MemoryFeed` and `CsvFeed` for historical bars
//! - `LiveFeed` fed by async providers through a bounded channel
//! - `TransformedFeed` for resampling and replay
//! - `ChainedFeed` for playing feeds back to back
//! - `ProviderRegistry` building feeds from configuration

mod chain;
mod csv_source;
mod live;
mod memory;
mod registry;
pub mod resample;

pub use chain::ChainedFeed;
pub use csv_source::{load_csv, parse_timestamp, CsvFeed};
pub use live::{channel, spawn_provider, LiveFeed, LiveProvider, StreamProvider, DEFAULT_CAPACITY};
pub use memory::MemoryFeed;
pub use registry::{FeedFactory, FeedSpec, ProviderRegistry, TransformSpec};
pub use resample::{BoundaryRule, TimeframeTransformer, TransformMode, TransformedFeed};
