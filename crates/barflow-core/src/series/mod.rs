//! Time-series storage: buffers, the line arena and series groups.

mod buffer;
mod group;
mod store;

pub use buffer::TimeSeriesBuffer;
pub use group::{BarLines, SeriesGroup};
pub use store::LineStore;
