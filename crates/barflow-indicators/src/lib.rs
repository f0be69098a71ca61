//! Reference compute nodes.
//!
//! Every node supports both the incremental step path and the bulk path, with
//! identical results:
//! - Moving averages (SMA, EMA)
//! - Rolling extremes (Highest, Lowest)
//! - Bollinger Bands
//! - CrossOver signals
//! - Delay (an aliased view of another line)
//!
//! Each node has an `attach` constructor that wires it into a graph and returns
//! a typed handle to its output lines.

pub mod crossover;
pub mod delay;
pub mod extremes;
pub mod moving_average;
pub mod volatility;
mod window;

use barflow_core::{GraphError, LineId, NodeHandle, NodeId};

pub use crossover::CrossOver;
pub use delay::Delay;
pub use extremes::{Highest, Lowest};
pub use moving_average::{Ema, Sma};
pub use volatility::{BollingerBands, BollingerLines};

/// Handle of a single-output node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SingleLine {
    pub node: NodeId,
    pub line: LineId,
}

impl SingleLine {
    pub fn from_handle(handle: &NodeHandle) -> Result<Self, GraphError> {
        Ok(Self {
            node: handle.node,
            line: handle.output(0)?,
        })
    }
}
