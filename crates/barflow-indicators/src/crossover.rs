//! Crossing detection between two lines.

use barflow_core::{ComputeNode, EngineResult, GraphBuilder, LineId, NodeError, NodeIo};

use crate::SingleLine;

/// `+1.0` when the first input crosses above the second, `-1.0` when it
/// crosses below, `0.0` otherwise.
#[derive(Debug, Clone, Default)]
pub struct CrossOver;

impl CrossOver {
    pub fn new() -> Self {
        Self
    }

    /// Wire a crossover of `fast` over `slow` into `graph`.
    pub fn attach<G: GraphBuilder + ?Sized>(
        graph: &mut G,
        fast: LineId,
        slow: LineId,
    ) -> EngineResult<SingleLine> {
        let handle = graph.add_node(Box::new(Self::new()), &[fast, slow])?;
        Ok(SingleLine::from_handle(&handle)?)
    }
}

fn cross(prev_a: f64, prev_b: f64, a: f64, b: f64) -> f64 {
    if prev_a <= prev_b && a > b {
        1.0
    } else if prev_a >= prev_b && a < b {
        -1.0
    } else {
        0.0
    }
}

impl ComputeNode for CrossOver {
    fn name(&self) -> &str {
        "CrossOver"
    }

    fn outputs(&self) -> &[&'static str] {
        &["crossover"]
    }

    fn lag(&self) -> usize {
        1
    }

    fn next(&mut self, io: &mut NodeIo<'_>) -> Result<(), NodeError> {
        let value = cross(io.input(0, -1)?, io.input(1, -1)?, io.input(0, 0)?, io.input(1, 0)?);
        io.set_output(0, value)
    }

    fn supports_bulk(&self) -> bool {
        true
    }

    fn bulk(&mut self, io: &mut NodeIo<'_>, seed_index: usize, end: usize) -> Result<(), NodeError> {
        for i in seed_index.max(1)..end {
            let value = cross(
                io.input_abs(0, i - 1)?,
                io.input_abs(1, i - 1)?,
                io.input_abs(0, i)?,
                io.input_abs(1, i)?,
            );
            io.set_output_abs(0, i, value)?;
        }
        Ok(())
    }
}
