//! Rolling highest and lowest values.

use barflow_core::{ComputeNode, EngineResult, GraphBuilder, LineId, NodeError, NodeIo};

use crate::window::{check_period, highest, lowest, window, window_abs};
use crate::SingleLine;

/// Highest value over the last N bars.
#[derive(Debug, Clone)]
pub struct Highest {
    name: String,
    period: usize,
}

impl Highest {
    pub fn new(period: usize) -> Result<Self, NodeError> {
        check_period("Highest", period)?;
        Ok(Self {
            name: format!("Highest({})", period),
            period,
        })
    }

    pub fn attach<G: GraphBuilder + ?Sized>(
        graph: &mut G,
        input: LineId,
        period: usize,
    ) -> EngineResult<SingleLine> {
        let handle = graph.add_node(Box::new(Self::new(period)?), &[input])?;
        Ok(SingleLine::from_handle(&handle)?)
    }
}

impl ComputeNode for Highest {
    fn name(&self) -> &str {
        &self.name
    }

    fn outputs(&self) -> &[&'static str] {
        &["highest"]
    }

    fn lag(&self) -> usize {
        self.period - 1
    }

    fn next(&mut self, io: &mut NodeIo<'_>) -> Result<(), NodeError> {
        let values = window(io, 0, self.period)?;
        io.set_output(0, highest(&values))
    }

    fn supports_bulk(&self) -> bool {
        true
    }

    fn bulk(&mut self, io: &mut NodeIo<'_>, seed_index: usize, end: usize) -> Result<(), NodeError> {
        for i in seed_index..end {
            let values = window_abs(io, 0, i, self.period)?;
            io.set_output_abs(0, i, highest(&values))?;
        }
        Ok(())
    }
}

/// Lowest value over the last N bars.
#[derive(Debug, Clone)]
pub struct Lowest {
    name: String,
    period: usize,
}

impl Lowest {
    pub fn new(period: usize) -> Result<Self, NodeError> {
        check_period("Lowest", period)?;
        Ok(Self {
            name: format!("Lowest({})", period),
            period,
        })
    }

    pub fn attach<G: GraphBuilder + ?Sized>(
        graph: &mut G,
        input: LineId,
        period: usize,
    ) -> EngineResult<SingleLine> {
        let handle = graph.add_node(Box::new(Self::new(period)?), &[input])?;
        Ok(SingleLine::from_handle(&handle)?)
    }
}

impl ComputeNode for Lowest {
    fn name(&self) -> &str {
        &self.name
    }

    fn outputs(&self) -> &[&'static str] {
        &["lowest"]
    }

    fn lag(&self) -> usize {
        self.period - 1
    }

    fn next(&mut self, io: &mut NodeIo<'_>) -> Result<(), NodeError> {
        let values = window(io, 0, self.period)?;
        io.set_output(0, lowest(&values))
    }

    fn supports_bulk(&self) -> bool {
        true
    }

    fn bulk(&mut self, io: &mut NodeIo<'_>, seed_index: usize, end: usize) -> Result<(), NodeError> {
        for i in seed_index..end {
            let values = window_abs(io, 0, i, self.period)?;
            io.set_output_abs(0, i, lowest(&values))?;
        }
        Ok(())
    }
}
