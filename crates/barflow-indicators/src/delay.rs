//! Delayed view of a line.

use barflow_core::{ComputeNode, EngineResult, GraphBuilder, LineId, NodeError, NodeIo};

use crate::SingleLine;

/// Output equals the input `offset` bars ago.
///
/// The output is bound onto the input's storage, so the node never computes.
#[derive(Debug, Clone)]
pub struct Delay {
    name: String,
    offset: usize,
}

impl Delay {
    pub fn new(offset: usize) -> Self {
        Self {
            name: format!("Delay({})", offset),
            offset,
        }
    }

    pub fn attach<G: GraphBuilder + ?Sized>(
        graph: &mut G,
        input: LineId,
        offset: usize,
    ) -> EngineResult<SingleLine> {
        let handle = graph.add_node(Box::new(Self::new(offset)), &[input])?;
        Ok(SingleLine::from_handle(&handle)?)
    }
}

impl ComputeNode for Delay {
    fn name(&self) -> &str {
        &self.name
    }

    fn outputs(&self) -> &[&'static str] {
        &["delay"]
    }

    fn lag(&self) -> usize {
        self.offset
    }

    fn alias_output(&self) -> Option<(usize, usize, usize)> {
        Some((0, 0, self.offset))
    }

    fn next(&mut self, _io: &mut NodeIo<'_>) -> Result<(), NodeError> {
        Ok(())
    }

    fn supports_bulk(&self) -> bool {
        true
    }

    fn bulk(&mut self, _io: &mut NodeIo<'_>, _seed_index: usize, _end: usize) -> Result<(), NodeError> {
        Ok(())
    }
}
