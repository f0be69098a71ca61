//! Compute node trait definition.

use crate::error::{DataError, GraphError, NodeError};
use crate::series::LineStore;
use crate::types::{LineId, NodeId};

/// A node's view of the line store: read its inputs, write its outputs.
///
/// Input and output lines are addressed by position, in the order they were
/// connected and declared.
pub struct NodeIo<'a> {
    name: &'a str,
    store: &'a mut LineStore,
    inputs: &'a [LineId],
    outputs: &'a [LineId],
}

impl<'a> NodeIo<'a> {
    pub fn new(
        name: &'a str,
        store: &'a mut LineStore,
        inputs: &'a [LineId],
        outputs: &'a [LineId],
    ) -> Self {
        Self {
            name,
            store,
            inputs,
            outputs,
        }
    }

    fn input_line(&self, k: usize) -> Result<LineId, NodeError> {
        self.inputs
            .get(k)
            .copied()
            .ok_or_else(|| NodeError::data(self.name, DataError::UnknownLine(k)))
    }

    fn output_line(&self, k: usize) -> Result<LineId, NodeError> {
        self.outputs
            .get(k)
            .copied()
            .ok_or_else(|| NodeError::data(self.name, DataError::UnknownLine(k)))
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Cursor-relative read. Positive offsets fail even on a preloaded line.
    fn read_past(&self, line: LineId, ago: isize) -> Result<f64, NodeError> {
        if ago > 0 {
            let len = self.store.line_len(line);
            return Err(NodeError::data(self.name, DataError::OutOfRange { ago, len }));
        }
        self.store
            .read(line, ago)
            .map_err(|e| NodeError::data(self.name, e))
    }

    /// Read input `k`, `ago` bars from its cursor (`ago <= 0`).
    #[inline]
    pub fn input(&self, k: usize, ago: isize) -> Result<f64, NodeError> {
        let line = self.input_line(k)?;
        self.read_past(line, ago)
    }

    /// Read one of this node's own outputs (`ago <= 0`).
    #[inline]
    pub fn output(&self, k: usize, ago: isize) -> Result<f64, NodeError> {
        let line = self.output_line(k)?;
        self.read_past(line, ago)
    }

    /// Write output `k` at the current slot.
    #[inline]
    pub fn set_output(&mut self, k: usize, value: f64) -> Result<(), NodeError> {
        let line = self.output_line(k)?;
        self.store
            .set(line, 0, value)
            .map_err(|e| NodeError::data(self.name, e))
    }

    /// Bars seen by input `k`.
    pub fn input_len(&self, k: usize) -> Result<usize, NodeError> {
        let line = self.input_line(k)?;
        Ok(self.store.line_len(line))
    }

    #[inline]
    pub fn input_abs(&self, k: usize, index: usize) -> Result<f64, NodeError> {
        let line = self.input_line(k)?;
        self.store
            .get_abs(line, index)
            .map_err(|e| NodeError::data(self.name, e))
    }

    #[inline]
    pub fn output_abs(&self, k: usize, index: usize) -> Result<f64, NodeError> {
        let line = self.output_line(k)?;
        self.store
            .get_abs(line, index)
            .map_err(|e| NodeError::data(self.name, e))
    }

    #[inline]
    pub fn set_output_abs(&mut self, k: usize, index: usize, value: f64) -> Result<(), NodeError> {
        let line = self.output_line(k)?;
        self.store
            .set_abs(line, index, value)
            .map_err(|e| NodeError::data(self.name, e))
    }
}

/// One incremental computation in the node graph (indicator, observer, ...).
///
/// The scheduler drives a node through three step states by the length `L` of
/// its clock: `warmup` while `L < minperiod`, `seed` once at `L == minperiod`,
/// `next` afterwards. Step methods recompute the current slot from lines only,
/// so calling them again on an overwritten bar gives the right answer.
///
/// Nodes supporting bulk computation fill `[seed_index, end)` in one call with
/// values bit-identical to the step path.
pub trait ComputeNode: Send {
    /// Get the node name.
    fn name(&self) -> &str;

    /// Roles of the output lines, in order.
    fn outputs(&self) -> &[&'static str];

    /// Extra bars needed on top of the inputs' minperiod.
    fn lag(&self) -> usize {
        0
    }

    /// Derive the node's minperiod from its inputs' minperiods.
    fn minperiod(&self, inputs: &[usize]) -> usize {
        inputs.iter().copied().max().unwrap_or(0) + self.lag()
    }

    /// `(output, input, offset)`: bind an output onto an input instead of
    /// computing it. Such nodes never write.
    fn alias_output(&self) -> Option<(usize, usize, usize)> {
        None
    }

    /// Called for every bar before the minperiod is reached.
    fn warmup(&mut self, _io: &mut NodeIo<'_>) -> Result<(), NodeError> {
        Ok(())
    }

    /// Called once, on the bar where the minperiod is reached.
    fn seed(&mut self, io: &mut NodeIo<'_>) -> Result<(), NodeError> {
        self.next(io)
    }

    /// Called on every bar after the seed bar.
    fn next(&mut self, io: &mut NodeIo<'_>) -> Result<(), NodeError>;

    fn supports_bulk(&self) -> bool {
        false
    }

    /// Fill absolute indices `[seed_index, end)` of every output at once.
    fn bulk(&mut self, _io: &mut NodeIo<'_>, _seed_index: usize, _end: usize) -> Result<(), NodeError> {
        Err(NodeError::BulkUnsupported(self.name().to_string()))
    }
}

/// Lines allocated for a node added to a graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeHandle {
    pub node: NodeId,
    /// One line per output role, in declaration order
    pub outputs: Vec<LineId>,
}

impl NodeHandle {
    pub fn output(&self, k: usize) -> Result<LineId, GraphError> {
        self.outputs
            .get(k)
            .copied()
            .ok_or(GraphError::UnknownLine(k))
    }
}

/// Something nodes can be wired into.
pub trait GraphBuilder {
    /// Add `node` reading `inputs` and allocate its output lines.
    fn add_node(
        &mut self,
        node: Box<dyn ComputeNode>,
        inputs: &[LineId],
    ) -> Result<NodeHandle, GraphError>;
}
