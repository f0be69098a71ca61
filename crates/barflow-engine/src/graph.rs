//! Node graph: arena of feeds, nodes and lines.
//!
//! Nodes are declared and connected while the graph is open. `build` orders
//! them topologically, derives every minperiod bottom-up, binds aliased
//! outputs and freezes the graph.

use std::collections::VecDeque;

use barflow_core::{
    BarLines, ComputeNode, DataError, FeedId, GraphBuilder, GraphError, LineId, LineStore,
    NodeError, NodeHandle, NodeId, NodeIo, SeriesGroup,
};

/// Producer of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineOwner {
    Feed(FeedId),
    Node(NodeId),
}

/// Lines of one feed.
#[derive(Debug, Clone)]
pub struct FeedSeries {
    pub id: FeedId,
    pub name: String,
    pub lines: BarLines,
    pub group: SeriesGroup,
}

struct NodeEntry {
    name: String,
    node: Box<dyn ComputeNode>,
    inputs: Vec<LineId>,
    outputs: Vec<LineId>,
    group: SeriesGroup,
    minperiod: usize,
    clock: Option<FeedId>,
    multi_clock: bool,
}

/// Step state of a node for a clock length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Warmup,
    Seed,
    Steady,
}

impl NodeState {
    pub fn of(clock_len: usize, minperiod: usize) -> Self {
        match clock_len.cmp(&minperiod) {
            std::cmp::Ordering::Less => NodeState::Warmup,
            std::cmp::Ordering::Equal => NodeState::Seed,
            std::cmp::Ordering::Greater => NodeState::Steady,
        }
    }
}

/// Owns the line store, the feeds' lines and every compute node.
#[derive(Default)]
pub struct NodeGraph {
    store: LineStore,
    feeds: Vec<FeedSeries>,
    nodes: Vec<NodeEntry>,
    owners: Vec<LineOwner>,
    order: Vec<NodeId>,
    built: bool,
}

impl NodeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_open(&self, operation: &'static str) -> Result<(), GraphError> {
        if self.built {
            Err(GraphError::Frozen(operation))
        } else {
            Ok(())
        }
    }

    fn record_owner(&mut self, line: LineId, owner: LineOwner) {
        if self.owners.len() <= line.index() {
            self.owners.resize(line.index() + 1, owner);
        }
        self.owners[line.index()] = owner;
    }

    /// Allocate the lines of a new feed.
    pub fn add_feed(&mut self, name: impl Into<String>) -> Result<FeedSeries, GraphError> {
        self.check_open("add_feed")?;
        let name = name.into();
        let id = FeedId(self.feeds.len());
        let (lines, group) = BarLines::allocate(&mut self.store, &name);
        for line in lines.as_array() {
            self.record_owner(line, LineOwner::Feed(id));
        }
        let series = FeedSeries {
            id,
            name,
            lines,
            group,
        };
        self.feeds.push(series.clone());
        Ok(series)
    }

    /// Add `node` and allocate its outputs. Inputs are wired with [`Self::connect`].
    pub fn declare(&mut self, node: Box<dyn ComputeNode>) -> Result<NodeHandle, GraphError> {
        self.check_open("declare")?;
        let id = NodeId(self.nodes.len());
        let name = node.name().to_string();
        let group = SeriesGroup::allocate(&mut self.store, name.clone(), node.outputs());
        let outputs: Vec<LineId> = group.lines().collect();
        for line in &outputs {
            self.record_owner(*line, LineOwner::Node(id));
        }
        self.nodes.push(NodeEntry {
            name,
            node,
            inputs: Vec::new(),
            outputs: outputs.clone(),
            group,
            minperiod: 0,
            clock: None,
            multi_clock: false,
        });
        Ok(NodeHandle { node: id, outputs })
    }

    /// Set the input lines of a declared node.
    pub fn connect(&mut self, node: NodeId, inputs: &[LineId]) -> Result<(), GraphError> {
        self.check_open("connect")?;
        if let Some(bad) = inputs.iter().find(|l| !self.store.contains(**l)) {
            return Err(GraphError::UnknownLine(bad.index()));
        }
        let entry = self
            .nodes
            .get_mut(node.index())
            .ok_or(GraphError::UnknownNode(node.index()))?;
        entry.inputs = inputs.to_vec();
        Ok(())
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    fn owner(&self, line: LineId) -> Result<LineOwner, GraphError> {
        self.owners
            .get(line.index())
            .copied()
            .ok_or(GraphError::UnknownLine(line.index()))
    }

    /// Kahn's algorithm over node-to-node edges, ties broken by declaration order.
    fn topological_order(&self) -> Result<Vec<NodeId>, GraphError> {
        let n = self.nodes.len();
        let mut indegree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, entry) in self.nodes.iter().enumerate() {
            for line in &entry.inputs {
                if let LineOwner::Node(src) = self.owner(*line)? {
                    dependents[src.index()].push(i);
                    indegree[i] += 1;
                }
            }
        }

        let mut queue: VecDeque<usize> = (0..n).filter(|i| indegree[*i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(i) = queue.pop_front() {
            order.push(NodeId(i));
            for dep in &dependents[i] {
                indegree[*dep] -= 1;
                if indegree[*dep] == 0 {
                    queue.push_back(*dep);
                }
            }
        }

        if order.len() < n {
            let nodes = (0..n)
                .filter(|i| indegree[*i] > 0)
                .map(|i| self.nodes[i].name.clone())
                .collect();
            return Err(GraphError::Cycle { nodes });
        }
        Ok(order)
    }

    /// Order nodes, derive minperiods and clocks, bind aliases, then freeze.
    pub fn build(&mut self) -> Result<(), GraphError> {
        self.check_open("build")?;
        let order = self.topological_order()?;
        let primary = self.feeds.first().map(|f| f.id);

        for id in &order {
            let i = id.index();
            let mut minperiods = Vec::with_capacity(self.nodes[i].inputs.len());
            let mut clocks = Vec::with_capacity(self.nodes[i].inputs.len());
            for line in &self.nodes[i].inputs {
                minperiods.push(self.line_minperiod(*line)?);
                clocks.push(self.line_clock(*line)?);
            }

            let entry = &mut self.nodes[i];
            let minperiod = entry.node.minperiod(&minperiods);
            if minperiod == 0 {
                return Err(GraphError::MinperiodUnderflow {
                    node: entry.name.clone(),
                    minperiod,
                });
            }
            entry.minperiod = minperiod;
            entry.group.set_minperiod(minperiod);
            entry.clock = clocks.first().copied().flatten().or(primary);
            entry.multi_clock = clocks.iter().any(|c| *c != entry.clock);

            if let Some((output, input, offset)) = entry.node.alias_output() {
                let invalid = || GraphError::InvalidAlias {
                    node: entry.name.clone(),
                    output,
                    input,
                };
                let (Some(out_line), Some(in_line)) =
                    (entry.outputs.get(output), entry.inputs.get(input))
                else {
                    return Err(invalid());
                };
                self.store
                    .bind(*out_line, *in_line, offset)
                    .map_err(|_| invalid())?;
            }

            tracing::debug!(
                node = %self.nodes[i].name,
                minperiod,
                clock = ?self.nodes[i].clock,
                "Node built"
            );
        }

        self.order = order;
        self.built = true;
        Ok(())
    }

    /// Minperiod of a line: 1 for feed lines, the producing node's otherwise.
    pub fn line_minperiod(&self, line: LineId) -> Result<usize, GraphError> {
        match self.owner(line)? {
            LineOwner::Feed(_) => Ok(1),
            LineOwner::Node(node) => Ok(self.nodes[node.index()].minperiod),
        }
    }

    /// Feed whose bars drive a line.
    pub fn line_clock(&self, line: LineId) -> Result<Option<FeedId>, GraphError> {
        match self.owner(line)? {
            LineOwner::Feed(feed) => Ok(Some(feed)),
            LineOwner::Node(node) => Ok(self.nodes[node.index()].clock),
        }
    }

    /// Nodes in evaluation order. Empty until built.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn feeds(&self) -> &[FeedSeries] {
        &self.feeds
    }

    pub fn feed(&self, id: FeedId) -> Option<&FeedSeries> {
        self.feeds.get(id.index())
    }

    pub fn store(&self) -> &LineStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut LineStore {
        &mut self.store
    }

    fn entry(&self, node: NodeId) -> Result<&NodeEntry, GraphError> {
        self.nodes
            .get(node.index())
            .ok_or(GraphError::UnknownNode(node.index()))
    }

    pub fn node_name(&self, node: NodeId) -> Result<&str, GraphError> {
        self.entry(node).map(|e| e.name.as_str())
    }

    pub fn node_minperiod(&self, node: NodeId) -> Result<usize, GraphError> {
        self.entry(node).map(|e| e.minperiod)
    }

    pub fn node_clock(&self, node: NodeId) -> Result<Option<FeedId>, GraphError> {
        self.entry(node).map(|e| e.clock)
    }

    /// Inputs come from more than one feed clock.
    pub fn is_multi_clock(&self, node: NodeId) -> Result<bool, GraphError> {
        self.entry(node).map(|e| e.multi_clock)
    }

    pub fn supports_bulk(&self, node: NodeId) -> Result<bool, GraphError> {
        self.entry(node).map(|e| e.node.supports_bulk())
    }

    pub fn node_inputs(&self, node: NodeId) -> Result<&[LineId], GraphError> {
        self.entry(node).map(|e| e.inputs.as_slice())
    }

    /// Nodes producing the inputs of `node`.
    pub fn upstream(&self, node: NodeId) -> Result<Vec<NodeId>, GraphError> {
        let mut up = Vec::new();
        for line in self.node_inputs(node)? {
            if let LineOwner::Node(src) = self.owner(*line)? {
                up.push(src);
            }
        }
        Ok(up)
    }

    /// Open a new (NaN) slot in every output of `node`.
    pub fn advance_outputs(&mut self, node: NodeId) -> Result<(), DataError> {
        let Some(entry) = self.nodes.get(node.index()) else {
            return Err(DataError::UnknownLine(node.index()));
        };
        for line in &entry.outputs {
            self.store.forward(*line, 1)?;
        }
        Ok(())
    }

    /// Run the step method matching `clock_len` on the current slot.
    pub fn step_node(&mut self, node: NodeId, clock_len: usize) -> Result<NodeState, NodeError> {
        let Some(NodeEntry {
            name,
            node: compute,
            inputs,
            outputs,
            minperiod,
            ..
        }) = self.nodes.get_mut(node.index())
        else {
            return Err(NodeError::InvalidParameter(format!("unknown node {}", node)));
        };
        let state = NodeState::of(clock_len, *minperiod);
        let mut io = NodeIo::new(name, &mut self.store, inputs, outputs);
        match state {
            NodeState::Warmup => compute.warmup(&mut io)?,
            NodeState::Seed => compute.seed(&mut io)?,
            NodeState::Steady => compute.next(&mut io)?,
        }
        Ok(state)
    }

    /// Fill the outputs of `node` for absolute indices `[minperiod - 1, end)`.
    pub fn bulk_node(&mut self, node: NodeId, end: usize) -> Result<(), NodeError> {
        let Some(NodeEntry {
            name,
            node: compute,
            inputs,
            outputs,
            minperiod,
            ..
        }) = self.nodes.get_mut(node.index())
        else {
            return Err(NodeError::InvalidParameter(format!("unknown node {}", node)));
        };
        for line in outputs.iter() {
            self.store
                .ensure_len(*line, end)
                .map_err(|e| NodeError::data(name, e))?;
        }
        if *minperiod > end {
            return Ok(());
        }
        let mut io = NodeIo::new(name, &mut self.store, inputs, outputs);
        compute.bulk(&mut io, *minperiod - 1, end)
    }
}

impl GraphBuilder for NodeGraph {
    fn add_node(
        &mut self,
        node: Box<dyn ComputeNode>,
        inputs: &[LineId],
    ) -> Result<NodeHandle, GraphError> {
        self.check_open("add_node")?;
        if let Some(bad) = inputs.iter().find(|l| !self.store.contains(**l)) {
            return Err(GraphError::UnknownLine(bad.index()));
        }
        let handle = self.declare(node)?;
        self.connect(handle.node, inputs)?;
        Ok(handle)
    }
}

impl std::fmt::Debug for NodeGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeGraph")
            .field("feeds", &self.feeds.len())
            .field("nodes", &self.nodes.iter().map(|n| &n.name).collect::<Vec<_>>())
            .field("lines", &self.store.len())
            .field("built", &self.built)
            .finish()
    }
}
