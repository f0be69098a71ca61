//! Strategy trait and the views handed to it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use barflow_broker::MarketSimulator;
use barflow_core::{
    to_decimal, Bar, BarLines, BracketOrders, Broker, ComputeNode, EngineError, EngineResult,
    FeedId, GraphBuilder, GraphError, LineId, LineStore, NodeHandle, NodeId, Order, OrderId,
    OrderRequest, Position, Side, Trade,
};

use crate::graph::NodeGraph;
use crate::sizer::SizingMethod;

/// A feed as seen by strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedHandle {
    pub id: FeedId,
    pub name: String,
    pub lines: BarLines,
}

/// Trading logic driven by the scheduler.
///
/// Per tick the scheduler calls `prenext` until every watched line has
/// reached its minperiod, `nextstart` exactly once when that happens and
/// `next` afterwards. Notifications queued since the previous hook are
/// delivered right before it.
pub trait Strategy {
    /// Get the strategy name.
    fn name(&self) -> &str;

    /// Wire nodes and choose the lines that gate readiness.
    fn init(&mut self, setup: &mut Setup<'_>) -> EngineResult<()>;

    /// Called while some watched line is still warming up.
    fn prenext(&mut self, _ctx: &mut StrategyContext<'_>) -> EngineResult<()> {
        Ok(())
    }

    /// Called on the first ready tick.
    fn nextstart(&mut self, ctx: &mut StrategyContext<'_>) -> EngineResult<()> {
        self.next(ctx)
    }

    /// Called on every ready tick after the first.
    fn next(&mut self, ctx: &mut StrategyContext<'_>) -> EngineResult<()>;

    fn notify_order(&mut self, _order: &Order) {}

    fn notify_trade(&mut self, _trade: &Trade) {}

    fn notify_cash_value(&mut self, _cash: Decimal, _value: Decimal) {}

    /// Called once when the run ends.
    fn stop(&mut self, _ctx: &mut StrategyContext<'_>) {}
}

/// Graph access during [`Strategy::init`].
///
/// Every node added through it is watched: the strategy is not ready before
/// the node's minperiod is reached.
pub struct Setup<'a> {
    graph: &'a mut NodeGraph,
    feeds: &'a [FeedHandle],
    watched: &'a mut Vec<LineId>,
}

impl<'a> Setup<'a> {
    pub(crate) fn new(
        graph: &'a mut NodeGraph,
        feeds: &'a [FeedHandle],
        watched: &'a mut Vec<LineId>,
    ) -> Self {
        Self {
            graph,
            feeds,
            watched,
        }
    }

    pub fn feeds(&self) -> &[FeedHandle] {
        self.feeds
    }

    /// Feed by position of registration.
    pub fn feed(&self, index: usize) -> EngineResult<&FeedHandle> {
        self.feeds
            .get(index)
            .ok_or_else(|| EngineError::Strategy(format!("no feed #{}", index)))
    }

    /// Feed by name.
    pub fn feed_named(&self, name: &str) -> EngineResult<&FeedHandle> {
        self.feeds
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| EngineError::Strategy(format!("no feed named '{}'", name)))
    }

    /// Gate readiness on `line` as well.
    pub fn watch(&mut self, line: LineId) {
        if !self.watched.contains(&line) {
            self.watched.push(line);
        }
    }

    /// Declare a node whose inputs are connected later with [`Self::connect`].
    pub fn declare(&mut self, node: Box<dyn ComputeNode>) -> Result<NodeHandle, GraphError> {
        let handle = self.graph.declare(node)?;
        for line in &handle.outputs {
            self.watch(*line);
        }
        Ok(handle)
    }

    pub fn connect(&mut self, node: NodeId, inputs: &[LineId]) -> Result<(), GraphError> {
        self.graph.connect(node, inputs)
    }
}

impl GraphBuilder for Setup<'_> {
    fn add_node(
        &mut self,
        node: Box<dyn ComputeNode>,
        inputs: &[LineId],
    ) -> Result<NodeHandle, GraphError> {
        let handle = self.graph.add_node(node, inputs)?;
        for line in &handle.outputs {
            self.watch(*line);
        }
        Ok(handle)
    }
}

/// Everything a strategy may look at or do during a hook.
pub struct StrategyContext<'a> {
    store: &'a LineStore,
    feeds: &'a [FeedHandle],
    broker: &'a mut MarketSimulator,
    sizing: &'a SizingMethod,
    timestamp: i64,
    stop_requested: &'a mut bool,
}

impl<'a> StrategyContext<'a> {
    pub(crate) fn new(
        store: &'a LineStore,
        feeds: &'a [FeedHandle],
        broker: &'a mut MarketSimulator,
        sizing: &'a SizingMethod,
        timestamp: i64,
        stop_requested: &'a mut bool,
    ) -> Self {
        Self {
            store,
            feeds,
            broker,
            sizing,
            timestamp,
            stop_requested,
        }
    }

    /// Timestamp (ms) of the current tick.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }

    pub fn feeds(&self) -> &[FeedHandle] {
        self.feeds
    }

    fn feed(&self, feed: FeedId) -> EngineResult<&FeedHandle> {
        self.feeds
            .get(feed.index())
            .ok_or_else(|| EngineError::Strategy(format!("unknown {}", feed)))
    }

    /// Value of `line`, `ago` bars back (0 is the current bar).
    pub fn read(&self, line: LineId, ago: usize) -> EngineResult<f64> {
        Ok(self.store.read(line, -(ago as isize))?)
    }

    /// Bars delivered by `feed` so far.
    pub fn len(&self, feed: FeedId) -> usize {
        self.feed(feed)
            .map(|f| self.store.line_len(f.lines.close))
            .unwrap_or(0)
    }

    /// Bar of `feed`, `ago` bars back.
    pub fn bar(&self, feed: FeedId, ago: usize) -> EngineResult<Bar> {
        let handle = self.feed(feed)?;
        Ok(handle.lines.read_bar(self.store, -(ago as isize))?)
    }

    /// Current close of `feed`.
    pub fn price(&self, feed: FeedId) -> EngineResult<f64> {
        let handle = self.feed(feed)?;
        self.read(handle.lines.close, 0)
    }

    pub fn cash(&self) -> Decimal {
        self.broker.get_cash()
    }

    pub fn value(&self) -> Decimal {
        self.broker.get_value()
    }

    pub fn position(&self, feed: FeedId) -> Position {
        self.broker.get_position(feed)
    }

    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.broker.get_order(id)
    }

    pub fn open_orders(&self) -> Vec<&Order> {
        self.broker.open_orders()
    }

    /// Size from the configured sizing method at the current close.
    pub fn sized(&self, feed: FeedId) -> Decimal {
        let price = self.price(feed).map(to_decimal).unwrap_or_default();
        self.sizing.size(self.cash(), self.value(), price)
    }

    pub fn submit(&mut self, request: OrderRequest) -> OrderId {
        self.broker.submit(request)
    }

    /// Market buy.
    pub fn buy(&mut self, feed: FeedId, size: Decimal) -> OrderId {
        self.submit(OrderRequest::market(feed, Side::Buy, size))
    }

    /// Market sell.
    pub fn sell(&mut self, feed: FeedId, size: Decimal) -> OrderId {
        self.submit(OrderRequest::market(feed, Side::Sell, size))
    }

    /// Market order flattening the position in `feed`.
    pub fn close_position(&mut self, feed: FeedId) -> Option<OrderId> {
        self.broker.order_target_size(feed, Decimal::ZERO)
    }

    pub fn order_target_size(&mut self, feed: FeedId, target: Decimal) -> Option<OrderId> {
        self.broker.order_target_size(feed, target)
    }

    pub fn bracket(
        &mut self,
        parent: OrderRequest,
        stop_price: Decimal,
        limit_price: Decimal,
    ) -> BracketOrders {
        self.broker.submit_bracket(parent, stop_price, limit_price)
    }

    pub fn cancel(&mut self, id: OrderId) -> bool {
        self.broker.cancel(id)
    }

    /// End the run after this tick.
    pub fn stop_run(&mut self) {
        *self.stop_requested = true;
    }
}
