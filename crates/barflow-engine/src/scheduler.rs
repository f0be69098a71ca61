//! Scheduler: drives feeds, nodes, the strategy and the market simulator.
//!
//! One tick handles one timestamp:
//! 1. pick the earliest pending bar across feeds
//! 2. advance every feed whose pending bar carries that timestamp
//! 3. step the nodes clocked on those feeds, in topological order
//! 4. deliver queued notifications, then call the strategy hook
//! 5. match orders on the advanced instruments
//! 6. record cash and value
//!
//! Vectorized mode preloads every feed and bulk-computes nodes up front, then
//! runs the same ticks with nodes already filled. Both modes give the same
//! callbacks, fills and account state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use barflow_broker::{MarketSimulator, Notification};
use barflow_core::{
    Bar, Broker, ConfigError, EngineError, EngineResult, Feed, FeedId, FeedPoll, GraphError,
    LineId, SeriesGroup,
};

use crate::config::{EngineConfig, ExecutionMode};
use crate::graph::NodeGraph;
use crate::report::{EquityPoint, FeedSummary, PositionSummary, RunReport};
use crate::strategy::{FeedHandle, Setup, Strategy, StrategyContext};

/// Result of a single [`Scheduler::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A timestamp was processed
    Advanced,
    /// No feed had data; live feeds may deliver later
    Idle,
    /// The run is over
    Finished,
}

/// Cloneable flag to stop a run from elsewhere (another thread, a signal handler).
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Setup,
    Running,
    Finished,
}

struct FeedState {
    feed: Box<dyn Feed>,
    group: SeriesGroup,
    /// One-bar lookahead
    pending: Option<FeedPoll>,
    /// Vectorized mode: every bar, loaded at start
    preloaded: Vec<Bar>,
    next_index: usize,
    done: bool,
    stopped: bool,
    error: Option<String>,
    len: usize,
}

impl FeedState {
    fn stop(&mut self) {
        if !self.stopped {
            self.feed.stop();
            self.stopped = true;
        }
    }

    fn pending_timestamp(&self) -> Option<i64> {
        match self.pending {
            Some(FeedPoll::Bar(bar)) | Some(FeedPoll::Update(bar)) => Some(bar.timestamp),
            _ => None,
        }
    }
}

/// A line gating strategy readiness.
#[derive(Debug, Clone, Copy)]
struct Watch {
    line: LineId,
    minperiod: usize,
    clock: Option<FeedId>,
}

/// Runs one strategy over a set of feeds.
pub struct Scheduler {
    config: EngineConfig,
    graph: NodeGraph,
    feeds: Vec<FeedState>,
    handles: Vec<FeedHandle>,
    broker: MarketSimulator,
    stop: StopHandle,
    phase: Phase,
    strategy_name: String,
    watched_lines: Vec<LineId>,
    watches: Vec<Watch>,
    /// Per node: computed by stepping (false once bulk-filled)
    stepped: Vec<bool>,
    started: bool,
    stop_requested: bool,
    ticks: usize,
    last_timestamp: i64,
    equity: Vec<EquityPoint>,
}

impl Scheduler {
    pub fn new(config: EngineConfig) -> Self {
        let broker = MarketSimulator::new(config.broker.clone());
        Self {
            config,
            graph: NodeGraph::new(),
            feeds: Vec::new(),
            handles: Vec::new(),
            broker,
            stop: StopHandle::default(),
            phase: Phase::Setup,
            strategy_name: String::new(),
            watched_lines: Vec::new(),
            watches: Vec::new(),
            stepped: Vec::new(),
            started: false,
            stop_requested: false,
            ticks: 0,
            last_timestamp: 0,
            equity: Vec::new(),
        }
    }

    /// Register a feed. Feeds are clocks in registration order; the first is
    /// the primary clock.
    pub fn add_feed(&mut self, feed: Box<dyn Feed>) -> EngineResult<FeedHandle> {
        if self.phase != Phase::Setup {
            return Err(GraphError::Frozen("add_feed").into());
        }
        let series = self.graph.add_feed(feed.name())?;
        let handle = FeedHandle {
            id: series.id,
            name: series.name,
            lines: series.lines,
        };
        self.feeds.push(FeedState {
            feed,
            group: series.group,
            pending: None,
            preloaded: Vec::new(),
            next_index: 0,
            done: false,
            stopped: false,
            error: None,
            len: 0,
        });
        self.handles.push(handle.clone());
        Ok(handle)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn graph(&self) -> &NodeGraph {
        &self.graph
    }

    /// Wire nodes outside of a strategy's `init`.
    pub fn graph_mut(&mut self) -> &mut NodeGraph {
        &mut self.graph
    }

    pub fn broker(&self) -> &MarketSimulator {
        &self.broker
    }

    pub fn feeds(&self) -> &[FeedHandle] {
        &self.handles
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn ticks(&self) -> usize {
        self.ticks
    }

    pub fn equity(&self) -> &[EquityPoint] {
        &self.equity
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// Setup checks that must pass before any bar is touched.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.feeds.is_empty() {
            return Err(ConfigError::NoFeeds);
        }
        if self.config.mode == ExecutionMode::Vectorized {
            for state in &self.feeds {
                let feed = state.feed.name().to_string();
                if state.feed.is_live() {
                    return Err(ConfigError::ModeFeedMismatch { feed });
                }
                if state.feed.is_replay() {
                    return Err(ConfigError::ReplayRequiresEventDriven { feed });
                }
            }
        }
        Ok(())
    }

    /// Validate, let the strategy wire its nodes, build the graph and start
    /// the feeds. Called by the first [`Self::step`] if not called before.
    pub fn start(&mut self, strategy: &mut dyn Strategy) -> EngineResult<()> {
        if self.phase != Phase::Setup {
            return Err(EngineError::Internal("run already started".to_string()));
        }
        self.validate()?;
        self.strategy_name = strategy.name().to_string();

        {
            let mut setup = Setup::new(&mut self.graph, &self.handles, &mut self.watched_lines);
            strategy.init(&mut setup)?;
        }
        self.graph.build()?;

        self.watches = self
            .watched_lines
            .iter()
            .map(|line| {
                Ok(Watch {
                    line: *line,
                    minperiod: self.graph.line_minperiod(*line)?,
                    clock: self.graph.line_clock(*line)?,
                })
            })
            .collect::<Result<_, GraphError>>()?;
        self.stepped = vec![true; self.graph.node_count()];

        for state in &mut self.feeds {
            if let Err(e) = state.feed.start() {
                tracing::warn!(feed = %state.feed.name(), error = %e, "Feed failed to start, stopping it");
                state.error = Some(e.to_string());
                state.done = true;
            }
        }

        if self.config.mode == ExecutionMode::Vectorized {
            self.preload()?;
        }

        tracing::info!(
            strategy = %self.strategy_name,
            mode = %self.config.mode,
            feeds = self.feeds.len(),
            nodes = self.graph.node_count(),
            "Run started"
        );
        self.phase = Phase::Running;
        Ok(())
    }

    /// Vectorized leg: load every feed, bulk-fill nodes, home all cursors.
    fn preload(&mut self) -> EngineResult<()> {
        for (index, state) in self.feeds.iter_mut().enumerate() {
            let mut bars: Vec<Bar> = Vec::new();
            while !state.done {
                match state.feed.poll() {
                    Ok(FeedPoll::Bar(bar)) => bars.push(bar),
                    Ok(FeedPoll::Update(bar)) => match bars.last_mut() {
                        Some(last) => *last = bar,
                        None => bars.push(bar),
                    },
                    Ok(FeedPoll::Exhausted) => break,
                    Ok(FeedPoll::NotReady) => {
                        tracing::warn!(feed = %state.feed.name(), "Historical feed not ready during preload, treating as exhausted");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(feed = %state.feed.name(), error = %e, bars = bars.len(), "Feed failed, stopping it");
                        state.error = Some(e.to_string());
                        break;
                    }
                }
            }
            state.stop();

            let lines = self.handles[index].lines;
            lines.materialize(self.graph.store_mut(), &bars)?;
            tracing::debug!(feed = %state.feed.name(), bars = bars.len(), "Feed preloaded");
            state.preloaded = bars;
        }

        for id in self.graph.order().to_vec() {
            let upstream_stepped = self
                .graph
                .upstream(id)?
                .iter()
                .any(|up| self.stepped[up.index()]);
            let demote = !self.graph.supports_bulk(id)?
                || self.graph.is_multi_clock(id)?
                || upstream_stepped;
            if demote {
                tracing::debug!(node = %self.graph.node_name(id)?, "Node computed by stepping");
                continue;
            }
            let end = self
                .graph
                .node_clock(id)?
                .and_then(|clock| self.feeds.get(clock.index()))
                .map_or(0, |state| state.preloaded.len());
            self.graph.bulk_node(id, end)?;
            self.stepped[id.index()] = false;
        }

        self.graph.store_mut().home_all();
        Ok(())
    }

    /// Fill each feed's lookahead slot.
    fn fill_pending(&mut self) {
        let vectorized = self.config.mode == ExecutionMode::Vectorized;
        for state in &mut self.feeds {
            if state.done || state.pending.is_some() {
                continue;
            }
            if vectorized {
                match state.preloaded.get(state.next_index) {
                    Some(bar) => {
                        state.pending = Some(FeedPoll::Bar(*bar));
                        state.next_index += 1;
                    }
                    None => {
                        state.done = true;
                        tracing::info!(feed = %state.feed.name(), bars = state.len, "Feed exhausted");
                    }
                }
                continue;
            }
            match state.feed.poll() {
                Ok(event @ (FeedPoll::Bar(_) | FeedPoll::Update(_))) => state.pending = Some(event),
                Ok(FeedPoll::NotReady) => {}
                Ok(FeedPoll::Exhausted) => {
                    state.done = true;
                    state.stop();
                    tracing::info!(feed = %state.feed.name(), bars = state.len, "Feed exhausted");
                }
                Err(e) => {
                    tracing::warn!(feed = %state.feed.name(), error = %e, "Feed failed, stopping it");
                    state.error = Some(e.to_string());
                    state.done = true;
                    state.stop();
                }
            }
        }
    }

    /// Process one timestamp.
    pub fn step(&mut self, strategy: &mut dyn Strategy) -> EngineResult<StepOutcome> {
        match self.phase {
            Phase::Setup => self.start(strategy)?,
            Phase::Finished => return Ok(StepOutcome::Finished),
            Phase::Running => {}
        }

        if self.stop.is_stopped() || self.stop_requested {
            tracing::info!(ticks = self.ticks, "Run stopped on request");
            self.finish(strategy);
            return Ok(StepOutcome::Finished);
        }

        self.fill_pending();
        let Some(timestamp) = self.feeds.iter().filter_map(FeedState::pending_timestamp).min()
        else {
            if self.feeds.iter().all(|f| f.done) {
                self.finish(strategy);
                return Ok(StepOutcome::Finished);
            }
            return Ok(StepOutcome::Idle);
        };

        let (advanced, updated) = self.advance_feeds(timestamp)?;
        self.run_nodes(&advanced, &updated)?;
        self.ticks += 1;
        self.last_timestamp = timestamp;

        self.dispatch(strategy, timestamp)?;

        let mut touched = advanced;
        touched.extend(updated);
        self.broker.process(&touched);

        self.equity.push(EquityPoint {
            timestamp,
            cash: self.broker.get_cash(),
            value: self.broker.get_value(),
        });
        Ok(StepOutcome::Advanced)
    }

    /// Move every feed whose pending bar is at `timestamp`. Returns the feeds
    /// that opened a new bar and those that overwrote their current one.
    fn advance_feeds(&mut self, timestamp: i64) -> EngineResult<(Vec<FeedId>, Vec<FeedId>)> {
        let vectorized = self.config.mode == ExecutionMode::Vectorized;
        let mut advanced = Vec::new();
        let mut updated = Vec::new();

        for (index, state) in self.feeds.iter_mut().enumerate() {
            if state.pending_timestamp() != Some(timestamp) {
                continue;
            }
            let id = FeedId(index);
            let lines = self.handles[index].lines;
            let store = self.graph.store_mut();
            match state.pending.take() {
                Some(FeedPoll::Update(bar)) if state.len > 0 => {
                    lines.overwrite_bar(store, &bar)?;
                    self.broker.update_bar(id, &bar, state.len);
                    updated.push(id);
                }
                Some(FeedPoll::Bar(bar)) | Some(FeedPoll::Update(bar)) => {
                    if vectorized {
                        state.group.forward(store, 1)?;
                    } else {
                        lines.append_bar(store, &bar)?;
                    }
                    state.len += 1;
                    self.broker.update_bar(id, &bar, state.len);
                    advanced.push(id);
                }
                _ => {}
            }
        }
        Ok((advanced, updated))
    }

    /// Step nodes whose clock moved, in topological order.
    fn run_nodes(&mut self, advanced: &[FeedId], updated: &[FeedId]) -> EngineResult<()> {
        for id in self.graph.order().to_vec() {
            let Some(clock) = self.graph.node_clock(id)? else {
                continue;
            };
            let clock_len = self.feeds[clock.index()].len;
            if advanced.contains(&clock) {
                self.graph.advance_outputs(id)?;
                if self.stepped[id.index()] {
                    self.graph.step_node(id, clock_len)?;
                }
            } else if updated.contains(&clock) && self.stepped[id.index()] {
                self.graph.step_node(id, clock_len)?;
            }
        }
        Ok(())
    }

    /// Every feed delivered a bar and every watched line reached its minperiod.
    /// Feeds that ended without delivering anything are ignored.
    fn is_ready(&self) -> bool {
        let feeds_ready = self.feeds.iter().all(|f| f.len > 0 || f.done);
        feeds_ready
            && self.watches.iter().all(|w| {
                let len = match w.clock {
                    Some(clock) => self.feeds[clock.index()].len,
                    None => self.graph.store().line_len(w.line),
                };
                len >= w.minperiod
            })
    }

    fn deliver_notifications(&mut self, strategy: &mut dyn Strategy) {
        for note in self.broker.drain_notifications() {
            match note {
                Notification::Order(order) => strategy.notify_order(&order),
                Notification::Trade(trade) => strategy.notify_trade(&trade),
            }
        }
    }

    fn dispatch(&mut self, strategy: &mut dyn Strategy, timestamp: i64) -> EngineResult<()> {
        self.deliver_notifications(strategy);
        strategy.notify_cash_value(self.broker.get_cash(), self.broker.get_value());

        let ready = self.is_ready();
        let first = ready && !self.started;
        if ready {
            self.started = true;
        }

        let mut ctx = StrategyContext::new(
            self.graph.store(),
            &self.handles,
            &mut self.broker,
            &self.config.sizing,
            timestamp,
            &mut self.stop_requested,
        );
        if first {
            strategy.nextstart(&mut ctx)
        } else if ready {
            strategy.next(&mut ctx)
        } else {
            strategy.prenext(&mut ctx)
        }
    }

    /// Stop feeds, flush notifications and call the strategy's `stop`.
    pub fn finish(&mut self, strategy: &mut dyn Strategy) {
        if self.phase == Phase::Finished {
            return;
        }
        for state in &mut self.feeds {
            state.stop();
            state.done = true;
        }
        self.deliver_notifications(strategy);
        let mut ctx = StrategyContext::new(
            self.graph.store(),
            &self.handles,
            &mut self.broker,
            &self.config.sizing,
            self.last_timestamp,
            &mut self.stop_requested,
        );
        strategy.stop(&mut ctx);
        self.phase = Phase::Finished;

        tracing::info!(
            strategy = %self.strategy_name,
            ticks = self.ticks,
            cash = %self.broker.get_cash(),
            value = %self.broker.get_value(),
            "Run finished"
        );
    }

    /// Run to completion.
    pub fn run(&mut self, strategy: &mut dyn Strategy) -> EngineResult<RunReport> {
        loop {
            match self.step(strategy)? {
                StepOutcome::Advanced => {}
                StepOutcome::Idle => std::thread::sleep(self.config.idle_backoff()),
                StepOutcome::Finished => break,
            }
        }
        Ok(self.report())
    }

    /// Snapshot of the run so far.
    pub fn report(&self) -> RunReport {
        let feeds = self
            .feeds
            .iter()
            .map(|f| FeedSummary {
                name: f.feed.name().to_string(),
                bars: f.len,
                error: f.error.clone(),
            })
            .collect();
        let positions = self
            .broker
            .positions()
            .iter()
            .map(|(id, p)| PositionSummary {
                feed: self
                    .handles
                    .get(id.index())
                    .map_or_else(|| id.to_string(), |h| h.name.clone()),
                size: p.size,
                price: p.price,
            })
            .collect();

        RunReport {
            strategy: self.strategy_name.clone(),
            mode: self.config.mode,
            ticks: self.ticks,
            feeds,
            initial_cash: self.config.broker.initial_cash,
            final_cash: self.broker.get_cash(),
            final_value: self.broker.get_value(),
            positions,
            orders: self.broker.orders().to_vec(),
            trades: self.broker.trades().to_vec(),
            equity: self.equity.clone(),
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("mode", &self.config.mode)
            .field("phase", &self.phase)
            .field("feeds", &self.handles)
            .field("ticks", &self.ticks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use barflow_core::Timeframe;
    use barflow_data::MemoryFeed;

    struct Idle;

    impl Strategy for Idle {
        fn name(&self) -> &str {
            "idle"
        }

        fn init(&mut self, _setup: &mut Setup<'_>) -> EngineResult<()> {
            Ok(())
        }

        fn next(&mut self, _ctx: &mut StrategyContext<'_>) -> EngineResult<()> {
            Ok(())
        }
    }

    fn bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| Bar::new(i as i64 * 1000, 10.0, 11.0, 9.0, 10.5, 100.0))
            .collect()
    }

    #[test]
    fn test_stop_handle_is_shared() {
        let handle = StopHandle::default();
        let clone = handle.clone();
        assert!(!handle.is_stopped());
        clone.stop();
        assert!(handle.is_stopped());
    }

    #[test]
    fn test_equity_recorded_per_tick() {
        let mut scheduler = Scheduler::new(EngineConfig::event_driven());
        scheduler
            .add_feed(Box::new(MemoryFeed::new("m", Timeframe::seconds(1), bars(4))))
            .unwrap();
        let report = scheduler.run(&mut Idle).unwrap();
        assert_eq!(report.ticks, 4);
        assert_eq!(scheduler.equity().len(), 4);
        assert_eq!(scheduler.equity()[3].timestamp, 3000);
        assert_eq!(report.final_value, report.initial_cash);
    }

    #[test]
    fn test_empty_feed_finishes_without_ticks() {
        let mut scheduler = Scheduler::new(EngineConfig::vectorized());
        scheduler
            .add_feed(Box::new(MemoryFeed::new("m", Timeframe::seconds(1), Vec::new())))
            .unwrap();
        let report = scheduler.run(&mut Idle).unwrap();
        assert_eq!(report.ticks, 0);
        assert!(scheduler.is_finished());
    }

    #[test]
    fn test_start_twice_fails() {
        let mut scheduler = Scheduler::new(EngineConfig::vectorized());
        scheduler
            .add_feed(Box::new(MemoryFeed::new("m", Timeframe::seconds(1), bars(2))))
            .unwrap();
        scheduler.start(&mut Idle).unwrap();
        assert!(matches!(
            scheduler.start(&mut Idle),
            Err(EngineError::Internal(_))
        ));
    }
}
