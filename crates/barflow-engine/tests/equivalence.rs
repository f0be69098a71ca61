//! Vectorized and event-driven runs must agree on every callback, fill and
//! account figure.

mod common;

use rust_decimal_macros::dec;

use barflow_core::{
    ComputeNode, EngineResult, GraphBuilder, LineId, NodeError, NodeIo, Order, Trade,
};
use barflow_engine::{Setup, Strategy, StrategyContext};
use barflow_indicators::{BollingerBands, CrossOver, Delay, Highest, Sma};

use common::{assert_same_run, memory_feed, mode_configs as configs, run_with, wave, Recorder};

#[test]
fn test_sma_filter_matches_across_modes() {
    let (vectorized, event_driven) = configs();

    let mut a = Recorder::trading(10);
    let report_a = run_with(vectorized, vec![memory_feed("wave", wave(150))], &mut a).unwrap();
    let mut b = Recorder::trading(10);
    let report_b = run_with(event_driven, vec![memory_feed("wave", wave(150))], &mut b).unwrap();

    assert!(report_a.orders.len() > 4, "the path should trade a few times");
    assert_eq!(a.log, b.log);
    assert_same_run(&report_a, &report_b);
}

/// Mixes bulk nodes, an alias node and multi-clock nodes over two feeds.
#[derive(Default)]
struct Pair {
    lines: Vec<LineId>,
    log: Vec<String>,
}

impl Strategy for Pair {
    fn name(&self) -> &str {
        "pair"
    }

    fn init(&mut self, setup: &mut Setup<'_>) -> EngineResult<()> {
        let a = setup.feed(0)?.lines;
        let b = setup.feed(1)?.lines;

        let sma = Sma::attach(setup, a.close, 5)?;
        let bands = BollingerBands::attach(setup, a.close, 8, 2.0)?;
        let high = Highest::attach(setup, a.high, 6)?;
        let lagged = Delay::attach(setup, sma.line, 2)?;
        // inputs on two clocks: stepped in both modes, as is what hangs off it
        let cross = CrossOver::attach(setup, a.close, b.close)?;
        let smoothed = Sma::attach(setup, cross.line, 3)?;

        self.lines = vec![
            sma.line,
            bands.top,
            bands.bot,
            high.line,
            lagged.line,
            cross.line,
            smoothed.line,
        ];
        Ok(())
    }

    fn prenext(&mut self, ctx: &mut StrategyContext<'_>) -> EngineResult<()> {
        self.log.push(format!("prenext {}", ctx.timestamp()));
        Ok(())
    }

    fn next(&mut self, ctx: &mut StrategyContext<'_>) -> EngineResult<()> {
        let values = self
            .lines
            .iter()
            .map(|line| ctx.read(*line, 0).map(|v| format!("{:.10}", v)))
            .collect::<EngineResult<Vec<_>>>()?;
        self.log
            .push(format!("next {} {}", ctx.timestamp(), values.join(" ")));

        let a = ctx.feeds()[0].id;
        let cross = ctx.read(self.lines[5], 0)?;
        if cross > 0.0 && ctx.position(a).is_flat() {
            ctx.buy(a, dec!(5));
        } else if cross < 0.0 && ctx.position(a).is_long() {
            ctx.close_position(a);
        }
        Ok(())
    }

    fn notify_order(&mut self, order: &Order) {
        self.log.push(format!("order {} {}", order.id, order.status));
    }

    fn notify_trade(&mut self, trade: &Trade) {
        self.log.push(format!("trade {} {}", trade.id, trade.pnlcomm));
    }
}

#[test]
fn test_multi_clock_graph_matches_across_modes() {
    let a_bars = wave(120);
    let b_bars: Vec<_> = wave(90)
        .into_iter()
        .map(|mut bar| {
            bar.open += 0.7;
            bar.high += 0.7;
            bar.low += 0.7;
            bar.close += 0.7;
            bar
        })
        .collect();
    let (vectorized, event_driven) = configs();

    let mut a = Pair::default();
    let report_a = run_with(
        vectorized,
        vec![memory_feed("a", a_bars.clone()), memory_feed("b", b_bars.clone())],
        &mut a,
    )
    .unwrap();
    let mut b = Pair::default();
    let report_b = run_with(
        event_driven,
        vec![memory_feed("a", a_bars), memory_feed("b", b_bars)],
        &mut b,
    )
    .unwrap();

    assert_eq!(report_a.ticks, 120);
    assert_eq!(a.log, b.log);
    assert_same_run(&report_a, &report_b);
}

/// Tries to read the next bar of its input.
struct PeekAhead;

impl ComputeNode for PeekAhead {
    fn name(&self) -> &str {
        "peek_ahead"
    }

    fn outputs(&self) -> &[&'static str] {
        &["peek"]
    }

    fn next(&mut self, io: &mut NodeIo<'_>) -> Result<(), NodeError> {
        let value = io.input(0, 1).unwrap_or(f64::NAN);
        io.set_output(0, value)
    }
}

#[derive(Default)]
struct LookAhead {
    line: Option<LineId>,
    log: Vec<String>,
}

impl Strategy for LookAhead {
    fn name(&self) -> &str {
        "look_ahead"
    }

    fn init(&mut self, setup: &mut Setup<'_>) -> EngineResult<()> {
        let close = setup.feed(0)?.lines.close;
        let handle = setup.add_node(Box::new(PeekAhead), &[close])?;
        self.line = Some(handle.output(0)?);
        Ok(())
    }

    fn next(&mut self, ctx: &mut StrategyContext<'_>) -> EngineResult<()> {
        if let Some(line) = self.line {
            self.log.push(format!("{:.4}", ctx.read(line, 0)?));
        }
        Ok(())
    }
}

#[test]
fn test_stepped_node_cannot_see_preloaded_future() {
    let (vectorized, event_driven) = configs();

    let mut a = LookAhead::default();
    run_with(vectorized, vec![memory_feed("wave", wave(5))], &mut a).unwrap();
    let mut b = LookAhead::default();
    run_with(event_driven, vec![memory_feed("wave", wave(5))], &mut b).unwrap();

    assert_eq!(a.log.len(), 5);
    assert_eq!(a.log, b.log);
    assert!(a.log.iter().all(|v| v == "NaN"));
}
