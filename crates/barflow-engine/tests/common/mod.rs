//! Shared fixtures for engine integration tests.
#![allow(dead_code)]

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use barflow_broker::{BrokerConfig, CommissionInfo, SlippageConfig};
use barflow_core::{
    Bar, EngineResult, FeedId, LineId, Order, OrderId, OrderRequest, Side, Timeframe, Trade,
};
use barflow_data::MemoryFeed;
use barflow_engine::{
    EngineConfig, RunReport, Scheduler, Setup, SizingMethod, Strategy, StrategyContext,
};
use barflow_indicators::Sma;

pub const DAY: i64 = 86_400_000;
pub const MINUTE: i64 = 60_000;

/// Daily bars with the given closes; open sits half a point below the close.
pub fn daily_bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Bar::new(i as i64 * DAY, c - 0.5, c + 1.0, c - 1.0, c, 1000.0))
        .collect()
}

/// A wavy price path long enough for several crossings.
pub fn wave(n: usize) -> Vec<Bar> {
    (0..n)
        .map(|i| {
            let x = i as f64;
            let close = 100.0 + 10.0 * (x * 0.3).sin() + x * 0.1;
            let open = close - 0.5 * (x * 0.7).cos();
            let high = open.max(close) + 1.0;
            let low = open.min(close) - 1.0;
            Bar::new(i as i64 * DAY, open, high, low, close, 1000.0 + x)
        })
        .collect()
}

pub fn memory_feed(name: &str, bars: Vec<Bar>) -> Box<MemoryFeed> {
    Box::new(MemoryFeed::new(name, Timeframe::days(1), bars))
}

/// Vectorized and event-driven configs sharing one broker with costs.
pub fn mode_configs() -> (EngineConfig, EngineConfig) {
    let broker = BrokerConfig::default()
        .with_cash(dec!(10000))
        .with_commission(CommissionInfo::percent(dec!(0.001)))
        .with_slippage(SlippageConfig::percent(dec!(0.0005)));
    let sizing = SizingMethod::PercentValue { percent: dec!(50) };
    (
        EngineConfig::vectorized()
            .with_broker(broker.clone())
            .with_sizing(sizing.clone()),
        EngineConfig::event_driven()
            .with_broker(broker)
            .with_sizing(sizing),
    )
}

/// Every execution of every order, as text.
pub fn fills(report: &RunReport) -> Vec<String> {
    report
        .orders
        .iter()
        .flat_map(|o| {
            o.executions
                .iter()
                .map(move |e| format!("{} {} {} @ {} bar {}", o.id, o.status, e.size, e.price, e.bar))
        })
        .collect()
}

pub fn assert_same_run(a: &RunReport, b: &RunReport) {
    assert_eq!(a.ticks, b.ticks);
    assert_eq!(a.final_cash, b.final_cash);
    assert_eq!(a.final_value, b.final_value);
    assert_eq!(fills(a), fills(b));
    assert_eq!(a.trades.len(), b.trades.len());
    assert_eq!(a.equity, b.equity);
}

/// Run `strategy` over `feeds` under `config`.
pub fn run_with(
    config: EngineConfig,
    feeds: Vec<Box<MemoryFeed>>,
    strategy: &mut dyn Strategy,
) -> EngineResult<RunReport> {
    let mut scheduler = Scheduler::new(config);
    for feed in feeds {
        scheduler.add_feed(feed)?;
    }
    scheduler.run(strategy)
}

/// Logs every callback; optionally trades an SMA filter on feed 0.
#[derive(Debug, Default)]
pub struct Recorder {
    pub period: usize,
    pub trade: bool,
    pub sma: Option<LineId>,
    pub log: Vec<String>,
}

impl Recorder {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            ..Default::default()
        }
    }

    pub fn trading(period: usize) -> Self {
        Self {
            period,
            trade: true,
            ..Default::default()
        }
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.log.iter().filter(|l| l.starts_with(prefix)).count()
    }
}

impl Strategy for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn init(&mut self, setup: &mut Setup<'_>) -> EngineResult<()> {
        let close = setup.feed(0)?.lines.close;
        self.sma = Some(Sma::attach(setup, close, self.period)?.line);
        Ok(())
    }

    fn prenext(&mut self, ctx: &mut StrategyContext<'_>) -> EngineResult<()> {
        let feed = ctx.feeds()[0].id;
        self.log.push(format!("prenext len={}", ctx.len(feed)));
        Ok(())
    }

    fn nextstart(&mut self, ctx: &mut StrategyContext<'_>) -> EngineResult<()> {
        self.log.push("nextstart".to_string());
        self.next(ctx)
    }

    fn next(&mut self, ctx: &mut StrategyContext<'_>) -> EngineResult<()> {
        let feed = ctx.feeds()[0].id;
        let close = ctx.price(feed)?;
        let sma = match self.sma {
            Some(line) => ctx.read(line, 0)?,
            None => f64::NAN,
        };
        self.log.push(format!(
            "next len={} close={:.6} sma={:.6}",
            ctx.len(feed),
            close,
            sma
        ));

        if self.trade && ctx.open_orders().is_empty() {
            let position = ctx.position(feed);
            if position.is_flat() && close > sma {
                let size = ctx.sized(feed);
                ctx.buy(feed, size);
            } else if position.is_long() && close < sma {
                ctx.close_position(feed);
            }
        }
        Ok(())
    }

    fn notify_order(&mut self, order: &Order) {
        self.log.push(format!(
            "order {} {} filled={} avg={}",
            order.id, order.status, order.filled, order.avg_price
        ));
    }

    fn notify_trade(&mut self, trade: &Trade) {
        self.log.push(format!(
            "trade {} {:?} size={} pnl={}",
            trade.id, trade.status, trade.size, trade.pnl
        ));
    }

    fn notify_cash_value(&mut self, cash: Decimal, value: Decimal) {
        self.log.push(format!("cash={} value={}", cash, value));
    }

    fn stop(&mut self, _ctx: &mut StrategyContext<'_>) {
        self.log.push("stop".to_string());
    }
}

/// Submits scripted orders at given bar numbers of feed 0 and records bars.
#[derive(Debug, Default)]
pub struct Script {
    pub orders: Vec<(usize, OrderRequest)>,
    pub stop_at: Option<usize>,
    /// (len of feed 0, bar of feed 0) per hook
    pub seen: Vec<(usize, Bar)>,
    /// Bar count of every feed per hook
    pub lens: Vec<Vec<usize>>,
    /// Close of every feed per hook
    pub closes: Vec<Vec<f64>>,
    pub submitted: Vec<OrderId>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, bar: usize, side: Side, size: Decimal) -> Self {
        self.orders
            .push((bar, OrderRequest::market(FeedId(0), side, size)));
        self
    }

    pub fn request_at(mut self, bar: usize, request: OrderRequest) -> Self {
        self.orders.push((bar, request));
        self
    }

    pub fn stop_at(mut self, bar: usize) -> Self {
        self.stop_at = Some(bar);
        self
    }
}

impl Strategy for Script {
    fn name(&self) -> &str {
        "script"
    }

    fn init(&mut self, _setup: &mut Setup<'_>) -> EngineResult<()> {
        Ok(())
    }

    fn next(&mut self, ctx: &mut StrategyContext<'_>) -> EngineResult<()> {
        let feed = FeedId(0);
        let len = ctx.len(feed);
        self.seen.push((len, ctx.bar(feed, 0)?));
        let lens = ctx.feeds().iter().map(|f| ctx.len(f.id)).collect();
        self.lens.push(lens);
        let closes = ctx
            .feeds()
            .iter()
            .map(|f| ctx.price(f.id))
            .collect::<EngineResult<Vec<_>>>()?;
        self.closes.push(closes);

        let due: Vec<OrderRequest> = self
            .orders
            .iter()
            .filter(|(bar, _)| *bar == len)
            .map(|(_, request)| request.clone())
            .collect();
        for request in due {
            let id = ctx.submit(request);
            self.submitted.push(id);
        }
        if self.stop_at == Some(len) {
            ctx.stop_run();
        }
        Ok(())
    }
}
