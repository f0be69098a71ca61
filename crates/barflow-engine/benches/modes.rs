//! Vectorized vs event-driven runs of the same strategy.

use barflow_core::{Bar, EngineResult, LineId, Timeframe};
use barflow_data::MemoryFeed;
use barflow_engine::{EngineConfig, Scheduler, Setup, Strategy, StrategyContext};
use barflow_indicators::{BollingerBands, Ema, Sma};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn generate_bars(size: usize) -> Vec<Bar> {
    (0..size)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.1).sin() * 10.0;
            Bar::new(i as i64 * 60_000, close, close + 1.0, close - 1.0, close, 1000.0)
        })
        .collect()
}

struct Filter {
    fast: Option<LineId>,
    slow: Option<LineId>,
}

impl Strategy for Filter {
    fn name(&self) -> &str {
        "bench"
    }

    fn init(&mut self, setup: &mut Setup<'_>) -> EngineResult<()> {
        let close = setup.feed(0)?.lines.close;
        self.fast = Some(Ema::attach(setup, close, 12)?.line);
        self.slow = Some(Sma::attach(setup, close, 50)?.line);
        BollingerBands::attach(setup, close, 20, 2.0)?;
        Ok(())
    }

    fn next(&mut self, ctx: &mut StrategyContext<'_>) -> EngineResult<()> {
        let (Some(fast), Some(slow)) = (self.fast, self.slow) else {
            return Ok(());
        };
        let feed = ctx.feeds()[0].id;
        let position = ctx.position(feed);
        if ctx.read(fast, 0)? > ctx.read(slow, 0)? && position.is_flat() {
            let size = ctx.sized(feed);
            ctx.buy(feed, size);
        } else if ctx.read(fast, 0)? < ctx.read(slow, 0)? && position.is_long() {
            ctx.close_position(feed);
        }
        Ok(())
    }
}

fn run(config: EngineConfig, bars: &[Bar]) -> usize {
    let mut scheduler = Scheduler::new(config);
    let feed = MemoryFeed::new("bench", Timeframe::minutes(1), bars.to_vec());
    if scheduler.add_feed(Box::new(feed)).is_err() {
        return 0;
    }
    let mut strategy = Filter {
        fast: None,
        slow: None,
    };
    scheduler.run(&mut strategy).map_or(0, |r| r.ticks)
}

fn benchmark_modes(c: &mut Criterion) {
    let mut group = c.benchmark_group("run");

    for size in [1000, 10000].iter() {
        let bars = generate_bars(*size);

        group.bench_with_input(BenchmarkId::new("vectorized", size), &bars, |b, bars| {
            b.iter(|| run(EngineConfig::vectorized(), black_box(bars)))
        });
        group.bench_with_input(BenchmarkId::new("event_driven", size), &bars, |b, bars| {
            b.iter(|| run(EngineConfig::event_driven(), black_box(bars)))
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_modes);
criterion_main!(benches);
