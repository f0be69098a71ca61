//! Timeframe transformation: resampling and replay.
//!
//! Raw bars are merged into synthetic bars of a coarser timeframe. Resampling
//! emits each synthetic bar once its boundary closes. Replay re-delivers the
//! bar in progress after every raw update and opens a new slot at each
//! boundary, which needs event-driven scheduling.

use serde::{Deserialize, Serialize};

use barflow_core::{Bar, DataError, Feed, FeedPoll, TimeUnit, Timeframe};

/// When a synthetic bar is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryRule {
    /// Bucket of the timeframe: closes when a raw bar from a later bucket
    /// arrives, or the source ends
    Time(Timeframe),
    /// Closes once this many raw bars were merged
    Count(usize),
}

/// Resample emits closed bars; replay updates the open bar in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformMode {
    #[default]
    Resample,
    Replay,
}

/// Merge `raw` into a bar in progress: first open, extreme high and low,
/// last close, summed volume, last open interest, last timestamp.
fn merge(acc: &mut Bar, raw: &Bar) {
    acc.high = acc.high.max(raw.high);
    acc.low = acc.low.min(raw.low);
    acc.close = raw.close;
    acc.volume += raw.volume;
    acc.open_interest = raw.open_interest;
    acc.timestamp = raw.timestamp;
}

/// Stateful bucket accumulator.
#[derive(Debug, Clone)]
pub struct TimeframeTransformer {
    rule: BoundaryRule,
    mode: TransformMode,
    current: Option<Bar>,
    bucket: Option<i64>,
    count: usize,
}

impl TimeframeTransformer {
    pub fn new(rule: BoundaryRule, mode: TransformMode) -> Result<Self, DataError> {
        match rule {
            BoundaryRule::Count(0) => {
                return Err(DataError::ParseError(
                    "count boundary must be at least 1".to_string(),
                ))
            }
            BoundaryRule::Time(tf) if tf.unit == TimeUnit::Tick => {
                return Err(DataError::ParseError(
                    "tick timeframes need a count boundary".to_string(),
                ))
            }
            _ => {}
        }
        Ok(Self {
            rule,
            mode,
            current: None,
            bucket: None,
            count: 0,
        })
    }

    pub fn resample(rule: BoundaryRule) -> Result<Self, DataError> {
        Self::new(rule, TransformMode::Resample)
    }

    pub fn replay(rule: BoundaryRule) -> Result<Self, DataError> {
        Self::new(rule, TransformMode::Replay)
    }

    pub fn mode(&self) -> TransformMode {
        self.mode
    }

    pub fn rule(&self) -> BoundaryRule {
        self.rule
    }

    /// The synthetic bar in progress.
    pub fn current(&self) -> Option<&Bar> {
        self.current.as_ref()
    }

    fn bucket_of(&self, raw: &Bar) -> Option<i64> {
        match self.rule {
            BoundaryRule::Time(tf) => tf.bucket(raw.timestamp),
            BoundaryRule::Count(_) => None,
        }
    }

    /// Whether `raw` starts a new synthetic bar.
    fn opens_new(&self, raw: &Bar) -> bool {
        if self.current.is_none() {
            return true;
        }
        match self.rule {
            BoundaryRule::Time(_) => self.bucket_of(raw) != self.bucket,
            BoundaryRule::Count(n) => self.count >= n,
        }
    }

    fn start(&mut self, raw: &Bar) {
        self.current = Some(*raw);
        self.bucket = self.bucket_of(raw);
        self.count = 1;
    }

    /// Consume one raw bar. Returns the event to deliver, if any.
    pub fn push(&mut self, raw: &Bar) -> Option<FeedPoll> {
        match self.mode {
            TransformMode::Resample => self.push_resample(raw),
            TransformMode::Replay => Some(self.push_replay(raw)),
        }
    }

    fn push_resample(&mut self, raw: &Bar) -> Option<FeedPoll> {
        let mut emitted = None;
        if self.opens_new(raw) {
            emitted = self.current.take();
            self.start(raw);
        } else if let Some(acc) = self.current.as_mut() {
            merge(acc, raw);
            self.count += 1;
        }

        if let BoundaryRule::Count(n) = self.rule {
            if self.count >= n {
                // n-th raw bar closes the bucket right away
                debug_assert!(emitted.is_none());
                emitted = self.current.take();
                self.count = 0;
            }
        }
        emitted.map(FeedPoll::Bar)
    }

    fn push_replay(&mut self, raw: &Bar) -> FeedPoll {
        if self.opens_new(raw) {
            self.start(raw);
            return FeedPoll::Bar(*raw);
        }
        match self.current.as_mut() {
            Some(acc) => {
                merge(acc, raw);
                self.count += 1;
                FeedPoll::Update(*acc)
            }
            None => {
                self.start(raw);
                FeedPoll::Bar(*raw)
            }
        }
    }

    /// Close the bar in progress at the end of the source (resample only).
    pub fn flush(&mut self) -> Option<Bar> {
        self.count = 0;
        self.bucket = None;
        match self.mode {
            TransformMode::Resample => self.current.take(),
            TransformMode::Replay => {
                self.current = None;
                None
            }
        }
    }
}

/// Feed adapter applying a [`TimeframeTransformer`] to another feed.
pub struct TransformedFeed {
    name: String,
    source: Box<dyn Feed>,
    transformer: TimeframeTransformer,
    timeframe: Timeframe,
    finished: bool,
}

impl TransformedFeed {
    pub fn new(source: Box<dyn Feed>, transformer: TimeframeTransformer) -> Self {
        let timeframe = match transformer.rule() {
            BoundaryRule::Time(tf) => tf,
            BoundaryRule::Count(n) => {
                let base = source.timeframe();
                let n = u32::try_from(n).unwrap_or(u32::MAX);
                Timeframe::new(base.unit, base.compression.saturating_mul(n))
            }
        };
        Self {
            name: source.name().to_string(),
            source,
            transformer,
            timeframe,
            finished: false,
        }
    }

    /// Resample `source` by `rule`.
    pub fn resample(source: Box<dyn Feed>, rule: BoundaryRule) -> Result<Self, DataError> {
        Ok(Self::new(source, TimeframeTransformer::resample(rule)?))
    }

    /// Replay `source` by `rule`.
    pub fn replay(source: Box<dyn Feed>, rule: BoundaryRule) -> Result<Self, DataError> {
        Ok(Self::new(source, TimeframeTransformer::replay(rule)?))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Feed for TransformedFeed {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    fn is_live(&self) -> bool {
        self.source.is_live()
    }

    fn is_replay(&self) -> bool {
        self.transformer.mode() == TransformMode::Replay
    }

    fn start(&mut self) -> Result<(), DataError> {
        self.source.start()
    }

    fn poll(&mut self) -> Result<FeedPoll, DataError> {
        if self.finished {
            return Ok(FeedPoll::Exhausted);
        }
        loop {
            match self.source.poll()? {
                FeedPoll::Bar(raw) | FeedPoll::Update(raw) => {
                    if let Some(event) = self.transformer.push(&raw) {
                        return Ok(event);
                    }
                }
                FeedPoll::NotReady => return Ok(FeedPoll::NotReady),
                FeedPoll::Exhausted => {
                    if let Some(bar) = self.transformer.flush() {
                        return Ok(FeedPoll::Bar(bar));
                    }
                    self.finished = true;
                    return Ok(FeedPoll::Exhausted);
                }
            }
        }
    }

    fn stop(&mut self) {
        self.source.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryFeed;

    const MINUTE: i64 = 60_000;

    fn minute_bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let base = 100.0 + i as f64;
                Bar::new(i as i64 * MINUTE, base, base + 2.0, base - 1.0, base + 1.0, 10.0)
            })
            .collect()
    }

    fn drain(feed: &mut dyn Feed) -> Vec<FeedPoll> {
        let mut events = Vec::new();
        loop {
            match feed.poll().unwrap() {
                FeedPoll::Exhausted => return events,
                event => events.push(event),
            }
        }
    }

    #[test]
    fn test_resample_five_minutes() {
        let source = MemoryFeed::new("raw", Timeframe::minutes(1), minute_bars(10));
        let mut feed =
            TransformedFeed::resample(Box::new(source), BoundaryRule::Time(Timeframe::minutes(5)))
                .unwrap();
        assert_eq!(feed.timeframe(), Timeframe::minutes(5));

        let events = drain(&mut feed);
        assert_eq!(events.len(), 2);
        let FeedPoll::Bar(first) = events[0] else {
            panic!("expected a bar");
        };
        assert_eq!(first.open, 100.0);
        assert_eq!(first.high, 106.0);
        assert_eq!(first.low, 99.0);
        assert_eq!(first.close, 105.0);
        assert_eq!(first.volume, 50.0);
        assert_eq!(first.timestamp, 4 * MINUTE);
    }

    #[test]
    fn test_resample_partial_bucket_flushes_at_end() {
        let source = MemoryFeed::new("raw", Timeframe::minutes(1), minute_bars(7));
        let mut feed =
            TransformedFeed::resample(Box::new(source), BoundaryRule::Time(Timeframe::minutes(5)))
                .unwrap();
        let events = drain(&mut feed);
        assert_eq!(events.len(), 2);
        let FeedPoll::Bar(last) = events[1] else {
            panic!("expected a bar");
        };
        assert_eq!(last.open, 105.0);
        assert_eq!(last.close, 107.0);
        assert_eq!(last.volume, 20.0);
    }

    #[test]
    fn test_count_rule_emits_on_nth_bar() {
        let mut t = TimeframeTransformer::resample(BoundaryRule::Count(3)).unwrap();
        let bars = minute_bars(7);
        let emitted: Vec<Option<FeedPoll>> = bars.iter().map(|b| t.push(b)).collect();
        assert!(emitted[0].is_none());
        assert!(emitted[1].is_none());
        assert!(matches!(emitted[2], Some(FeedPoll::Bar(b)) if b.timestamp == 2 * MINUTE));
        assert!(matches!(emitted[5], Some(FeedPoll::Bar(b)) if b.open == 103.0));
        assert!(emitted[6].is_none());
        assert!(matches!(t.flush(), Some(b) if b.open == 106.0));
    }

    #[test]
    fn test_replay_updates_in_place() {
        let source = MemoryFeed::new("raw", Timeframe::minutes(1), minute_bars(6));
        let mut feed =
            TransformedFeed::replay(Box::new(source), BoundaryRule::Time(Timeframe::minutes(5)))
                .unwrap();
        assert!(feed.is_replay());

        let events = drain(&mut feed);
        assert_eq!(events.len(), 6);
        assert!(matches!(events[0], FeedPoll::Bar(_)));
        for event in &events[1..5] {
            assert!(matches!(event, FeedPoll::Update(_)));
        }
        let FeedPoll::Update(full) = events[4] else {
            panic!("expected an update");
        };
        assert_eq!(full.high, 106.0);
        assert_eq!(full.volume, 50.0);
        assert!(matches!(events[5], FeedPoll::Bar(b) if b.open == 105.0));
    }

    #[test]
    fn test_invalid_rules() {
        assert!(TimeframeTransformer::resample(BoundaryRule::Count(0)).is_err());
        assert!(TimeframeTransformer::replay(BoundaryRule::Time(Timeframe::ticks(1))).is_err());
    }
}
