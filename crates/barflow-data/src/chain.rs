//! Feeds delivered one after another.

use barflow_core::{DataError, Feed, FeedPoll, Timeframe};

/// Plays several feeds in sequence as one.
///
/// Delivery always continues from the most advanced timestamp: bars not newer
/// than the last delivered one are skipped.
pub struct ChainedFeed {
    name: String,
    feeds: Vec<Box<dyn Feed>>,
    current: usize,
    last_timestamp: Option<i64>,
    skipped: usize,
}

impl ChainedFeed {
    pub fn new(name: impl Into<String>, feeds: Vec<Box<dyn Feed>>) -> Self {
        Self {
            name: name.into(),
            feeds,
            current: 0,
            last_timestamp: None,
            skipped: 0,
        }
    }

    /// Stale bars dropped so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn is_stale(&self, timestamp: i64) -> bool {
        self.last_timestamp.is_some_and(|last| timestamp <= last)
    }

    fn advance(&mut self) -> Result<bool, DataError> {
        if let Some(feed) = self.feeds.get_mut(self.current) {
            feed.stop();
        }
        self.current += 1;
        match self.feeds.get_mut(self.current) {
            Some(feed) => {
                tracing::debug!(chain = %self.name, feed = %feed.name(), "Chained feed switching source");
                feed.start()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Feed for ChainedFeed {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeframe(&self) -> Timeframe {
        self.feeds
            .first()
            .map(|f| f.timeframe())
            .unwrap_or_default()
    }

    fn is_live(&self) -> bool {
        self.feeds.iter().any(|f| f.is_live())
    }

    fn is_replay(&self) -> bool {
        self.feeds.iter().any(|f| f.is_replay())
    }

    fn start(&mut self) -> Result<(), DataError> {
        match self.feeds.first_mut() {
            Some(feed) => feed.start(),
            None => Ok(()),
        }
    }

    fn poll(&mut self) -> Result<FeedPoll, DataError> {
        loop {
            let Some(feed) = self.feeds.get_mut(self.current) else {
                return Ok(FeedPoll::Exhausted);
            };
            match feed.poll()? {
                FeedPoll::Bar(bar) => {
                    if self.is_stale(bar.timestamp) {
                        self.skipped += 1;
                        tracing::trace!(chain = %self.name, timestamp = bar.timestamp, "Skipping stale bar");
                        continue;
                    }
                    self.last_timestamp = Some(bar.timestamp);
                    return Ok(FeedPoll::Bar(bar));
                }
                FeedPoll::Update(bar) => {
                    self.last_timestamp = Some(bar.timestamp);
                    return Ok(FeedPoll::Update(bar));
                }
                FeedPoll::NotReady => return Ok(FeedPoll::NotReady),
                FeedPoll::Exhausted => {
                    if !self.advance()? {
                        return Ok(FeedPoll::Exhausted);
                    }
                }
            }
        }
    }

    fn stop(&mut self) {
        if let Some(feed) = self.feeds.get_mut(self.current) {
            feed.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryFeed;
    use barflow_core::Bar;

    fn feed(name: &str, stamps: &[i64]) -> Box<dyn Feed> {
        let bars = stamps
            .iter()
            .map(|ts| Bar::new(*ts, 1.0, 1.0, 1.0, 1.0, 1.0))
            .collect();
        Box::new(MemoryFeed::new(name, Timeframe::days(1), bars))
    }

    #[test]
    fn test_chain_skips_stale_bars() {
        let mut chain = ChainedFeed::new(
            "chain",
            vec![feed("a", &[1, 2, 3]), feed("b", &[2, 3, 4, 5])],
        );
        chain.start().unwrap();

        let mut stamps = Vec::new();
        while let FeedPoll::Bar(bar) = chain.poll().unwrap() {
            stamps.push(bar.timestamp);
        }
        assert_eq!(stamps, vec![1, 2, 3, 4, 5]);
        assert_eq!(chain.skipped(), 2);
        assert_eq!(chain.poll(), Ok(FeedPoll::Exhausted));
    }

    #[test]
    fn test_empty_chain() {
        let mut chain = ChainedFeed::new("empty", Vec::new());
        assert_eq!(chain.poll(), Ok(FeedPoll::Exhausted));
    }
}
