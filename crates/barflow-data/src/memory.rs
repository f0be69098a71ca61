//! In-memory feed.

use std::collections::VecDeque;

use barflow_core::{Bar, DataError, Feed, FeedPoll, Timeframe};

/// Historical feed over a vector of bars.
#[derive(Debug, Clone)]
pub struct MemoryFeed {
    name: String,
    timeframe: Timeframe,
    bars: VecDeque<Bar>,
}

impl MemoryFeed {
    pub fn new(name: impl Into<String>, timeframe: Timeframe, bars: Vec<Bar>) -> Self {
        Self {
            name: name.into(),
            timeframe,
            bars: bars.into(),
        }
    }

    /// Bars not yet delivered.
    pub fn remaining(&self) -> usize {
        self.bars.len()
    }
}

impl Feed for MemoryFeed {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    fn poll(&mut self) -> Result<FeedPoll, DataError> {
        match self.bars.pop_front() {
            Some(bar) => {
                bar.validate()?;
                Ok(FeedPoll::Bar(bar))
            }
            None => Ok(FeedPoll::Exhausted),
        }
    }
}
