//! Feed trait definition.

use crate::error::DataError;
use crate::types::{Bar, Timeframe};

/// Result of polling a feed once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeedPoll {
    /// A new bar, opening a new slot
    Bar(Bar),
    /// The current bar changed in place (replay)
    Update(Bar),
    /// Nothing available right now (live feeds)
    NotReady,
    /// No more data will arrive
    Exhausted,
}

/// A source of bars for one instrument.
///
/// Feeds are pulled by the scheduler one bar at a time and must never block.
pub trait Feed: Send {
    /// Get the feed name.
    fn name(&self) -> &str;

    /// Timeframe of the bars this feed delivers.
    fn timeframe(&self) -> Timeframe;

    /// Live feeds can report `NotReady` and cannot be preloaded.
    fn is_live(&self) -> bool {
        false
    }

    /// Replay feeds overwrite the current bar with `Update` events.
    fn is_replay(&self) -> bool {
        false
    }

    /// Called once before the first poll.
    fn start(&mut self) -> Result<(), DataError> {
        Ok(())
    }

    /// Fetch the next event. A malformed bar is reported as an `Err` and stops the feed.
    fn poll(&mut self) -> Result<FeedPoll, DataError>;

    /// Called once when the run ends or the feed is dropped from it.
    fn stop(&mut self) {}
}
