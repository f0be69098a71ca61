//! Live feeds.
//!
//! Providers run on tokio tasks and push bars into a bounded channel. The
//! scheduler side never blocks: an empty channel reports `NotReady`, a closed
//! one `Exhausted`.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;

use barflow_core::{Bar, DataError, Feed, FeedPoll, Timeframe};

/// Default channel capacity between a provider and its feed.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Producer of live bars.
#[async_trait]
pub trait LiveProvider: Send + 'static {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Push bars into `tx` until the source ends or the receiver goes away.
    async fn run(self: Box<Self>, tx: mpsc::Sender<Bar>) -> Result<(), DataError>;
}

/// Provider over any stream of bars.
pub struct StreamProvider<S> {
    name: String,
    stream: S,
}

impl<S> StreamProvider<S>
where
    S: Stream<Item = Bar> + Send + Unpin + 'static,
{
    pub fn new(name: impl Into<String>, stream: S) -> Self {
        Self {
            name: name.into(),
            stream,
        }
    }
}

#[async_trait]
impl<S> LiveProvider for StreamProvider<S>
where
    S: Stream<Item = Bar> + Send + Unpin + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(mut self: Box<Self>, tx: mpsc::Sender<Bar>) -> Result<(), DataError> {
        while let Some(bar) = self.stream.next().await {
            if tx.send(bar).await.is_err() {
                tracing::debug!(provider = %self.name, "Live feed dropped, stopping provider");
                break;
            }
        }
        Ok(())
    }
}

/// Feed side of a live channel.
#[derive(Debug)]
pub struct LiveFeed {
    name: String,
    timeframe: Timeframe,
    rx: mpsc::Receiver<Bar>,
}

/// Create a bounded channel and the live feed reading from it.
pub fn channel(
    name: impl Into<String>,
    timeframe: Timeframe,
    capacity: usize,
) -> (mpsc::Sender<Bar>, LiveFeed) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let feed = LiveFeed {
        name: name.into(),
        timeframe,
        rx,
    };
    (tx, feed)
}

/// Spawn `provider` on the current tokio runtime and return its feed.
pub fn spawn_provider(
    provider: Box<dyn LiveProvider>,
    timeframe: Timeframe,
    capacity: usize,
) -> (LiveFeed, JoinHandle<Result<(), DataError>>) {
    let (tx, feed) = channel(provider.name().to_string(), timeframe, capacity);
    let handle = tokio::spawn(async move {
        let name = provider.name().to_string();
        let result = provider.run(tx).await;
        if let Err(e) = &result {
            tracing::warn!(provider = %name, error = %e, "Live provider failed");
        }
        result
    });
    (feed, handle)
}

impl Feed for LiveFeed {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    fn is_live(&self) -> bool {
        true
    }

    fn poll(&mut self) -> Result<FeedPoll, DataError> {
        match self.rx.try_recv() {
            Ok(bar) => {
                bar.validate()?;
                Ok(FeedPoll::Bar(bar))
            }
            Err(TryRecvError::Empty) => Ok(FeedPoll::NotReady),
            Err(TryRecvError::Disconnected) => Ok(FeedPoll::Exhausted),
        }
    }

    fn stop(&mut self) {
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(ts: i64) -> Bar {
        Bar::new(ts, 1.0, 2.0, 0.5, 1.5, 10.0)
    }

    #[test]
    fn test_channel_poll_states() {
        let (tx, mut feed) = channel("live", Timeframe::seconds(1), 4);
        assert!(feed.is_live());
        assert_eq!(feed.poll(), Ok(FeedPoll::NotReady));

        tx.try_send(bar(1)).unwrap();
        assert_eq!(feed.poll(), Ok(FeedPoll::Bar(bar(1))));
        assert_eq!(feed.poll(), Ok(FeedPoll::NotReady));

        drop(tx);
        assert_eq!(feed.poll(), Ok(FeedPoll::Exhausted));
    }

    #[test]
    fn test_bounded_capacity() {
        let (tx, _feed) = channel("live", Timeframe::seconds(1), 2);
        tx.try_send(bar(1)).unwrap();
        tx.try_send(bar(2)).unwrap();
        assert!(tx.try_send(bar(3)).is_err());
    }

    #[tokio::test]
    async fn test_stream_provider_feeds_channel() {
        let bars = vec![bar(1), bar(2), bar(3)];
        let provider = StreamProvider::new("stream", tokio_stream::iter(bars.clone()));
        let (mut feed, handle) = spawn_provider(Box::new(provider), Timeframe::seconds(1), 8);
        handle.await.unwrap().unwrap();

        for expected in bars {
            assert_eq!(feed.poll(), Ok(FeedPoll::Bar(expected)));
        }
        assert_eq!(feed.poll(), Ok(FeedPoll::Exhausted));
    }
}
