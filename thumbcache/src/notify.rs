//! "Thumbnail ready" notifications.
//!
//! A bounded broadcast topic. Publishing never blocks the pipeline; a
//! subscriber that falls behind loses the oldest notices and keeps going.
//! Dropping a [`ReadySubscription`] unsubscribes it.

use std::path::PathBuf;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::debug;

/// A thumbnail for `path` has entered the memory cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailReady {
    pub path: PathBuf,
}

/// Publisher side of the ready topic.
#[derive(Debug, Clone)]
pub struct ReadyNotifier {
    sender: broadcast::Sender<ThumbnailReady>,
}

impl ReadyNotifier {
    /// Create a topic retaining up to `capacity` undelivered notices per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> ReadySubscription {
        ReadySubscription {
            receiver: self.sender.subscribe(),
            missed: 0,
        }
    }

    /// Publish a notice. Returns the number of subscribers it reached.
    pub fn notify(&self, path: PathBuf) -> usize {
        // No subscribers is not an error.
        self.sender.send(ThumbnailReady { path }).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Receiving side of the ready topic.
#[derive(Debug)]
pub struct ReadySubscription {
    receiver: broadcast::Receiver<ThumbnailReady>,
    missed: u64,
}

impl ReadySubscription {
    /// Wait for the next notice. Returns `None` once the service is gone.
    pub async fn recv(&mut self) -> Option<ThumbnailReady> {
        loop {
            match self.receiver.recv().await {
                Ok(notice) => return Some(notice),
                Err(RecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take a notice if one is queued.
    pub fn try_recv(&mut self) -> Option<ThumbnailReady> {
        loop {
            match self.receiver.try_recv() {
                Ok(notice) => return Some(notice),
                Err(TryRecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Notices lost because this subscriber fell behind.
    pub fn missed(&self) -> u64 {
        self.missed
    }

    fn record_lag(&mut self, skipped: u64) {
        self.missed += skipped;
        debug!(skipped, "Ready subscriber lagged, oldest notices dropped");
    }
}
