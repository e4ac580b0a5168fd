//! Two-lane priority scheduler.
//!
//! The interactive lane is unbounded. The background lane has a fixed
//! capacity and drops its oldest entry on overflow; the dropped request is
//! handed back to the caller so it can be resolved as unavailable. Within a
//! lane the order is FIFO, and interactive work always dequeues first.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::request::{PendingRequest, Priority};

/// Which queue a request waits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    Interactive,
    Background,
}

impl From<Priority> for Lane {
    fn from(priority: Priority) -> Self {
        match priority {
            Priority::Interactive => Lane::Interactive,
            Priority::Background => Lane::Background,
        }
    }
}

/// A pending request waiting in a lane.
#[derive(Debug)]
pub struct QueuedRequest {
    pending: Arc<PendingRequest>,
    lane: Lane,
    enqueued_at: Instant,
}

impl QueuedRequest {
    pub fn pending(&self) -> &Arc<PendingRequest> {
        &self.pending
    }

    pub fn path(&self) -> &Path {
        self.pending.path()
    }

    pub fn lane(&self) -> Lane {
        self.lane
    }

    /// Time spent queued so far.
    pub fn waited(&self) -> Duration {
        self.enqueued_at.elapsed()
    }

    pub(crate) fn into_pending(self) -> Arc<PendingRequest> {
        self.pending
    }
}

/// Number of requests waiting in each lane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueDepths {
    pub interactive: usize,
    pub background: usize,
}

impl QueueDepths {
    pub fn total(&self) -> usize {
        self.interactive + self.background
    }
}

/// Strict-priority queue feeding the worker pool.
#[derive(Debug)]
pub struct PriorityScheduler {
    interactive: Mutex<VecDeque<QueuedRequest>>,
    background: Mutex<VecDeque<QueuedRequest>>,
    background_capacity: usize,
    /// Shared by both lanes
    available: Notify,
    dropped: AtomicU64,
}

impl PriorityScheduler {
    /// Create a scheduler whose background lane holds at most
    /// `background_capacity` requests (at least one).
    pub fn new(background_capacity: usize) -> Self {
        Self {
            interactive: Mutex::new(VecDeque::new()),
            background: Mutex::new(VecDeque::new()),
            background_capacity: background_capacity.max(1),
            available: Notify::new(),
            dropped: AtomicU64::new(0),
        }
    }

    /// Add a request to the lane matching its priority.
    ///
    /// Returns the request dropped to make room, if the background lane was
    /// full. Entries whose priority was upgraded by a later interactive caller
    /// are passed over when an un-upgraded one exists.
    pub fn enqueue(&self, pending: Arc<PendingRequest>) -> Option<QueuedRequest> {
        let lane = Lane::from(pending.lane_priority());
        let request = QueuedRequest {
            pending,
            lane,
            enqueued_at: Instant::now(),
        };

        let dropped = match lane {
            Lane::Interactive => {
                self.interactive.lock().push_back(request);
                None
            }
            Lane::Background => {
                let mut queue = self.background.lock();
                let victim = if queue.len() >= self.background_capacity {
                    Self::take_victim(&mut queue)
                } else {
                    None
                };
                queue.push_back(request);
                victim
            }
        };

        self.available.notify_one();

        if let Some(victim) = &dropped {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            debug!(
                path = %victim.path().display(),
                waited_ms = victim.waited().as_millis() as u64,
                capacity = self.background_capacity,
                "Background lane full, dropped oldest request"
            );
        }
        dropped
    }

    fn take_victim(queue: &mut VecDeque<QueuedRequest>) -> Option<QueuedRequest> {
        let index = queue
            .iter()
            .position(|request| !request.pending.is_upgraded())
            .unwrap_or(0);
        queue.remove(index)
    }

    /// Take the next request without waiting.
    pub fn try_dequeue(&self) -> Option<QueuedRequest> {
        if let Some(request) = self.interactive.lock().pop_front() {
            return Some(request);
        }
        self.background.lock().pop_front()
    }

    /// Wait for the next request. Returns `None` once `shutdown` fires.
    pub async fn dequeue(&self, shutdown: &CancellationToken) -> Option<QueuedRequest> {
        loop {
            if let Some(request) = self.try_dequeue() {
                return Some(request);
            }
            tokio::select! {
                _ = shutdown.cancelled() => return None,
                _ = self.available.notified() => {}
            }
        }
    }

    /// Remove everything still queued, interactive first.
    pub fn drain(&self) -> Vec<QueuedRequest> {
        let mut drained: Vec<QueuedRequest> = self.interactive.lock().drain(..).collect();
        drained.extend(self.background.lock().drain(..));
        drained
    }

    pub fn depths(&self) -> QueueDepths {
        QueueDepths {
            interactive: self.interactive.lock().len(),
            background: self.background.lock().len(),
        }
    }

    pub fn background_capacity(&self) -> usize {
        self.background_capacity
    }

    /// Background requests dropped since creation.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn pending(path: &str, priority: Priority) -> Arc<PendingRequest> {
        PendingRequest::new(PathBuf::from(path), priority)
    }

    fn paths(requests: &[QueuedRequest]) -> Vec<&Path> {
        requests.iter().map(|r| r.path()).collect()
    }

    #[test]
    fn test_interactive_before_background() {
        let scheduler = PriorityScheduler::new(10);
        scheduler.enqueue(pending("/bg1", Priority::Background));
        scheduler.enqueue(pending("/fg1", Priority::Interactive));
        scheduler.enqueue(pending("/bg2", Priority::Background));
        scheduler.enqueue(pending("/fg2", Priority::Interactive));

        let order: Vec<PathBuf> = std::iter::from_fn(|| scheduler.try_dequeue())
            .map(|r| r.path().to_path_buf())
            .collect();
        assert_eq!(
            order,
            vec![
                PathBuf::from("/fg1"),
                PathBuf::from("/fg2"),
                PathBuf::from("/bg1"),
                PathBuf::from("/bg2"),
            ]
        );
    }

    #[test]
    fn test_background_overflow_drops_oldest() {
        let scheduler = PriorityScheduler::new(2);
        assert!(scheduler.enqueue(pending("/1", Priority::Background)).is_none());
        assert!(scheduler.enqueue(pending("/2", Priority::Background)).is_none());
        let dropped = scheduler.enqueue(pending("/3", Priority::Background)).unwrap();

        assert_eq!(dropped.path(), Path::new("/1"));
        assert_eq!(dropped.lane(), Lane::Background);
        assert_eq!(scheduler.depths().background, 2);
        assert_eq!(scheduler.dropped_count(), 1);

        let remaining = scheduler.drain();
        assert_eq!(paths(&remaining), vec![Path::new("/2"), Path::new("/3")]);
    }

    #[test]
    fn test_overflow_spares_upgraded_entries() {
        let scheduler = PriorityScheduler::new(2);
        let first = pending("/1", Priority::Background);
        first.upgrade(Priority::Interactive);
        scheduler.enqueue(first);
        scheduler.enqueue(pending("/2", Priority::Background));

        let dropped = scheduler.enqueue(pending("/3", Priority::Background)).unwrap();
        assert_eq!(dropped.path(), Path::new("/2"));
    }

    #[test]
    fn test_overflow_drops_oldest_when_all_upgraded() {
        let scheduler = PriorityScheduler::new(1);
        let only = pending("/1", Priority::Background);
        only.upgrade(Priority::Interactive);
        scheduler.enqueue(only);

        let dropped = scheduler.enqueue(pending("/2", Priority::Background)).unwrap();
        assert_eq!(dropped.path(), Path::new("/1"));
    }

    #[test]
    fn test_interactive_lane_is_unbounded() {
        let scheduler = PriorityScheduler::new(1);
        for i in 0..100 {
            let path = format!("/{}", i);
            assert!(scheduler.enqueue(pending(&path, Priority::Interactive)).is_none());
        }
        assert_eq!(scheduler.depths().interactive, 100);
    }

    #[tokio::test]
    async fn test_dequeue_wakes_on_enqueue() {
        let scheduler = Arc::new(PriorityScheduler::new(10));
        let token = CancellationToken::new();

        let waiter = {
            let scheduler = Arc::clone(&scheduler);
            let token = token.clone();
            tokio::spawn(async move { scheduler.dequeue(&token).await.map(|r| r.path().to_path_buf()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        scheduler.enqueue(pending("/late", Priority::Background));

        let got = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, Some(PathBuf::from("/late")));
    }

    #[tokio::test]
    async fn test_dequeue_returns_none_on_shutdown() {
        let scheduler = PriorityScheduler::new(10);
        let token = CancellationToken::new();
        token.cancel();
        assert!(scheduler.dequeue(&token).await.is_none());
    }
}
