//! Request coalescing.
//!
//! At most one generation runs per source path. The first caller for a path
//! creates a [`PendingRequest`]; everyone who asks while it is in flight
//! gets a ticket on the same broadcast channel.
//!
//! ```text
//! request A ─┐
//! request B ─┼──► RequestCoalescer ──► PriorityScheduler ──► worker
//! request C ─┘          ▲                                      │
//!                       └────────── complete(result) ◄─────────┘
//! ```
//!
//! Completion removes the entry from the table before broadcasting, so a
//! caller arriving afterwards starts fresh (and normally hits the memory
//! cache the worker just populated).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use super::request::{PendingRequest, Priority, ThumbnailResult, ThumbnailTicket};

/// Statistics for monitoring coalescing effectiveness.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CoalescerStats {
    /// Total registrations
    pub total_requests: u64,
    /// Registrations that joined an in-flight request
    pub coalesced_requests: u64,
    /// Registrations that created new work
    pub new_requests: u64,
    /// Joins that raised the pending priority
    pub priority_upgrades: u64,
}

impl CoalescerStats {
    /// Fraction of requests that were coalesced (0.0 to 1.0).
    pub fn coalescing_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.coalesced_requests as f64 / self.total_requests as f64
        }
    }
}

/// Outcome of [`RequestCoalescer::register`].
#[derive(Debug)]
pub enum Registration {
    /// No request was in flight; the caller must enqueue `pending`.
    New {
        pending: Arc<PendingRequest>,
        ticket: ThumbnailTicket,
    },
    /// Joined an in-flight request.
    Coalesced {
        ticket: ThumbnailTicket,
        upgraded: bool,
    },
}

/// Table of in-flight requests keyed by source path.
#[derive(Debug, Default)]
pub struct RequestCoalescer {
    in_flight: DashMap<PathBuf, Arc<PendingRequest>>,
    total_requests: AtomicU64,
    coalesced_requests: AtomicU64,
    new_requests: AtomicU64,
    priority_upgrades: AtomicU64,
}

impl RequestCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the in-flight request for `path`, or create one.
    pub fn register(&self, path: PathBuf, priority: Priority) -> Registration {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        match self.in_flight.entry(path) {
            Entry::Occupied(entry) => {
                let pending = entry.get();
                let ticket = ThumbnailTicket::waiting(pending.subscribe());
                let upgraded = pending.upgrade(priority);
                self.coalesced_requests.fetch_add(1, Ordering::Relaxed);
                if upgraded {
                    self.priority_upgrades.fetch_add(1, Ordering::Relaxed);
                }
                debug!(
                    path = %pending.path().display(),
                    upgraded,
                    waiters = pending.waiter_count(),
                    "Coalesced thumbnail request"
                );
                Registration::Coalesced { ticket, upgraded }
            }
            Entry::Vacant(entry) => {
                let pending = PendingRequest::new(entry.key().clone(), priority);
                let ticket = ThumbnailTicket::waiting(pending.subscribe());
                entry.insert(Arc::clone(&pending));
                self.new_requests.fetch_add(1, Ordering::Relaxed);
                debug!(
                    path = %pending.path().display(),
                    ?priority,
                    "New thumbnail request"
                );
                Registration::New { pending, ticket }
            }
        }
    }

    /// Remove `pending` from the table and broadcast `result` to its tickets.
    ///
    /// Only the first completion of a given record has any effect. Returns
    /// whether this call was it.
    pub fn complete(&self, pending: &Arc<PendingRequest>, result: ThumbnailResult) -> bool {
        let removed = self
            .in_flight
            .remove_if(pending.path(), |_, current| Arc::ptr_eq(current, pending));
        match removed {
            Some((_, pending)) => {
                let available = result.is_some();
                let delivered = pending.resolve(result);
                debug!(
                    path = %pending.path().display(),
                    available,
                    delivered,
                    elapsed_ms = pending.age().as_millis() as u64,
                    "Thumbnail request resolved"
                );
                true
            }
            None => false,
        }
    }

    /// Resolve every in-flight request as unavailable. Used on shutdown.
    pub fn abandon_all(&self) -> usize {
        let pending: Vec<Arc<PendingRequest>> = self
            .in_flight
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        pending
            .iter()
            .filter(|pending| self.complete(pending, None))
            .count()
    }

    pub fn get(&self, path: &Path) -> Option<Arc<PendingRequest>> {
        self.in_flight.get(path).map(|entry| Arc::clone(entry.value()))
    }

    pub fn is_in_flight(&self, path: &Path) -> bool {
        self.in_flight.contains_key(path)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn stats(&self) -> CoalescerStats {
        CoalescerStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            coalesced_requests: self.coalesced_requests.load(Ordering::Relaxed),
            new_requests: self.new_requests.load(Ordering::Relaxed),
            priority_upgrades: self.priority_upgrades.load(Ordering::Relaxed),
        }
    }

    pub fn reset_stats(&self) {
        self.total_requests.store(0, Ordering::Relaxed);
        self.coalesced_requests.store(0, Ordering::Relaxed);
        self.new_requests.store(0, Ordering::Relaxed);
        self.priority_upgrades.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{PixelFormat, RawImage};

    fn thumb() -> crate::renderer::Thumbnail {
        Arc::new(RawImage::new(1, 1, PixelFormat::Luma8, vec![1]).unwrap())
    }

    fn expect_new(registration: Registration) -> (Arc<PendingRequest>, ThumbnailTicket) {
        match registration {
            Registration::New { pending, ticket } => (pending, ticket),
            other => panic!("expected new registration, got {:?}", other),
        }
    }

    #[test]
    fn test_first_registration_is_new() {
        let coalescer = RequestCoalescer::new();
        let (pending, _ticket) = expect_new(coalescer.register("/a".into(), Priority::Interactive));
        assert_eq!(pending.path(), Path::new("/a"));
        assert!(coalescer.is_in_flight(Path::new("/a")));
        assert_eq!(coalescer.in_flight_count(), 1);
    }

    #[tokio::test]
    async fn test_duplicates_share_one_result() {
        let coalescer = RequestCoalescer::new();
        let (pending, first) = expect_new(coalescer.register("/a".into(), Priority::Background));
        let second = match coalescer.register("/a".into(), Priority::Background) {
            Registration::Coalesced { ticket, upgraded } => {
                assert!(!upgraded);
                ticket
            }
            other => panic!("expected coalesced, got {:?}", other),
        };

        assert!(coalescer.complete(&pending, Some(thumb())));
        assert!(first.wait().await.is_some());
        assert!(second.wait().await.is_some());
        assert_eq!(coalescer.in_flight_count(), 0);

        let stats = coalescer.stats();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.coalesced_requests, 1);
        assert_eq!(stats.new_requests, 1);
        assert!((stats.coalescing_ratio() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_interactive_join_upgrades_background() {
        let coalescer = RequestCoalescer::new();
        let (pending, _t) = expect_new(coalescer.register("/a".into(), Priority::Background));
        match coalescer.register("/a".into(), Priority::Interactive) {
            Registration::Coalesced { upgraded, .. } => assert!(upgraded),
            other => panic!("expected coalesced, got {:?}", other),
        }
        assert_eq!(pending.effective_priority(), Priority::Interactive);
        assert_eq!(pending.lane_priority(), Priority::Background);
        assert_eq!(coalescer.stats().priority_upgrades, 1);
    }

    #[test]
    fn test_complete_happens_once() {
        let coalescer = RequestCoalescer::new();
        let (pending, _t) = expect_new(coalescer.register("/a".into(), Priority::Interactive));
        assert!(coalescer.complete(&pending, None));
        assert!(!coalescer.complete(&pending, None));
    }

    #[test]
    fn test_stale_record_does_not_remove_successor() {
        let coalescer = RequestCoalescer::new();
        let (first, _t1) = expect_new(coalescer.register("/a".into(), Priority::Interactive));
        coalescer.complete(&first, None);
        let (second, _t2) = expect_new(coalescer.register("/a".into(), Priority::Interactive));

        assert!(!coalescer.complete(&first, None));
        assert!(coalescer.is_in_flight(Path::new("/a")));
        assert!(coalescer.complete(&second, None));
    }

    #[tokio::test]
    async fn test_abandon_all_resolves_unavailable() {
        let coalescer = RequestCoalescer::new();
        let (_a, ticket_a) = expect_new(coalescer.register("/a".into(), Priority::Interactive));
        let (_b, ticket_b) = expect_new(coalescer.register("/b".into(), Priority::Background));

        assert_eq!(coalescer.abandon_all(), 2);
        assert!(ticket_a.wait().await.is_none());
        assert!(ticket_b.wait().await.is_none());
        assert_eq!(coalescer.in_flight_count(), 0);
    }

    #[test]
    fn test_concurrent_registration_creates_one_request() {
        let coalescer = Arc::new(RequestCoalescer::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let coalescer = Arc::clone(&coalescer);
                std::thread::spawn(move || {
                    matches!(
                        coalescer.register("/same".into(), Priority::Interactive),
                        Registration::New { .. }
                    )
                })
            })
            .collect();
        let new_count = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|is_new| *is_new)
            .count();
        assert_eq!(new_count, 1);
    }
}
