//! Request priority, pending-request records and caller tickets.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::error::ThumbnailError;
use crate::renderer::Thumbnail;

/// What a request resolves to: the thumbnail, or `None` when unavailable.
pub type ThumbnailResult = Option<Thumbnail>;

/// Request priority. `Interactive` outranks `Background`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Priority {
    /// Speculative work such as prefetching off-screen items
    Background = 0,
    /// Items currently visible to the user
    Interactive = 1,
}

impl Priority {
    fn from_u8(value: u8) -> Self {
        if value >= Priority::Interactive as u8 {
            Priority::Interactive
        } else {
            Priority::Background
        }
    }
}

/// Lifecycle of a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestState {
    Queued = 0,
    Processing = 1,
    Resolved = 2,
}

impl RequestState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RequestState::Queued,
            1 => RequestState::Processing,
            _ => RequestState::Resolved,
        }
    }
}

/// One in-flight generation shared by every caller that asked for the path.
///
/// The lane is fixed when the request is first enqueued. Later callers can
/// raise the effective priority, which only influences which background
/// entry is dropped on overflow.
#[derive(Debug)]
pub struct PendingRequest {
    path: PathBuf,
    lane_priority: Priority,
    effective_priority: AtomicU8,
    state: AtomicU8,
    created_at: Instant,
    sender: broadcast::Sender<ThumbnailResult>,
}

impl PendingRequest {
    pub(crate) fn new(path: PathBuf, priority: Priority) -> Arc<Self> {
        // A single value is ever sent.
        let (sender, _) = broadcast::channel(1);
        Arc::new(Self {
            path,
            lane_priority: priority,
            effective_priority: AtomicU8::new(priority as u8),
            state: AtomicU8::new(RequestState::Queued as u8),
            created_at: Instant::now(),
            sender,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Priority the request was enqueued with.
    pub fn lane_priority(&self) -> Priority {
        self.lane_priority
    }

    /// Highest priority any caller has asked for.
    pub fn effective_priority(&self) -> Priority {
        Priority::from_u8(self.effective_priority.load(Ordering::Acquire))
    }

    /// Whether a later caller raised the priority above the lane's.
    pub fn is_upgraded(&self) -> bool {
        self.effective_priority() > self.lane_priority
    }

    /// Raise the effective priority. Returns true if it went up.
    pub(crate) fn upgrade(&self, priority: Priority) -> bool {
        let previous = self
            .effective_priority
            .fetch_max(priority as u8, Ordering::AcqRel);
        previous < priority as u8
    }

    pub fn state(&self) -> RequestState {
        RequestState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn mark_processing(&self) {
        let _ = self.state.compare_exchange(
            RequestState::Queued as u8,
            RequestState::Processing as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Time since the first caller asked.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ThumbnailResult> {
        self.sender.subscribe()
    }

    pub fn waiter_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publish the result to all waiting tickets. Returns how many received it.
    pub(crate) fn resolve(&self, result: ThumbnailResult) -> usize {
        self.state
            .store(RequestState::Resolved as u8, Ordering::Release);
        self.sender.send(result).unwrap_or(0)
    }
}

/// A caller's handle on a thumbnail request.
///
/// Dropping the ticket detaches the caller; generation continues for any
/// other callers and still populates the cache.
#[derive(Debug)]
pub struct ThumbnailTicket {
    inner: TicketInner,
}

#[derive(Debug)]
enum TicketInner {
    Ready(ThumbnailResult),
    Waiting(broadcast::Receiver<ThumbnailResult>),
}

impl ThumbnailTicket {
    pub(crate) fn ready(result: ThumbnailResult) -> Self {
        Self {
            inner: TicketInner::Ready(result),
        }
    }

    pub(crate) fn waiting(receiver: broadcast::Receiver<ThumbnailResult>) -> Self {
        Self {
            inner: TicketInner::Waiting(receiver),
        }
    }

    /// Whether the result was available at request time.
    pub fn is_ready(&self) -> bool {
        matches!(self.inner, TicketInner::Ready(_))
    }

    /// Wait for the thumbnail. `None` means it is unavailable.
    pub async fn wait(self) -> ThumbnailResult {
        match self.inner {
            TicketInner::Ready(result) => result,
            // A closed channel means the request was abandoned without a result.
            TicketInner::Waiting(mut receiver) => receiver.recv().await.unwrap_or(None),
        }
    }

    /// Wait until the thumbnail resolves or `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns [`ThumbnailError::Cancelled`] if the token fires first.
    pub async fn wait_or_cancel(
        self,
        cancel: &CancellationToken,
    ) -> Result<ThumbnailResult, ThumbnailError> {
        if self.is_ready() {
            return Ok(self.wait().await);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ThumbnailError::Cancelled),
            result = self.wait() => Ok(result),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{PixelFormat, RawImage};
    use std::time::Duration;

    fn thumb() -> Thumbnail {
        Arc::new(RawImage::new(1, 1, PixelFormat::Luma8, vec![9]).unwrap())
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Interactive > Priority::Background);
    }

    #[test]
    fn test_upgrade_is_monotonic() {
        let pending = PendingRequest::new(PathBuf::from("/a"), Priority::Background);
        assert!(!pending.is_upgraded());
        assert!(pending.upgrade(Priority::Interactive));
        assert!(!pending.upgrade(Priority::Background));
        assert!(!pending.upgrade(Priority::Interactive));
        assert_eq!(pending.effective_priority(), Priority::Interactive);
        assert_eq!(pending.lane_priority(), Priority::Background);
        assert!(pending.is_upgraded());
    }

    #[test]
    fn test_state_transitions() {
        let pending = PendingRequest::new(PathBuf::from("/a"), Priority::Interactive);
        assert_eq!(pending.state(), RequestState::Queued);
        pending.mark_processing();
        assert_eq!(pending.state(), RequestState::Processing);
        pending.resolve(None);
        assert_eq!(pending.state(), RequestState::Resolved);
        pending.mark_processing();
        assert_eq!(pending.state(), RequestState::Resolved);
    }

    #[tokio::test]
    async fn test_all_tickets_receive_result() {
        let pending = PendingRequest::new(PathBuf::from("/a"), Priority::Interactive);
        let first = ThumbnailTicket::waiting(pending.subscribe());
        let second = ThumbnailTicket::waiting(pending.subscribe());

        assert_eq!(pending.resolve(Some(thumb())), 2);
        assert!(first.wait().await.is_some());
        assert!(second.wait().await.is_some());
    }

    #[tokio::test]
    async fn test_dropped_sender_resolves_none() {
        let pending = PendingRequest::new(PathBuf::from("/a"), Priority::Interactive);
        let ticket = ThumbnailTicket::waiting(pending.subscribe());
        drop(pending);
        assert!(ticket.wait().await.is_none());
    }

    #[tokio::test]
    async fn test_ready_ticket() {
        let ticket = ThumbnailTicket::ready(Some(thumb()));
        assert!(ticket.is_ready());
        assert!(ticket.wait().await.is_some());
    }

    #[tokio::test]
    async fn test_cancel_detaches_only_caller() {
        let pending = PendingRequest::new(PathBuf::from("/a"), Priority::Interactive);
        let cancelled = ThumbnailTicket::waiting(pending.subscribe());
        let patient = ThumbnailTicket::waiting(pending.subscribe());

        let token = CancellationToken::new();
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { cancelled.wait_or_cancel(&token).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
        assert!(matches!(
            waiter.await.unwrap(),
            Err(ThumbnailError::Cancelled)
        ));

        pending.resolve(Some(thumb()));
        assert!(patient.wait().await.is_some());
    }

    #[tokio::test]
    async fn test_ready_ticket_ignores_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        let result = ThumbnailTicket::ready(None).wait_or_cancel(&token).await;
        assert!(matches!(result, Ok(None)));
    }
}
