//! Counting gates bounding disk and render concurrency.
//!
//! ```ignore
//! let gate = ConcurrencyGate::new(4, "render");
//! let _permit = gate.acquire().await?;
//! // render happens here; the permit is released on drop
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Returned when acquiring from a closed gate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("concurrency gate '{label}' is closed")]
pub struct GateClosed {
    pub label: String,
}

/// Semaphore-backed limit on concurrent operations of one kind.
///
/// Tracks in-flight and peak in-flight counts for tuning. The disk and render
/// gates are independent; nothing ever holds both in a fixed order.
#[derive(Debug)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    max_permits: usize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    label: String,
}

impl ConcurrencyGate {
    /// Create a gate admitting `max_concurrent` holders (at least one).
    pub fn new(max_concurrent: usize, label: impl Into<String>) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_permits: max_concurrent,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            label: label.into(),
        }
    }

    /// Wait for a permit.
    ///
    /// # Errors
    ///
    /// Fails once the gate has been closed, including for waiters that were
    /// already queued when it closed.
    pub async fn acquire(&self) -> Result<GatePermit<'_>, GateClosed> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| self.closed())?;
        Ok(self.track(permit))
    }

    /// Take a permit if one is free right now.
    pub fn try_acquire(&self) -> Option<GatePermit<'_>> {
        let permit = self.semaphore.clone().try_acquire_owned().ok()?;
        Some(self.track(permit))
    }

    /// Refuse all further acquisitions. Held permits stay valid.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    fn closed(&self) -> GateClosed {
        GateClosed {
            label: self.label.clone(),
        }
    }

    fn track(&self, permit: OwnedSemaphorePermit) -> GatePermit<'_> {
        let current = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::Relaxed);
        GatePermit {
            _permit: permit,
            in_flight: &self.in_flight,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_permits
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Highest in-flight count observed since creation or the last reset.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Relaxed)
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn reset_peak(&self) {
        self.peak_in_flight.store(0, Ordering::Relaxed);
    }
}

/// Held while an operation runs; releases its slot on drop.
pub struct GatePermit<'a> {
    _permit: OwnedSemaphorePermit,
    in_flight: &'a AtomicUsize,
}

impl Drop for GatePermit<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}
