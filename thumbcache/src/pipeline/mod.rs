//! Thumbnail generation pipeline.
//!
//! Requests are coalesced per source path, queued in one of two priority
//! lanes, and drained by a fixed worker pool. Disk reads/writes and renders
//! each pass through their own concurrency gate.

mod coalesce;
mod context;
mod error;
mod gate;
mod request;
mod scheduler;
mod worker;

pub use coalesce::{CoalescerStats, Registration, RequestCoalescer};
pub use context::{PipelineContext, PipelineLimits};
pub use error::ThumbnailError;
pub use gate::{ConcurrencyGate, GateClosed, GatePermit};
pub use request::{PendingRequest, Priority, RequestState, ThumbnailResult, ThumbnailTicket};
pub use scheduler::{Lane, PriorityScheduler, QueueDepths, QueuedRequest};
pub use worker::{ShutdownReport, WorkerPool};
