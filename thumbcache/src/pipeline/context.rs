//! Shared state handed to every worker.

use std::sync::Arc;

use crate::cache::{DiskCache, PipelineCounters, ThumbnailMemoryCache};
use crate::notify::ReadyNotifier;
use crate::renderer::Renderer;

use super::coalesce::RequestCoalescer;
use super::gate::ConcurrencyGate;
use super::scheduler::PriorityScheduler;

/// Queue and gate sizes for a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineLimits {
    pub background_capacity: usize,
    pub disk_concurrency: usize,
    pub render_concurrency: usize,
    pub notification_capacity: usize,
}

/// Everything a worker needs to take a request from queue to cache.
pub struct PipelineContext {
    pub(crate) memory: Arc<ThumbnailMemoryCache>,
    pub(crate) disk: Arc<DiskCache>,
    pub(crate) renderer: Arc<dyn Renderer>,
    pub(crate) coalescer: RequestCoalescer,
    pub(crate) scheduler: PriorityScheduler,
    pub(crate) disk_gate: ConcurrencyGate,
    pub(crate) render_gate: ConcurrencyGate,
    pub(crate) notifier: ReadyNotifier,
    pub(crate) counters: PipelineCounters,
}

impl PipelineContext {
    pub fn new(
        memory: Arc<ThumbnailMemoryCache>,
        disk: Arc<DiskCache>,
        renderer: Arc<dyn Renderer>,
        limits: PipelineLimits,
    ) -> Self {
        Self {
            memory,
            disk,
            renderer,
            coalescer: RequestCoalescer::new(),
            scheduler: PriorityScheduler::new(limits.background_capacity),
            disk_gate: ConcurrencyGate::new(limits.disk_concurrency, "disk"),
            render_gate: ConcurrencyGate::new(limits.render_concurrency, "render"),
            notifier: ReadyNotifier::new(limits.notification_capacity),
            counters: PipelineCounters::new(),
        }
    }

    pub fn memory(&self) -> &ThumbnailMemoryCache {
        &self.memory
    }

    pub fn disk(&self) -> &DiskCache {
        &self.disk
    }

    pub fn coalescer(&self) -> &RequestCoalescer {
        &self.coalescer
    }

    pub fn scheduler(&self) -> &PriorityScheduler {
        &self.scheduler
    }

    pub fn disk_gate(&self) -> &ConcurrencyGate {
        &self.disk_gate
    }

    pub fn render_gate(&self) -> &ConcurrencyGate {
        &self.render_gate
    }

    pub fn notifier(&self) -> &ReadyNotifier {
        &self.notifier
    }

    pub fn counters(&self) -> &PipelineCounters {
        &self.counters
    }
}
