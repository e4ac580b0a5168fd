//! The `ThumbnailService` facade.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::config::ThumbnailServiceConfig;
use super::error::ServiceError;
use crate::cache::{
    CacheStatistics, DiskCache, DiskUsage, MaintenanceConfig, MaintenanceDaemon, MemoryCache,
    SweepResult, ThumbnailMemoryCache,
};
use crate::config::DEFAULT_SHUTDOWN_GRACE_SECS;
use crate::notify::ReadySubscription;
use crate::pipeline::{
    CoalescerStats, ConcurrencyGate, PipelineContext, Priority, QueueDepths, Registration,
    ThumbnailTicket, WorkerPool,
};
use crate::renderer::{Renderer, Thumbnail};

/// Grace period used when a caller has no preference.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS);

/// Concurrent thumbnail cache and generator.
pub struct ThumbnailService {
    context: Arc<PipelineContext>,
    workers: Mutex<Option<WorkerPool>>,
    maintenance: Mutex<Option<MaintenanceDaemon>>,
    accepting: AtomicBool,
    config: ThumbnailServiceConfig,
}

impl ThumbnailService {
    /// Validate `config`, open the caches and start workers and maintenance.
    ///
    /// Must be called within a tokio runtime.
    pub async fn start(
        config: ThumbnailServiceConfig,
        renderer: Arc<dyn Renderer>,
    ) -> Result<Self, ServiceError> {
        config.validate()?;

        let memory = Arc::new(MemoryCache::new(config.memory_max_bytes)?);
        let disk = Arc::new(DiskCache::open(&config.cache_dir).await?);
        let renderer_name = renderer.name().to_string();

        let context = Arc::new(PipelineContext::new(
            Arc::clone(&memory),
            Arc::clone(&disk),
            renderer,
            config.pipeline_limits(),
        ));
        let workers = WorkerPool::start(Arc::clone(&context), config.worker_count);
        let maintenance = MaintenanceDaemon::start(
            memory,
            disk,
            MaintenanceConfig {
                interval: config.sweep_interval,
                memory_max_idle: config.memory_max_idle,
                disk_retention: config.disk_retention,
            },
        );

        info!(
            cache_dir = %config.cache_dir.display(),
            memory_max_bytes = config.memory_max_bytes,
            workers = config.worker_count,
            background_capacity = config.background_capacity,
            renderer = %renderer_name,
            "Thumbnail service started"
        );

        Ok(Self {
            context,
            workers: Mutex::new(Some(workers)),
            maintenance: Mutex::new(Some(maintenance)),
            accepting: AtomicBool::new(true),
            config,
        })
    }

    /// Ask for the thumbnail of `path`.
    ///
    /// Cached thumbnails come back as an already-resolved ticket. Otherwise
    /// the caller joins the in-flight generation for the path, or starts one.
    /// After shutdown every request resolves to `None`.
    pub fn request(&self, path: impl AsRef<Path>, priority: Priority) -> ThumbnailTicket {
        let key = normalize_key(path.as_ref());

        if let Some(thumbnail) = self.context.memory.try_get(&key) {
            return ThumbnailTicket::ready(Some(thumbnail));
        }
        if !self.accepting.load(Ordering::SeqCst) {
            debug!(path = %key.display(), "Request after shutdown, unavailable");
            return ThumbnailTicket::ready(None);
        }

        match self.context.coalescer.register(key, priority) {
            Registration::Coalesced { ticket, .. } => ticket,
            Registration::New { pending, ticket } => {
                if let Some(dropped) = self.context.scheduler.enqueue(Arc::clone(&pending)) {
                    self.context.counters.record_background_dropped();
                    self.context.coalescer.complete(dropped.pending(), None);
                }
                // Shutdown may have drained the queues between the check above
                // and the enqueue; nobody would ever pick this one up.
                if !self.accepting.load(Ordering::SeqCst) {
                    self.context.coalescer.complete(&pending, None);
                }
                ticket
            }
        }
    }

    /// Memory-cached thumbnail, without scheduling any work.
    pub fn get_cached(&self, path: impl AsRef<Path>) -> Option<Thumbnail> {
        self.context.memory.try_get(&normalize_key(path.as_ref()))
    }

    /// Drop the memory entry for `path`. The disk artifact stays and is
    /// bypassed automatically once the source changes.
    pub fn invalidate(&self, path: impl AsRef<Path>) -> bool {
        self.context.memory.remove(&normalize_key(path.as_ref()))
    }

    /// Subscribe to "thumbnail ready" notices.
    pub fn subscribe(&self) -> ReadySubscription {
        self.context.notifier.subscribe()
    }

    pub fn statistics(&self) -> CacheStatistics {
        self.context.counters.snapshot(
            self.context.memory.statistics(),
            self.context.disk.stats(),
        )
    }

    /// Zero all counters. Cached entries are untouched.
    pub fn reset_statistics(&self) {
        self.context.memory.reset_statistics();
        self.context.disk.reset_stats();
        self.context.coalescer.reset_stats();
        self.context.counters.reset();
    }

    pub fn coalescer_stats(&self) -> CoalescerStats {
        self.context.coalescer.stats()
    }

    /// Shrink the memory cache to `percent` of its budget (e.g. on memory pressure).
    pub fn trim_memory_to_percent(&self, percent: u8) -> usize {
        self.context.memory.trim_to_percent(percent)
    }

    pub fn trim_memory_to_size(&self, target_bytes: u64) -> usize {
        self.context.memory.trim_to_size(target_bytes)
    }

    /// Evict memory entries not accessed within `max_idle`.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        self.context.memory.evict_older_than(max_idle)
    }

    pub fn clear_memory(&self) {
        self.context.memory.clear();
        info!("Memory cache cleared");
    }

    pub async fn clear_disk(&self) -> Result<SweepResult, ServiceError> {
        Ok(self.context.disk.clear().await?)
    }

    /// Run a retention sweep now.
    pub async fn sweep_disk(&self, max_age: Duration) -> Result<SweepResult, ServiceError> {
        Ok(self.context.disk.sweep_older_than(max_age).await?)
    }

    pub async fn disk_usage(&self) -> Result<DiskUsage, ServiceError> {
        Ok(self.context.disk.usage().await?)
    }

    /// Paths with a generation queued or running.
    pub fn in_flight_count(&self) -> usize {
        self.context.coalescer.in_flight_count()
    }

    pub fn queue_depths(&self) -> QueueDepths {
        self.context.scheduler.depths()
    }

    /// Gate bounding disk cache reads and writes.
    pub fn disk_gate(&self) -> &ConcurrencyGate {
        &self.context.disk_gate
    }

    /// Gate bounding concurrent renders.
    pub fn render_gate(&self) -> &ConcurrencyGate {
        &self.context.render_gate
    }

    pub fn memory_cache(&self) -> &ThumbnailMemoryCache {
        &self.context.memory
    }

    pub fn config(&self) -> &ThumbnailServiceConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Stop the service.
    ///
    /// New requests resolve to `None` immediately. In-flight work gets up to
    /// `grace` to finish; stragglers are aborted. Everything still queued or
    /// pending then resolves to `None`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::AlreadyShutDown` on a second call.
    pub async fn shutdown(&self, grace: Duration) -> Result<(), ServiceError> {
        if !self.accepting.swap(false, Ordering::SeqCst) {
            return Err(ServiceError::AlreadyShutDown);
        }
        info!(grace_ms = grace.as_millis() as u64, "Thumbnail service shutting down");

        let workers = self.workers.lock().take();
        if let Some(workers) = workers {
            workers.shutdown(grace).await;
        }

        let queued = self.context.scheduler.drain();
        let queued_count = queued.len();
        for request in queued {
            self.context.coalescer.complete(request.pending(), None);
        }
        let abandoned = self.context.coalescer.abandon_all();

        let maintenance = self.maintenance.lock().take();
        if let Some(maintenance) = maintenance {
            maintenance.shutdown().await;
        }

        info!(
            queued_dropped = queued_count,
            in_flight_abandoned = abandoned,
            "Thumbnail service stopped"
        );
        Ok(())
    }
}

impl Drop for ThumbnailService {
    fn drop(&mut self) {
        // Cancels the worker and maintenance tokens via their own Drop impls.
        self.workers.get_mut().take();
        self.maintenance.get_mut().take();
    }
}

/// Cache keys are absolute paths.
fn normalize_key(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{BoxFuture, PixelFormat, RawImage, RenderError};
    use tempfile::TempDir;

    struct SolidRenderer;

    impl Renderer for SolidRenderer {
        fn render<'a>(&'a self, _path: &'a Path) -> BoxFuture<'a, Result<RawImage, RenderError>> {
            Box::pin(async { Ok(RawImage::new(4, 4, PixelFormat::Luma8, vec![128; 16]).unwrap()) })
        }
    }

    async fn service(dir: &TempDir) -> ThumbnailService {
        let config = ThumbnailServiceConfig::new(dir.path().join("cache")).with_workers(2);
        ThumbnailService::start(config, Arc::new(SolidRenderer)).await.unwrap()
    }

    #[test]
    fn test_normalize_key_makes_absolute() {
        let key = normalize_key(Path::new("relative/a.jpg"));
        assert!(key.is_absolute());
        assert!(key.ends_with("relative/a.jpg"));
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_config() {
        let dir = TempDir::new().unwrap();
        let config = ThumbnailServiceConfig::new(dir.path()).with_memory_size(0);
        let result = ThumbnailService::start(config, Arc::new(SolidRenderer)).await;
        assert!(matches!(result, Err(ServiceError::Config(_))));
    }

    #[tokio::test]
    async fn test_second_request_is_served_from_memory() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir).await;
        let path = dir.path().join("a.jpg");
        std::fs::write(&path, b"x").unwrap();

        assert!(service.request(&path, Priority::Interactive).wait().await.is_some());
        let second = service.request(&path, Priority::Interactive);
        assert!(second.is_ready());
        assert!(service.get_cached(&path).is_some());

        assert!(service.invalidate(&path));
        assert!(service.get_cached(&path).is_none());
        service.shutdown(DEFAULT_SHUTDOWN_GRACE).await.unwrap();
    }

    #[tokio::test]
    async fn test_request_after_shutdown_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir).await;
        service.shutdown(Duration::from_millis(200)).await.unwrap();

        let path = dir.path().join("a.jpg");
        std::fs::write(&path, b"x").unwrap();
        let ticket = service.request(&path, Priority::Interactive);
        assert!(ticket.is_ready());
        assert!(ticket.wait().await.is_none());
        assert!(!service.is_running());
        assert!(matches!(
            service.shutdown(Duration::ZERO).await,
            Err(ServiceError::AlreadyShutDown)
        ));
    }

    #[tokio::test]
    async fn test_reset_statistics() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir).await;
        let path = dir.path().join("a.jpg");
        std::fs::write(&path, b"x").unwrap();
        service.request(&path, Priority::Interactive).wait().await;

        assert_eq!(service.statistics().renders, 1);
        service.reset_statistics();
        let stats = service.statistics();
        assert_eq!(stats.renders, 0);
        assert_eq!(stats.memory.misses, 0);
        assert_eq!(stats.memory.entry_count, 1);
        service.shutdown(DEFAULT_SHUTDOWN_GRACE).await.unwrap();
    }
}
