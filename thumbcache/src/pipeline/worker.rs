//! Fixed pool of generation workers.
//!
//! Each worker loops: take the next request from the scheduler (interactive
//! first), then resolve it through memory, disk and finally the renderer.
//!
//! ```text
//! dequeue ─► memory? ─► disk (disk gate) ─► render (render gate) ─► persist (disk gate)
//!               │             │                                         │
//!               └─────────────┴───────► memory insert ◄─────────────────┘
//!                                             │
//!                                 complete (remove + broadcast) ─► ready notice
//! ```
//!
//! No failure escapes a worker: every error resolves the request as
//! unavailable and the loop continues.

use std::io;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::context::PipelineContext;
use super::error::ThumbnailError;
use super::scheduler::QueuedRequest;
use crate::cache::{CacheError, DiskCacheKey};
use crate::renderer::{RenderError, Thumbnail};

/// How a pool shutdown went.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Workers that exited within the grace period
    pub finished: usize,
    /// Workers aborted after the grace period
    pub aborted: usize,
}

/// Handle to the running workers.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown: CancellationToken,
    context: Arc<PipelineContext>,
}

impl WorkerPool {
    /// Spawn `worker_count` workers (at least one) on the current runtime.
    pub fn start(context: Arc<PipelineContext>, worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let shutdown = CancellationToken::new();

        let handles = (0..worker_count)
            .map(|id| {
                let context = Arc::clone(&context);
                let token = shutdown.clone();
                tokio::spawn(run_worker(id, context, token))
            })
            .collect();

        info!(
            workers = worker_count,
            disk_concurrency = context.disk_gate.max_concurrent(),
            render_concurrency = context.render_gate.max_concurrent(),
            "Thumbnail worker pool started"
        );

        Self {
            handles,
            shutdown,
            context,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Stop taking new requests and wait up to `grace` for in-flight ones.
    ///
    /// Workers still running afterwards are aborted; their requests stay in
    /// the coalescing table for the caller to resolve.
    pub async fn shutdown(mut self, grace: Duration) -> ShutdownReport {
        self.shutdown.cancel();
        let deadline = tokio::time::Instant::now() + grace;

        let mut report = ShutdownReport::default();
        let mut stragglers = Vec::new();
        for mut handle in std::mem::take(&mut self.handles) {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => report.finished += 1,
                Ok(Err(e)) => {
                    warn!(error = %e, "Thumbnail worker ended abnormally");
                    report.finished += 1;
                }
                Err(_) => stragglers.push(handle),
            }
        }

        if !stragglers.is_empty() {
            self.context.disk_gate.close();
            self.context.render_gate.close();
            for handle in &stragglers {
                handle.abort();
            }
            report.aborted = stragglers.len();
            warn!(
                aborted = report.aborted,
                grace_ms = grace.as_millis() as u64,
                "Workers still busy after grace period, aborted"
            );
        }

        info!(finished = report.finished, aborted = report.aborted, "Thumbnail worker pool stopped");
        report
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run_worker(id: usize, context: Arc<PipelineContext>, shutdown: CancellationToken) {
    debug!(worker = id, "Thumbnail worker started");
    while !shutdown.is_cancelled() {
        let Some(request) = context.scheduler.dequeue(&shutdown).await else {
            break;
        };
        process_request(&context, request).await;
    }
    debug!(worker = id, "Thumbnail worker stopped");
}

/// Take one request from dequeue to resolution.
pub(crate) async fn process_request(context: &PipelineContext, request: QueuedRequest) {
    let lane = request.lane();
    let waited = request.waited();
    let pending = request.into_pending();
    pending.mark_processing();
    let path = pending.path().to_path_buf();

    trace!(
        path = %path.display(),
        ?lane,
        waited_ms = waited.as_millis() as u64,
        "Processing thumbnail request"
    );

    // Populated by another request while this one was queued.
    if let Some(thumbnail) = context.memory.peek(&path) {
        context.coalescer.complete(&pending, Some(thumbnail));
        return;
    }

    match generate(context, &path).await {
        Ok(thumbnail) => {
            let cached = context.memory.set(path.clone(), Arc::clone(&thumbnail));
            context.coalescer.complete(&pending, Some(thumbnail));
            if cached {
                context.notifier.notify(path);
            }
        }
        Err(error) => {
            record_failure(context, &path, &error);
            context.coalescer.complete(&pending, None);
        }
    }
}

async fn generate(context: &PipelineContext, path: &Path) -> Result<Thumbnail, ThumbnailError> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ThumbnailError::SourceNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(CacheError::Io(e).into()),
    };
    let key = DiskCacheKey::from_metadata(path, &metadata).map_err(CacheError::Io)?;

    match read_disk(context, &key).await {
        Ok(Some(image)) => {
            trace!(path = %path.display(), key = %key, "Disk cache hit");
            return Ok(Arc::new(image));
        }
        Ok(None) => {}
        Err(ThumbnailError::DiskIo(e)) => {
            warn!(path = %path.display(), error = %e, "Disk cache read failed, rendering instead");
        }
        Err(e) => return Err(e),
    }

    let thumbnail = Arc::new(render(context, path).await?);
    context.counters.record_render();

    persist(context, &key, &thumbnail).await?;
    Ok(thumbnail)
}

async fn read_disk(
    context: &PipelineContext,
    key: &DiskCacheKey,
) -> Result<Option<crate::renderer::RawImage>, ThumbnailError> {
    let _permit = context.disk_gate.acquire().await?;
    Ok(context.disk.read(key).await?)
}

async fn render(
    context: &PipelineContext,
    path: &Path,
) -> Result<crate::renderer::RawImage, ThumbnailError> {
    let _permit = context.render_gate.acquire().await?;
    let outcome = AssertUnwindSafe(context.renderer.render(path))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(image)) => Ok(image),
        Ok(Err(RenderError::NotFound(_))) => Err(ThumbnailError::SourceNotFound(path.to_path_buf())),
        Ok(Err(source)) => Err(ThumbnailError::DecodeFailure {
            path: path.to_path_buf(),
            source,
        }),
        Err(_) => Err(ThumbnailError::TaskPanicked(path.to_path_buf())),
    }
}

/// Best-effort: a failed write only costs a future re-render.
async fn persist(
    context: &PipelineContext,
    key: &DiskCacheKey,
    thumbnail: &Thumbnail,
) -> Result<(), ThumbnailError> {
    let _permit = context.disk_gate.acquire().await?;
    if let Err(e) = context.disk.write(key, thumbnail).await {
        warn!(key = %key, error = %e, "Failed to persist thumbnail to disk cache");
    }
    Ok(())
}

fn record_failure(context: &PipelineContext, path: &Path, error: &ThumbnailError) {
    match error {
        ThumbnailError::SourceNotFound(_) => {
            context.counters.record_source_missing();
            debug!(path = %path.display(), "Source missing, thumbnail unavailable");
        }
        ThumbnailError::DecodeFailure { .. } | ThumbnailError::TaskPanicked(_) => {
            context.counters.record_render_failure();
            warn!(path = %path.display(), error = %error, renderer = context.renderer.name(), "Thumbnail render failed");
        }
        ThumbnailError::ShutDown | ThumbnailError::Cancelled => {
            debug!(path = %path.display(), error = %error, "Thumbnail request abandoned");
        }
        ThumbnailError::DiskIo(_) => {
            warn!(path = %path.display(), error = %error, "Thumbnail request failed");
        }
    }
}
