//! Background maintenance for both cache tiers.
//!
//! Every `interval` the daemon evicts idle memory entries (when an idle limit
//! is configured), sweeps disk artifacts past the retention age, and logs a
//! statistics line. It stops when its cancellation token fires.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::disk::DiskCache;
use super::ThumbnailMemoryCache;

/// Maintenance schedule and limits.
#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// Time between maintenance cycles
    pub interval: Duration,
    /// Evict memory entries idle longer than this
    pub memory_max_idle: Option<Duration>,
    /// Delete disk artifacts not accessed for this long
    pub disk_retention: Option<Duration>,
}

/// What one maintenance cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub memory_evicted: usize,
    pub disk_removed: usize,
    pub disk_bytes_freed: u64,
}

/// Handle to the running maintenance task.
pub struct MaintenanceDaemon {
    handle: Option<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl MaintenanceDaemon {
    /// Spawn the maintenance loop on the current tokio runtime.
    pub fn start(
        memory: Arc<ThumbnailMemoryCache>,
        disk: Arc<DiskCache>,
        config: MaintenanceConfig,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();

        info!(
            interval_secs = config.interval.as_secs(),
            memory_max_idle_secs = config.memory_max_idle.map(|d| d.as_secs()),
            disk_retention_secs = config.disk_retention.map(|d| d.as_secs()),
            "Cache maintenance daemon started"
        );

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Cache maintenance daemon shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(config.interval) => {
                        Self::run_cycle(&memory, &disk, &config).await;
                    }
                }
            }
        });

        Self {
            handle: Some(handle),
            shutdown,
        }
    }

    /// Run one maintenance pass.
    pub async fn run_cycle(
        memory: &ThumbnailMemoryCache,
        disk: &DiskCache,
        config: &MaintenanceConfig,
    ) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        if let Some(max_idle) = config.memory_max_idle {
            report.memory_evicted = memory.evict_older_than(max_idle);
        }

        if let Some(retention) = config.disk_retention {
            match disk.sweep_older_than(retention).await {
                Ok(result) => {
                    report.disk_removed = result.entries_removed;
                    report.disk_bytes_freed = result.bytes_freed;
                }
                Err(e) => warn!(error = %e, "Disk retention sweep failed"),
            }
        }

        let memory_stats = memory.statistics();
        let disk_stats = disk.stats();
        info!(
            memory_entries = memory_stats.entry_count,
            memory_bytes = memory_stats.size_bytes,
            memory_hit_rate = format!("{:.1}%", memory_stats.hit_rate() * 100.0),
            disk_hit_rate = format!("{:.1}%", disk_stats.hit_rate() * 100.0),
            memory_evicted = report.memory_evicted,
            disk_removed = report.disk_removed,
            "Cache maintenance cycle"
        );

        report
    }

    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Cache maintenance task ended abnormally");
            }
        }
    }
}

impl Drop for MaintenanceDaemon {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
