//! Typed configuration for [`ThumbnailService`](super::ThumbnailService).

use std::path::PathBuf;
use std::time::Duration;

use super::error::ServiceError;
use crate::config::{
    default_cache_directory, default_worker_count, DEFAULT_BACKGROUND_CAPACITY,
    DEFAULT_DISK_CONCURRENCY, DEFAULT_DISK_RETENTION_DAYS, DEFAULT_MEMORY_CACHE_SIZE,
    DEFAULT_NOTIFICATION_CAPACITY, DEFAULT_RENDER_CONCURRENCY, DEFAULT_SWEEP_INTERVAL_SECS,
};
use crate::pipeline::PipelineLimits;

/// Service construction parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailServiceConfig {
    /// Disk cache directory
    pub cache_dir: PathBuf,
    /// Memory cache budget in bytes
    pub memory_max_bytes: u64,
    /// Evict memory entries idle longer than this during maintenance
    pub memory_max_idle: Option<Duration>,
    /// Background lane capacity
    pub background_capacity: usize,
    pub worker_count: usize,
    pub disk_concurrency: usize,
    pub render_concurrency: usize,
    /// Sweep disk artifacts unused for this long
    pub disk_retention: Option<Duration>,
    /// Time between maintenance cycles
    pub sweep_interval: Duration,
    /// Per-subscriber ready notification buffer
    pub notification_capacity: usize,
}

impl Default for ThumbnailServiceConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_directory(),
            memory_max_bytes: DEFAULT_MEMORY_CACHE_SIZE,
            memory_max_idle: None,
            background_capacity: DEFAULT_BACKGROUND_CAPACITY,
            worker_count: default_worker_count(),
            disk_concurrency: DEFAULT_DISK_CONCURRENCY,
            render_concurrency: DEFAULT_RENDER_CONCURRENCY,
            disk_retention: Some(Duration::from_secs(DEFAULT_DISK_RETENTION_DAYS * 86_400)),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
        }
    }
}

impl ThumbnailServiceConfig {
    /// Defaults with a specific cache directory.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_memory_size(mut self, bytes: u64) -> Self {
        self.memory_max_bytes = bytes;
        self
    }

    pub fn with_memory_max_idle(mut self, max_idle: Option<Duration>) -> Self {
        self.memory_max_idle = max_idle;
        self
    }

    pub fn with_background_capacity(mut self, capacity: usize) -> Self {
        self.background_capacity = capacity;
        self
    }

    pub fn with_workers(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    pub fn with_disk_concurrency(mut self, limit: usize) -> Self {
        self.disk_concurrency = limit;
        self
    }

    pub fn with_render_concurrency(mut self, limit: usize) -> Self {
        self.render_concurrency = limit;
        self
    }

    pub fn with_disk_retention(mut self, retention: Option<Duration>) -> Self {
        self.disk_retention = retention;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_notification_capacity(mut self, capacity: usize) -> Self {
        self.notification_capacity = capacity;
        self
    }

    /// Check every limit is usable.
    pub fn validate(&self) -> Result<(), ServiceError> {
        let checks = [
            (self.memory_max_bytes == 0, "memory_max_bytes must be greater than zero"),
            (self.background_capacity == 0, "background_capacity must be at least 1"),
            (self.worker_count == 0, "worker_count must be at least 1"),
            (self.disk_concurrency == 0, "disk_concurrency must be at least 1"),
            (self.render_concurrency == 0, "render_concurrency must be at least 1"),
            (self.sweep_interval.is_zero(), "sweep_interval must be non-zero"),
            (self.notification_capacity == 0, "notification_capacity must be at least 1"),
        ];
        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, reason)) => Err(ServiceError::Config(reason.to_string())),
            None => Ok(()),
        }
    }

    pub(crate) fn pipeline_limits(&self) -> PipelineLimits {
        PipelineLimits {
            background_capacity: self.background_capacity,
            disk_concurrency: self.disk_concurrency,
            render_concurrency: self.render_concurrency,
            notification_capacity: self.notification_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ThumbnailServiceConfig::default();
        assert_eq!(config.background_capacity, 500);
        assert_eq!(config.disk_concurrency, 2);
        assert_eq!(config.render_concurrency, 4);
        assert_eq!(config.disk_retention, Some(Duration::from_secs(30 * 86_400)));
        assert!(config.worker_count >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builders() {
        let config = ThumbnailServiceConfig::new("/tmp/x")
            .with_memory_size(1024)
            .with_workers(2)
            .with_background_capacity(3)
            .with_disk_concurrency(1)
            .with_render_concurrency(1)
            .with_notification_capacity(4)
            .with_sweep_interval(Duration::from_secs(1))
            .with_disk_retention(None)
            .with_memory_max_idle(Some(Duration::from_secs(5)));

        assert_eq!(config.cache_dir, PathBuf::from("/tmp/x"));
        assert_eq!(config.memory_max_bytes, 1024);
        assert_eq!(config.pipeline_limits().background_capacity, 3);
        assert_eq!(config.memory_max_idle, Some(Duration::from_secs(5)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zeroes() {
        let zero_memory = ThumbnailServiceConfig::default().with_memory_size(0);
        assert!(matches!(zero_memory.validate(), Err(ServiceError::Config(_))));

        let zero_workers = ThumbnailServiceConfig::default().with_workers(0);
        let err = zero_workers.validate().unwrap_err();
        assert!(err.to_string().contains("worker_count"));

        let zero_interval = ThumbnailServiceConfig::default().with_sweep_interval(Duration::ZERO);
        assert!(zero_interval.validate().is_err());
    }
}
