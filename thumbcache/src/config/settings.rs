//! Settings structs for each configuration section.
//!
//! Each struct maps to one `[section]` of `config.ini`.

use std::path::PathBuf;
use std::time::Duration;

use super::defaults::*;
use crate::renderer::DEFAULT_THUMBNAIL_SIZE;
use crate::service::ThumbnailServiceConfig;

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub cache: CacheSettings,
    pub pipeline: PipelineSettings,
    pub thumbnail: ThumbnailSettings,
    pub logging: LoggingSettings,
}

/// `[cache]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Disk cache directory
    pub directory: PathBuf,
    /// Memory cache budget in bytes
    pub memory_size: u64,
    /// Sweep disk artifacts unused for this many days (0 disables)
    pub disk_retention_days: u64,
    /// Evict memory entries idle for this many minutes (0 disables)
    pub memory_idle_minutes: u64,
    /// Seconds between maintenance cycles
    pub sweep_interval_secs: u64,
}

/// `[pipeline]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub workers: usize,
    pub disk_concurrency: usize,
    pub render_concurrency: usize,
    pub background_capacity: usize,
}

/// `[thumbnail]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailSettings {
    /// Bounding box edge in pixels
    pub size: u32,
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Filter used when `RUST_LOG` is unset
    pub level: String,
    /// Also write logs to this file
    pub file: Option<PathBuf>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            cache: CacheSettings {
                directory: default_cache_directory(),
                memory_size: DEFAULT_MEMORY_CACHE_SIZE,
                disk_retention_days: DEFAULT_DISK_RETENTION_DAYS,
                memory_idle_minutes: 0,
                sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            },
            pipeline: PipelineSettings {
                workers: default_worker_count(),
                disk_concurrency: DEFAULT_DISK_CONCURRENCY,
                render_concurrency: DEFAULT_RENDER_CONCURRENCY,
                background_capacity: DEFAULT_BACKGROUND_CAPACITY,
            },
            thumbnail: ThumbnailSettings {
                size: DEFAULT_THUMBNAIL_SIZE,
            },
            logging: LoggingSettings {
                level: DEFAULT_LOG_LEVEL.to_string(),
                file: None,
            },
        }
    }
}

/// Whole days as a duration, saturating for absurdly large values.
pub fn duration_from_days(days: u64) -> Duration {
    Duration::from_secs(days.saturating_mul(86_400))
}

pub fn duration_from_minutes(minutes: u64) -> Duration {
    Duration::from_secs(minutes.saturating_mul(60))
}

impl ConfigFile {
    /// Build the typed service configuration from file settings.
    pub fn to_service_config(&self) -> ThumbnailServiceConfig {
        let retention = (self.cache.disk_retention_days > 0)
            .then(|| duration_from_days(self.cache.disk_retention_days));
        let idle = (self.cache.memory_idle_minutes > 0)
            .then(|| duration_from_minutes(self.cache.memory_idle_minutes));

        ThumbnailServiceConfig::new(self.cache.directory.clone())
            .with_memory_size(self.cache.memory_size)
            .with_disk_retention(retention)
            .with_memory_max_idle(idle)
            .with_sweep_interval(Duration::from_secs(self.cache.sweep_interval_secs))
            .with_workers(self.pipeline.workers)
            .with_disk_concurrency(self.pipeline.disk_concurrency)
            .with_render_concurrency(self.pipeline.render_concurrency)
            .with_background_capacity(self.pipeline.background_capacity)
    }
}
