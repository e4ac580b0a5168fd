//! Default values shared by the typed service config and the INI file.

use std::path::PathBuf;

/// Memory cache budget: 256 MB
pub const DEFAULT_MEMORY_CACHE_SIZE: u64 = 256 * 1024 * 1024;

/// Background lane capacity before drop-oldest kicks in
pub const DEFAULT_BACKGROUND_CAPACITY: usize = 500;

/// Concurrent disk cache reads and writes
pub const DEFAULT_DISK_CONCURRENCY: usize = 2;

/// Concurrent renderer invocations
pub const DEFAULT_RENDER_CONCURRENCY: usize = 4;

/// Disk artifacts not read for this many days are swept
pub const DEFAULT_DISK_RETENTION_DAYS: u64 = 30;

/// Seconds between maintenance cycles
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

/// Undelivered ready notices kept per subscriber
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 1024;

/// Seconds in-flight work gets to finish on shutdown
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;

/// Default log level when `RUST_LOG` is unset
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// One worker per available CPU.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(4)
}

/// `{cache_dir}/thumbcache/thumbnails`, falling back to the temp directory.
pub fn default_cache_directory() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("thumbcache")
        .join("thumbnails")
}

/// `{config_dir}/thumbcache`, falling back to the working directory.
pub fn config_directory() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("thumbcache")
}
