//! INI serialization for saving a `ConfigFile`.

use super::settings::ConfigFile;
use super::size::format_size;

/// Render a commented INI document.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let log_file = config
        .logging
        .file
        .as_ref()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();

    format!(
        r#"[cache]
; Directory holding generated thumbnail artifacts
directory = {}
; In-memory cache budget (e.g. 256MB, 1GB)
memory_size = {}
; Delete disk artifacts not read for this many days (0 = keep forever)
disk_retention_days = {}
; Drop memory entries idle for this many minutes (0 = only evict on pressure)
memory_idle_minutes = {}
; Seconds between maintenance passes
sweep_interval_secs = {}

[pipeline]
; Generation workers (default: number of CPUs)
workers = {}
; Concurrent disk cache reads/writes
disk_concurrency = {}
; Concurrent renders
render_concurrency = {}
; Background requests queued before the oldest is dropped
background_capacity = {}

[thumbnail]
; Bounding box edge in pixels
size = {}

[logging]
; Log filter when RUST_LOG is unset (error, warn, info, debug, trace)
level = {}
; Optional log file path (empty = console only)
file = {}
"#,
        config.cache.directory.to_string_lossy(),
        format_size(config.cache.memory_size),
        config.cache.disk_retention_days,
        config.cache.memory_idle_minutes,
        config.cache.sweep_interval_secs,
        config.pipeline.workers,
        config.pipeline.disk_concurrency,
        config.pipeline.render_concurrency,
        config.pipeline.background_capacity,
        config.thumbnail.size,
        config.logging.level,
        log_file,
    )
}
