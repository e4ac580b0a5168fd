//! Cache and pipeline statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use super::disk::DiskCacheStats;
use super::memory::MemoryCacheStats;

/// Counters maintained by the generation workers.
#[derive(Debug)]
pub struct PipelineCounters {
    renders: AtomicU64,
    render_failures: AtomicU64,
    sources_missing: AtomicU64,
    background_dropped: AtomicU64,
    since: parking_lot::Mutex<Instant>,
}

impl PipelineCounters {
    pub fn new() -> Self {
        Self {
            renders: AtomicU64::new(0),
            render_failures: AtomicU64::new(0),
            sources_missing: AtomicU64::new(0),
            background_dropped: AtomicU64::new(0),
            since: parking_lot::Mutex::new(Instant::now()),
        }
    }

    pub fn record_render(&self) {
        self.renders.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_render_failure(&self) {
        self.render_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_source_missing(&self) {
        self.sources_missing.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_background_dropped(&self) {
        self.background_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn renders(&self) -> u64 {
        self.renders.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.renders.store(0, Ordering::Relaxed);
        self.render_failures.store(0, Ordering::Relaxed);
        self.sources_missing.store(0, Ordering::Relaxed);
        self.background_dropped.store(0, Ordering::Relaxed);
        *self.since.lock() = Instant::now();
    }

    /// Combine with tier counters into a snapshot.
    pub fn snapshot(&self, memory: MemoryCacheStats, disk: DiskCacheStats) -> CacheStatistics {
        CacheStatistics {
            memory,
            disk,
            renders: self.renders.load(Ordering::Relaxed),
            render_failures: self.render_failures.load(Ordering::Relaxed),
            sources_missing: self.sources_missing.load(Ordering::Relaxed),
            background_dropped: self.background_dropped.load(Ordering::Relaxed),
            uptime_secs: self.since.lock().elapsed().as_secs(),
        }
    }
}

impl Default for PipelineCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time statistics for a thumbnail service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStatistics {
    pub memory: MemoryCacheStats,
    pub disk: DiskCacheStats,
    /// Successful renderer invocations
    pub renders: u64,
    /// Renderer errors and panics
    pub render_failures: u64,
    pub sources_missing: u64,
    /// Background requests dropped by lane overflow
    pub background_dropped: u64,
    /// Seconds since start or last reset
    pub uptime_secs: u64,
}

impl CacheStatistics {
    pub fn memory_hit_rate(&self) -> f64 {
        self.memory.hit_rate()
    }

    pub fn disk_hit_rate(&self) -> f64 {
        self.disk.hit_rate()
    }

    /// Fraction of lookups served from either tier.
    ///
    /// Disk lookups only happen after memory misses, so every request ends as
    /// a memory hit, a disk hit, or a disk miss.
    pub fn overall_hit_rate(&self) -> f64 {
        let hits = self.memory.hits + self.disk.hits;
        let total = hits + self.disk.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Format statistics as a human-readable report.
    pub fn format(&self) -> String {
        format!(
            r#"Thumbnail Cache Statistics
Uptime: {}s

MEMORY CACHE
  Entries:     {}
  Size:        {:.2} MB / {:.2} MB
  Hits:        {}
  Misses:      {}
  Hit Rate:    {:.1}%
  Evictions:   {}
  Rejected:    {}

DISK CACHE
  Hits:        {}
  Misses:      {}
  Hit Rate:    {:.1}%
  Writes:      {}
  Write Fails: {}
  Corrupt:     {}

GENERATION
  Renders:     {}
  Failures:    {}
  Missing:     {}
  Dropped:     {}

OVERALL
  Hit Rate:    {:.1}%"#,
            self.uptime_secs,
            self.memory.entry_count,
            self.memory.size_bytes as f64 / 1_048_576.0,
            self.memory.max_size_bytes as f64 / 1_048_576.0,
            self.memory.hits,
            self.memory.misses,
            self.memory_hit_rate() * 100.0,
            self.memory.evictions,
            self.memory.rejected,
            self.disk.hits,
            self.disk.misses,
            self.disk_hit_rate() * 100.0,
            self.disk.writes,
            self.disk.write_failures,
            self.disk.corrupt_removed,
            self.renders,
            self.render_failures,
            self.sources_missing,
            self.background_dropped,
            self.overall_hit_rate() * 100.0,
        )
    }
}
