//! Persistent thumbnail store.
//!
//! Layout: `{directory}/{hash[0..2]}/{hash}.png`, one PNG per
//! [`DiskCacheKey`]. Writes go to a temp file and are renamed into place, so
//! readers never observe a half-written artifact. Reads refresh the artifact's
//! modification time, which makes the retention sweep access-based.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime};

use image::ImageFormat;
use tracing::{debug, info, warn};

use super::key::{DiskCacheKey, ARTIFACT_EXTENSION};
use super::types::CacheError;
use crate::renderer::{RawImage, Thumbnail};

const TEMP_EXTENSION: &str = "tmp";

/// Outcome of a retention sweep or clear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepResult {
    pub entries_removed: usize,
    pub bytes_freed: u64,
    pub entries_kept: usize,
    pub duration_ms: u64,
}

/// Artifact count and total size on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskUsage {
    pub entries: usize,
    pub bytes: u64,
}

/// Snapshot of disk cache counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub write_failures: u64,
    pub corrupt_removed: u64,
}

impl DiskCacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// On-disk thumbnail cache.
#[derive(Debug)]
pub struct DiskCache {
    directory: PathBuf,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    write_failures: AtomicU64,
    corrupt_removed: AtomicU64,
}

impl DiskCache {
    /// Open (creating if needed) a cache rooted at `directory`.
    pub async fn open(directory: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let directory = directory.into();
        tokio::fs::create_dir_all(&directory).await?;
        info!(directory = %directory.display(), "Disk cache opened");
        Ok(Self {
            directory,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            corrupt_removed: AtomicU64::new(0),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Where the artifact for `key` lives.
    pub fn artifact_path(&self, key: &DiskCacheKey) -> PathBuf {
        self.directory.join(key.relative_path())
    }

    /// Load a stored thumbnail.
    ///
    /// An artifact that fails to decode is deleted and reported as a miss.
    pub async fn read(&self, key: &DiskCacheKey) -> Result<Option<RawImage>, CacheError> {
        let path = self.artifact_path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return Ok(None);
            }
            Err(e) => return Err(CacheError::Io(e)),
        };

        let touch_path = path.clone();
        let decoded = tokio::task::spawn_blocking(move || {
            let image = decode_artifact(&bytes)?;
            touch(&touch_path);
            Ok::<_, image::ImageError>(image)
        })
        .await
        .map_err(|e| CacheError::Spawn(e.to_string()))?;

        match decoded {
            Ok(image) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(image))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Corrupt thumbnail artifact, removing");
                self.corrupt_removed.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        debug!(path = %path.display(), error = %e, "Failed to remove corrupt artifact");
                    }
                }
                Ok(None)
            }
        }
    }

    /// Encode and store a thumbnail, replacing any existing artifact.
    pub async fn write(&self, key: &DiskCacheKey, image: &Thumbnail) -> Result<(), CacheError> {
        let result = self.write_inner(key, image).await;
        match &result {
            Ok(()) => {
                self.writes.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.write_failures.fetch_add(1, Ordering::Relaxed);
            }
        }
        result
    }

    async fn write_inner(&self, key: &DiskCacheKey, image: &Thumbnail) -> Result<(), CacheError> {
        let image = Thumbnail::clone(image);
        let encoded = tokio::task::spawn_blocking(move || encode_artifact(&image))
            .await
            .map_err(|e| CacheError::Spawn(e.to_string()))??;

        let path = self.artifact_path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp_path = path.with_extension(TEMP_EXTENSION);
        tokio::fs::write(&temp_path, &encoded).await?;
        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(CacheError::Io(e));
        }
        debug!(key = %key, bytes = encoded.len(), "Thumbnail artifact written");
        Ok(())
    }

    /// Delete one artifact. Returns whether it existed.
    pub async fn remove(&self, key: &DiskCacheKey) -> Result<bool, CacheError> {
        match tokio::fs::remove_file(self.artifact_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::Io(e)),
        }
    }

    pub async fn contains(&self, key: &DiskCacheKey) -> bool {
        tokio::fs::try_exists(self.artifact_path(key))
            .await
            .unwrap_or(false)
    }

    /// Delete artifacts whose modification time is older than `max_age`,
    /// then remove emptied shard directories.
    pub async fn sweep_older_than(&self, max_age: Duration) -> Result<SweepResult, CacheError> {
        let cutoff = SystemTime::now()
            .checked_sub(max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let result = self.sweep(Some(cutoff)).await?;
        if result.entries_removed > 0 {
            info!(
                entries_removed = result.entries_removed,
                bytes_freed = result.bytes_freed,
                entries_kept = result.entries_kept,
                duration_ms = result.duration_ms,
                "Disk cache retention sweep complete"
            );
        }
        Ok(result)
    }

    /// Delete every artifact.
    pub async fn clear(&self) -> Result<SweepResult, CacheError> {
        let result = self.sweep(None).await?;
        info!(
            entries_removed = result.entries_removed,
            bytes_freed = result.bytes_freed,
            "Disk cache cleared"
        );
        Ok(result)
    }

    async fn sweep(&self, cutoff: Option<SystemTime>) -> Result<SweepResult, CacheError> {
        let directory = self.directory.clone();
        tokio::task::spawn_blocking(move || sweep_blocking(&directory, cutoff))
            .await
            .map_err(|e| CacheError::Spawn(e.to_string()))
    }

    /// Scan the directory for artifact count and size.
    pub async fn usage(&self) -> Result<DiskUsage, CacheError> {
        let directory = self.directory.clone();
        tokio::task::spawn_blocking(move || {
            let mut files = Vec::new();
            collect_files_recursive(&directory, &mut files);
            let artifacts = files.iter().filter(|(path, _, _)| is_artifact(path));
            artifacts.fold(DiskUsage::default(), |usage, (_, _, size)| DiskUsage {
                entries: usage.entries + 1,
                bytes: usage.bytes + size,
            })
        })
        .await
        .map_err(|e| CacheError::Spawn(e.to_string()))
    }

    pub fn stats(&self) -> DiskCacheStats {
        DiskCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            corrupt_removed: self.corrupt_removed.load(Ordering::Relaxed),
        }
    }

    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.writes.store(0, Ordering::Relaxed);
        self.write_failures.store(0, Ordering::Relaxed);
        self.corrupt_removed.store(0, Ordering::Relaxed);
    }
}

fn encode_artifact(image: &RawImage) -> Result<Vec<u8>, CacheError> {
    let dynamic = image.to_dynamic().ok_or_else(|| {
        CacheError::Encode("pixel buffer does not match image dimensions".to_string())
    })?;
    let mut cursor = Cursor::new(Vec::new());
    dynamic
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|e| CacheError::Encode(e.to_string()))?;
    Ok(cursor.into_inner())
}

fn decode_artifact(bytes: &[u8]) -> Result<RawImage, image::ImageError> {
    image::load_from_memory_with_format(bytes, ImageFormat::Png).map(RawImage::from_dynamic)
}

/// Bump the artifact's mtime so retention treats it as recently used.
fn touch(path: &Path) {
    let result = std::fs::File::options()
        .write(true)
        .open(path)
        .and_then(|file| file.set_modified(SystemTime::now()));
    if let Err(e) = result {
        debug!(path = %path.display(), error = %e, "Failed to refresh artifact mtime");
    }
}

fn is_artifact(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == ARTIFACT_EXTENSION)
}

fn is_leftover_temp(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == TEMP_EXTENSION)
}

/// Remove artifacts (and orphaned temp files) older than `cutoff`, or all of
/// them when `cutoff` is `None`.
fn sweep_blocking(directory: &Path, cutoff: Option<SystemTime>) -> SweepResult {
    let start = Instant::now();
    let mut files = Vec::new();
    collect_files_recursive(directory, &mut files);

    let mut result = SweepResult::default();
    for (path, mtime, size) in files {
        if !is_artifact(&path) && !is_leftover_temp(&path) {
            continue;
        }
        let expired = cutoff.map_or(true, |cutoff| mtime < cutoff);
        if !expired {
            if is_artifact(&path) {
                result.entries_kept += 1;
            }
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => {
                if is_artifact(&path) {
                    result.entries_removed += 1;
                    result.bytes_freed += size;
                }
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Failed to remove artifact during sweep");
            }
        }
    }

    cleanup_empty_dirs(directory);
    result.duration_ms = start.elapsed().as_millis() as u64;
    result
}

fn collect_files_recursive(dir: &Path, files: &mut Vec<(PathBuf, SystemTime, u64)>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "Failed to read directory during scan");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files_recursive(&path, files);
        } else if let Ok(metadata) = entry.metadata() {
            let mtime = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((path, mtime, metadata.len()));
        }
    }
}

/// Remove empty shard directories below (not including) `dir`.
fn cleanup_empty_dirs(dir: &Path) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            cleanup_empty_dirs(&path);
            // Fails harmlessly when not empty.
            let _ = std::fs::remove_dir(&path);
        }
    }
}
