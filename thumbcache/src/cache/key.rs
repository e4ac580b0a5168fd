//! Fingerprint keys for the disk cache.

use std::fmt;
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

/// File extension of stored artifacts.
pub const ARTIFACT_EXTENSION: &str = "png";

/// Disk cache key derived from a source's absolute path and modification time.
///
/// Touching or rewriting the source changes the key, so a stale artifact is
/// simply never looked up again and ages out through the retention sweep.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiskCacheKey {
    digest: String,
}

impl DiskCacheKey {
    /// Fingerprint `path` as last modified at `modified`.
    pub fn new(path: &Path, modified: SystemTime) -> Self {
        let stamp: i128 = match modified.duration_since(UNIX_EPOCH) {
            Ok(after) => after.as_nanos() as i128,
            Err(before) => -(before.duration().as_nanos() as i128),
        };

        let mut hasher = Sha256::new();
        hasher.update(path.as_os_str().as_encoded_bytes());
        hasher.update(b"|");
        hasher.update(stamp.to_le_bytes());

        Self {
            digest: format!("{:x}", hasher.finalize()),
        }
    }

    pub fn from_metadata(path: &Path, metadata: &Metadata) -> io::Result<Self> {
        Ok(Self::new(path, metadata.modified()?))
    }

    /// Stat the source and fingerprint it.
    pub async fn for_source(path: &Path) -> io::Result<Self> {
        let metadata = tokio::fs::metadata(path).await?;
        Self::from_metadata(path, &metadata)
    }

    /// 64-character lowercase hex digest.
    pub fn as_str(&self) -> &str {
        &self.digest
    }

    /// Shard directory name (first two hex characters).
    pub fn shard(&self) -> &str {
        &self.digest[..2]
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", self.digest, ARTIFACT_EXTENSION)
    }

    /// Location relative to the cache directory.
    pub fn relative_path(&self) -> PathBuf {
        Path::new(self.shard()).join(self.file_name())
    }
}

impl fmt::Display for DiskCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_key_is_deterministic() {
        let t = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let a = DiskCacheKey::new(Path::new("/photos/a.jpg"), t);
        let b = DiskCacheKey::new(Path::new("/photos/a.jpg"), t);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_mtime_change_changes_key() {
        let t = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let a = DiskCacheKey::new(Path::new("/photos/a.jpg"), t);
        let b = DiskCacheKey::new(Path::new("/photos/a.jpg"), t + Duration::from_nanos(1));
        assert_ne!(a, b);
    }

    #[test]
    fn test_path_change_changes_key() {
        let t = UNIX_EPOCH + Duration::from_secs(10);
        let a = DiskCacheKey::new(Path::new("/photos/a.jpg"), t);
        let b = DiskCacheKey::new(Path::new("/photos/b.jpg"), t);
        assert_ne!(a, b);
    }

    #[test]
    fn test_pre_epoch_times_are_distinct() {
        let path = Path::new("/old.jpg");
        let before = DiskCacheKey::new(path, UNIX_EPOCH - Duration::from_secs(5));
        let after = DiskCacheKey::new(path, UNIX_EPOCH + Duration::from_secs(5));
        assert_ne!(before, after);
    }

    #[test]
    fn test_layout() {
        let key = DiskCacheKey::new(Path::new("/x.png"), UNIX_EPOCH);
        let rel = key.relative_path();
        assert_eq!(rel.parent().unwrap(), Path::new(key.shard()));
        assert_eq!(
            rel.file_name().unwrap().to_str().unwrap(),
            format!("{}.png", key.as_str())
        );
        assert_eq!(key.to_string(), key.as_str());
    }

    #[tokio::test]
    async fn test_for_source_reads_mtime() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"x").unwrap();
        let modified = std::fs::metadata(&path).unwrap().modified().unwrap();

        let key = DiskCacheKey::for_source(&path).await.unwrap();
        assert_eq!(key, DiskCacheKey::new(&path, modified));
        assert!(DiskCacheKey::for_source(&dir.path().join("nope")).await.is_err());
    }
}
