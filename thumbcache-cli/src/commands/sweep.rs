//! `thumbcache sweep`

use thumbcache::cache::DiskCache;
use thumbcache::config::{duration_from_days, format_size, ConfigFile};
use thumbcache::service::ServiceError;

use crate::error::CliError;

pub async fn run(config: &ConfigFile, max_age_days: Option<u64>) -> Result<(), CliError> {
    let days = max_age_days.unwrap_or(config.cache.disk_retention_days);
    if days == 0 {
        println!("Disk retention is disabled; nothing to sweep.");
        return Ok(());
    }

    let disk = DiskCache::open(&config.cache.directory)
        .await
        .map_err(ServiceError::from)?;
    let result = disk
        .sweep_older_than(duration_from_days(days))
        .await
        .map_err(ServiceError::from)?;

    println!(
        "Swept {}: removed {} artifacts ({}), kept {} in {} ms",
        disk.directory().display(),
        result.entries_removed,
        format_size(result.bytes_freed),
        result.entries_kept,
        result.duration_ms
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_huge_max_age_keeps_everything() {
        let dir = TempDir::new().unwrap();
        let mut config = ConfigFile::default();
        config.cache.directory = dir.path().join("cache");
        let shard = config.cache.directory.join("ab");
        std::fs::create_dir_all(&shard).unwrap();
        let artifact = shard.join(format!("ab{}.png", "0".repeat(62)));
        std::fs::write(&artifact, b"png").unwrap();

        run(&config, Some(u64::MAX)).await.unwrap();
        assert!(artifact.exists());
    }
}
