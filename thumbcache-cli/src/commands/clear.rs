//! `thumbcache clear`

use thumbcache::cache::DiskCache;
use thumbcache::config::{format_size, ConfigFile};
use thumbcache::service::ServiceError;

use crate::error::CliError;

pub async fn run(config: &ConfigFile) -> Result<(), CliError> {
    let directory = &config.cache.directory;
    println!("Clearing disk cache at: {}", directory.display());

    let disk = DiskCache::open(directory).await.map_err(ServiceError::from)?;
    let result = disk.clear().await.map_err(ServiceError::from)?;

    println!(
        "Deleted {} artifacts, freed {}",
        result.entries_removed,
        format_size(result.bytes_freed)
    );
    Ok(())
}
