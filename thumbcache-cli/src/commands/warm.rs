//! `thumbcache warm`: generate thumbnails for a directory of images.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thumbcache::config::ConfigFile;
use thumbcache::pipeline::Priority;
use thumbcache::renderer::{is_supported_image, ImageRenderer};
use thumbcache::service::{ThumbnailService, DEFAULT_SHUTDOWN_GRACE};
use tracing::debug;

use crate::error::CliError;

pub async fn run(
    config: &ConfigFile,
    dir: &Path,
    background: bool,
    recursive: bool,
) -> Result<(), CliError> {
    let files = collect_images(dir, recursive).map_err(|error| CliError::Input {
        path: dir.to_path_buf(),
        error,
    })?;
    if files.is_empty() {
        println!("No supported images found in {}", dir.display());
        return Ok(());
    }

    let priority = if background {
        Priority::Background
    } else {
        Priority::Interactive
    };
    let renderer = Arc::new(ImageRenderer::new(config.thumbnail.size));
    let service = ThumbnailService::start(config.to_service_config(), renderer).await?;

    println!("Warming {} images from {}", files.len(), dir.display());
    let tickets: Vec<_> = files
        .iter()
        .map(|path| (path, service.request(path, priority)))
        .collect();

    let mut ready = 0usize;
    let mut unavailable = 0usize;
    for (path, ticket) in tickets {
        match ticket.wait().await {
            Some(_) => ready += 1,
            None => {
                debug!(path = %path.display(), "Thumbnail unavailable");
                unavailable += 1;
            }
        }
    }

    println!("Ready: {}  Unavailable: {}", ready, unavailable);
    println!();
    println!("{}", service.statistics().format());

    service.shutdown(DEFAULT_SHUTDOWN_GRACE).await?;
    Ok(())
}

/// Supported image files under `dir`, sorted for stable ordering.
fn collect_images(dir: &Path, recursive: bool) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                if recursive {
                    pending.push(path);
                }
            } else if is_supported_image(&path) {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_images_filters_and_recurses() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b.png"), b"").unwrap();

        let flat = collect_images(dir.path(), false).unwrap();
        assert_eq!(flat, vec![dir.path().join("a.jpg")]);

        let deep = collect_images(dir.path(), true).unwrap();
        assert_eq!(
            deep,
            vec![dir.path().join("a.jpg"), dir.path().join("sub/b.png")]
        );
    }

    #[test]
    fn test_collect_images_missing_dir() {
        let dir = TempDir::new().unwrap();
        assert!(collect_images(&dir.path().join("missing"), true).is_err());
    }
}
