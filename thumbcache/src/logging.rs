//! Logging setup for thumbcache binaries.
//!
//! Console output goes to stderr so command output on stdout stays clean.
//! An optional log file is truncated at session start. `RUST_LOG` overrides
//! the configured level when set.

use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::DEFAULT_LOG_LEVEL;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("log file error: {0}")]
    Io(#[from] io::Error),
    #[error("log file path has no file name: {0}")]
    InvalidPath(PathBuf),
    #[error("failed to install subscriber: {0}")]
    Init(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingOptions {
    /// Filter directive used when `RUST_LOG` is unset (e.g. "info", "thumbcache=debug")
    pub level: String,
    /// Also write to this file
    pub log_file: Option<PathBuf>,
    /// Colored console output
    pub ansi: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            log_file: None,
            ansi: true,
        }
    }
}

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping it flushes and closes the log file writer.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails if the log file cannot be prepared or a subscriber is already set.
pub fn init_logging(options: &LoggingOptions) -> Result<LoggingGuard, LoggingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&options.level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(options.ansi)
        .with_target(false);

    let (file_layer, file_guard) = match &options.log_file {
        Some(path) => {
            let (dir, name) = prepare_log_file(path)?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Create the parent directory and truncate the file.
fn prepare_log_file(path: &std::path::Path) -> Result<(PathBuf, PathBuf), LoggingError> {
    let name = path
        .file_name()
        .ok_or_else(|| LoggingError::InvalidPath(path.to_path_buf()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;
    fs::write(path, "")?;
    Ok((dir, PathBuf::from(name)))
}
