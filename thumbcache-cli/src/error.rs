//! CLI error handling with user-friendly messages.

use std::fmt;
use std::path::PathBuf;
use std::process;

use thumbcache::config::ConfigFileError;
use thumbcache::logging::LoggingError;
use thumbcache::service::ServiceError;

/// CLI-specific errors.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(LoggingError),
    /// Configuration file could not be read or written
    Config(ConfigFileError),
    /// Service could not start or failed during a command
    Service(ServiceError),
    /// A command's input directory is missing or unreadable
    Input { path: PathBuf, error: std::io::Error },
    /// Refused to overwrite an existing file
    AlreadyExists(PathBuf),
}

impl CliError {
    /// Exit the process with an error message and code 1.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::Config(ConfigFileError::InvalidValue { .. }) = self {
            eprintln!();
            eprintln!("Run 'thumbcache config path' to locate the configuration file.");
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Service(e) => write!(f, "Thumbnail service error: {}", e),
            CliError::Input { path, error } => {
                write!(f, "Cannot read '{}': {}", path.display(), error)
            }
            CliError::AlreadyExists(path) => write!(
                f,
                "'{}' already exists (use --force to overwrite)",
                path.display()
            ),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::LoggingInit(e) => Some(e),
            CliError::Config(e) => Some(e),
            CliError::Service(e) => Some(e),
            CliError::Input { error, .. } => Some(error),
            CliError::AlreadyExists(_) => None,
        }
    }
}

impl From<ServiceError> for CliError {
    fn from(e: ServiceError) -> Self {
        CliError::Service(e)
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::LoggingInit(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_context() {
        let err = CliError::AlreadyExists(PathBuf::from("/tmp/config.ini"));
        assert!(err.to_string().contains("/tmp/config.ini"));

        let err = CliError::Service(ServiceError::AlreadyShutDown);
        assert!(err.to_string().starts_with("Thumbnail service error"));
    }
}
