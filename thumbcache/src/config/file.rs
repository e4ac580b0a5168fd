//! Configuration file loading and saving.

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

use super::defaults::config_directory;
use super::settings::ConfigFile;

/// Errors that can occur when loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

impl ConfigFile {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Save configuration to the default path.
    pub fn save(&self) -> Result<(), ConfigFileError> {
        self.save_to(&config_file_path())
    }

    /// Save configuration to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }
        let content = super::writer::to_config_string(self);
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// The INI text `save_to` would write.
    pub fn to_config_string(&self) -> String {
        super::writer::to_config_string(self)
    }
}

/// `{config_dir}/thumbcache/config.ini`
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&dir.path().join("none.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.ini");
        let mut config = ConfigFile::default();
        config.pipeline.background_capacity = 42;
        config.thumbnail.size = 96;

        config.save_to(&path).unwrap();
        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_value_surfaces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[thumbnail]\nsize = huge\n").unwrap();

        let err = ConfigFile::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigFileError::InvalidValue { .. }));
    }

    #[test]
    fn test_config_file_path() {
        assert!(config_file_path().ends_with("thumbcache/config.ini"));
    }
}
