//! Configuration file support.
//!
//! `config.ini` is an INI file with `[cache]`, `[pipeline]`, `[thumbnail]` and
//! `[logging]` sections. A missing file means defaults; invalid values are
//! reported with their section and key.
//!
//! ```ignore
//! use thumbcache::config::ConfigFile;
//!
//! let config = ConfigFile::load()?;
//! let service_config = config.to_service_config();
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod size;
mod writer;

pub use defaults::*;
pub use file::{config_file_path, ConfigFileError};
pub use settings::{
    duration_from_days, duration_from_minutes, CacheSettings, ConfigFile, LoggingSettings,
    PipelineSettings, ThumbnailSettings,
};
pub use size::{format_size, parse_size, SizeParseError};
