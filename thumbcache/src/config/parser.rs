//! INI parsing logic for converting an `Ini` into a `ConfigFile`.

use std::path::PathBuf;
use std::str::FromStr;

use ini::Ini;

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use super::size::parse_size;

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse a number, optionally requiring it to be at least 1.
fn parse_number<T>(section: &str, key: &str, value: &str, positive: bool) -> Result<T, ConfigFileError>
where
    T: FromStr + PartialOrd + From<u8>,
{
    let parsed: T = value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, "must be a non-negative integer"))?;
    if positive && parsed < T::from(1) {
        return Err(invalid(section, key, value, "must be at least 1"));
    }
    Ok(parsed)
}

fn optional_path(value: &str) -> Option<PathBuf> {
    let value = value.trim();
    (!value.is_empty()).then(|| PathBuf::from(value))
}

/// Parse INI content over the defaults. Unknown keys are ignored.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [cache]
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("directory") {
            if let Some(path) = optional_path(v) {
                config.cache.directory = path;
            }
        }
        if let Some(v) = section.get("memory_size") {
            let size = parse_size(v).map_err(|e| invalid("cache", "memory_size", v, &e.to_string()))?;
            if size == 0 {
                return Err(invalid("cache", "memory_size", v, "must be greater than zero"));
            }
            config.cache.memory_size = size;
        }
        if let Some(v) = section.get("disk_retention_days") {
            config.cache.disk_retention_days = parse_number("cache", "disk_retention_days", v, false)?;
        }
        if let Some(v) = section.get("memory_idle_minutes") {
            config.cache.memory_idle_minutes = parse_number("cache", "memory_idle_minutes", v, false)?;
        }
        if let Some(v) = section.get("sweep_interval_secs") {
            config.cache.sweep_interval_secs = parse_number("cache", "sweep_interval_secs", v, true)?;
        }
    }

    // [pipeline]
    if let Some(section) = ini.section(Some("pipeline")) {
        if let Some(v) = section.get("workers") {
            config.pipeline.workers = parse_number("pipeline", "workers", v, true)?;
        }
        if let Some(v) = section.get("disk_concurrency") {
            config.pipeline.disk_concurrency = parse_number("pipeline", "disk_concurrency", v, true)?;
        }
        if let Some(v) = section.get("render_concurrency") {
            config.pipeline.render_concurrency =
                parse_number("pipeline", "render_concurrency", v, true)?;
        }
        if let Some(v) = section.get("background_capacity") {
            config.pipeline.background_capacity =
                parse_number("pipeline", "background_capacity", v, true)?;
        }
    }

    // [thumbnail]
    if let Some(section) = ini.section(Some("thumbnail")) {
        if let Some(v) = section.get("size") {
            config.thumbnail.size = parse_number("thumbnail", "size", v, true)?;
        }
    }

    // [logging]
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("level") {
            let v = v.trim();
            if v.is_empty() {
                return Err(invalid("logging", "level", v, "must not be empty"));
            }
            config.logging.level = v.to_string();
        }
        if let Some(v) = section.get("file") {
            config.logging.file = optional_path(v);
        }
    }

    Ok(config)
}
