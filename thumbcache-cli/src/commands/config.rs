//! Configuration management CLI commands.

use std::path::Path;

use clap::Subcommand;
use thumbcache::config::ConfigFile;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand against the file at `path`.
pub fn run(command: ConfigCommands, path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init { force } => run_init(path, force),
        ConfigCommands::Show => run_show(path),
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn run_init(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::AlreadyExists(path.to_path_buf()));
    }
    ConfigFile::default().save_to(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn run_show(path: &Path) -> Result<(), CliError> {
    let config = ConfigFile::load_from(path)?;
    if !path.exists() {
        println!("# {} not found, showing defaults", path.display());
    }
    print!("{}", config.to_config_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_loadable_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/config.ini");

        run_init(&path, false).unwrap();
        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded, ConfigFile::default());
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[thumbnail]\nsize = 128\n").unwrap();

        assert!(matches!(
            run_init(&path, false),
            Err(CliError::AlreadyExists(_))
        ));
        run_init(&path, true).unwrap();
        assert_eq!(ConfigFile::load_from(&path).unwrap(), ConfigFile::default());
    }
}
