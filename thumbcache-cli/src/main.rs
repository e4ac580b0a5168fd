//! Thumbcache CLI - warm, sweep and inspect a thumbnail cache.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use thumbcache::config::{config_file_path, ConfigFile};
use thumbcache::logging::{init_logging, LoggingGuard, LoggingOptions};

use commands::config::ConfigCommands;
use error::CliError;

#[derive(Parser)]
#[command(name = "thumbcache")]
#[command(version = thumbcache::VERSION)]
#[command(about = "Generate and manage cached thumbnails for media libraries", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the per-user config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate thumbnails for every image in a directory
    Warm {
        /// Directory to scan
        dir: PathBuf,

        /// Queue everything in the background lane
        #[arg(long)]
        background: bool,

        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,
    },

    /// Remove disk artifacts unused for longer than the retention period
    Sweep {
        /// Override the configured retention, in days
        #[arg(long)]
        max_age_days: Option<u64>,
    },

    /// Delete every disk artifact
    Clear,

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(config_file_path);

    // Config subcommands must work even when the file is broken.
    let command = match cli.command {
        Commands::Config { command } => {
            if let Err(e) = commands::config::run(command, &config_path) {
                e.exit();
            }
            return;
        }
        other => other,
    };

    let config = match ConfigFile::load_from(&config_path) {
        Ok(config) => config,
        Err(e) => CliError::from(e).exit(),
    };

    let _guard = match setup_logging(&config, cli.verbose) {
        Ok(guard) => guard,
        Err(e) => e.exit(),
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(async {
        match command {
            Commands::Warm {
                dir,
                background,
                recursive,
            } => commands::warm::run(&config, &dir, background, recursive).await,
            Commands::Sweep { max_age_days } => commands::sweep::run(&config, max_age_days).await,
            Commands::Clear => commands::clear::run(&config).await,
            Commands::Config { .. } => Ok(()),
        }
    });

    if let Err(e) = result {
        e.exit();
    }
}

fn setup_logging(config: &ConfigFile, verbose: bool) -> Result<LoggingGuard, CliError> {
    let level = if verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    let options = LoggingOptions {
        level,
        log_file: config.logging.file.clone(),
        ..LoggingOptions::default()
    };
    Ok(init_logging(&options)?)
}
