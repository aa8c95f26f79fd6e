//! tilekeep CLI - operator front-end for the interception layer
//!
//! Drives the same install, activate, request and clean signals a host
//! would, against the on-disk partition store.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tilekeep::config::ConfigFile;
use tilekeep::logging::{init_logging, LoggingGuard};

use commands::common::GlobalOptions;
use commands::config::ConfigCommands;
use error::CliError;

#[derive(Parser)]
#[command(name = "tilekeep")]
#[command(version = tilekeep::VERSION)]
#[command(about = "Offline-tolerant map tile cache", long_about = None)]
struct Cli {
    /// Config file (default: platform config dir)
    #[arg(long, global = true, value_name = "INI")]
    config: Option<PathBuf>,

    /// Partition store directory (overrides the config file)
    #[arg(long, global = true, value_name = "DIR")]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the current partitions and precache the application shell
    Install,

    /// Delete partitions left by older versions
    Activate,

    /// Request URLs through the interception layer
    Fetch {
        /// URLs to request
        #[arg(required = true)]
        urls: Vec<String>,

        /// HTTP method
        #[arg(long, default_value = "GET")]
        method: String,
    },

    /// Prune the tile partition to its newest entries
    Clean {
        /// Entries to keep (default: tiles.max_entries from the config)
        #[arg(long)]
        max: Option<usize>,
    },

    /// List partitions in the store
    Partitions {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let options = GlobalOptions {
        config: cli.config,
        store: cli.store,
    };

    if let Err(e) = run(cli.command, &options).await {
        e.exit();
    }
}

async fn run(command: Commands, options: &GlobalOptions) -> Result<(), CliError> {
    // Config commands need neither a store nor a log file
    let command = match command {
        Commands::Config { command } => return commands::config::run(command, options),
        command => command,
    };

    let config = options.load_config()?;
    let _logging = start_logging(&config)?;

    match command {
        Commands::Install => commands::install::run_install(&config).await,
        Commands::Activate => commands::install::run_activate(&config).await,
        Commands::Fetch { urls, method } => commands::fetch::run(&config, &urls, &method).await,
        Commands::Clean { max } => commands::clean::run(&config, max).await,
        Commands::Partitions { json } => commands::partitions::run(&config, json).await,
        Commands::Config { .. } => Ok(()),
    }
}

fn start_logging(config: &ConfigFile) -> Result<LoggingGuard, CliError> {
    init_logging(&config.logging.directory, &config.logging.file)
        .map_err(|e| CliError::LoggingInit(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "tilekeep",
            "fetch",
            "https://mt0.google.com/vt?x=1",
            "--store",
            "/tmp/tiles",
        ])
        .unwrap();

        assert_eq!(cli.store, Some(PathBuf::from("/tmp/tiles")));
        assert!(matches!(cli.command, Commands::Fetch { ref urls, .. } if urls.len() == 1));
    }

    #[test]
    fn test_fetch_requires_a_url() {
        assert!(Cli::try_parse_from(["tilekeep", "fetch"]).is_err());
    }
}
