//! Configuration management CLI commands.

use clap::Subcommand;
use tilekeep::config::ConfigFile;

use super::common::GlobalOptions;
use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration as INI
    Show,

    /// Show the configuration file path
    Path,

    /// Write a config file with default values if none exists
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, options: &GlobalOptions) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show => {
            let config = options.load_config()?;
            print!("{}", config.to_ini_string());
            Ok(())
        }
        ConfigCommands::Path => {
            println!("{}", options.config_path().display());
            Ok(())
        }
        ConfigCommands::Init { force } => run_init(options, force),
    }
}

fn run_init(options: &GlobalOptions, force: bool) -> Result<(), CliError> {
    let path = options.config_path();
    if path.exists() && !force {
        println!("Config file already exists: {}", path.display());
        println!("Use --force to overwrite it with defaults.");
        return Ok(());
    }

    ConfigFile::default().save_to(&path)?;
    println!("Wrote default configuration to: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_loadable_defaults() {
        let temp = TempDir::new().unwrap();
        let options = GlobalOptions {
            config: Some(temp.path().join("tilekeep").join("config.ini")),
            store: None,
        };

        run_init(&options, false).unwrap();

        let loaded = ConfigFile::load_from(&options.config_path()).unwrap();
        assert_eq!(loaded.interceptor, ConfigFile::default().interceptor);
    }

    #[test]
    fn test_init_keeps_existing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        std::fs::write(&path, "[tiles]\nmax_entries = 7\n").unwrap();
        let options = GlobalOptions {
            config: Some(path.clone()),
            store: None,
        };

        run_init(&options, false).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[tiles]\nmax_entries = 7\n");
    }
}
