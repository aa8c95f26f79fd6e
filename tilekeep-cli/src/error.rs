//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::path::PathBuf;
use std::process;
use tilekeep::config::ConfigFileError;
use tilekeep::interceptor::InterceptError;
use tilekeep::network::FetchError;
use tilekeep::store::StoreError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Config file could not be read or is invalid
    Config(ConfigFileError),
    /// Partition store could not be opened or read
    Store { path: PathBuf, error: StoreError },
    /// HTTP client could not be created
    Network(FetchError),
    /// The interception layer refused a signal
    Layer(InterceptError),
    /// Some fetched URLs could not be answered
    Fetch { failed: usize, total: usize },
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Store { path, .. } => {
                eprintln!();
                eprintln!("Check that {} is writable, or pass --store <dir>.", path.display());
            }
            CliError::Layer(InterceptError::NotInstalled) => {
                eprintln!();
                eprintln!("Run 'tilekeep install' first.");
            }
            CliError::Config(ConfigFileError::InvalidValue { .. }) => {
                eprintln!();
                eprintln!("Use 'tilekeep config show' to see the expected format.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Store { path, error } => {
                write!(f, "Store error at '{}': {}", path.display(), error)
            }
            CliError::Network(e) => write!(f, "Failed to create HTTP client: {}", e),
            CliError::Layer(e) => write!(f, "{}", e),
            CliError::Fetch { failed, total } => {
                write!(f, "{} of {} requests could not be answered", failed, total)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Store { error, .. } => Some(error),
            CliError::Network(e) => Some(e),
            CliError::Layer(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<InterceptError> for CliError {
    fn from(e: InterceptError) -> Self {
        CliError::Layer(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_summary_message() {
        let err = CliError::Fetch { failed: 2, total: 5 };
        assert_eq!(err.to_string(), "2 of 5 requests could not be answered");
    }

    #[test]
    fn test_layer_error_is_transparent() {
        let err = CliError::from(InterceptError::NotInstalled);
        assert_eq!(err.to_string(), "Interception layer is not installed");
        assert!(std::error::Error::source(&err).is_some());
    }
}
