//! Settings structs for the configuration file.
//!
//! Each struct represents one concern of the INI file. These are pure data
//! types with no parsing or serialization logic.

use super::interceptor::InterceptorConfig;
use std::path::PathBuf;

/// Complete configuration loaded from `config.ini`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Partitions, origins, manifest and tile policy
    pub interceptor: InterceptorConfig,
    /// On-disk store settings
    pub store: StoreSettings,
    /// Network settings
    pub network: NetworkSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// On-disk store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    /// Root directory of the partition store
    pub directory: PathBuf,
}

/// Network configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSettings {
    /// Connect timeout in seconds; `None` leaves fetches unbounded
    pub connect_timeout: Option<u64>,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Directory holding the log file
    pub directory: PathBuf,
    /// Log file name
    pub file: String,
}
