//! Default values for every configuration setting.
//!
//! Contains all `DEFAULT_*` constants and the `ConfigFile::default()`
//! implementation.

use std::path::PathBuf;

use super::interceptor::InterceptorConfig;
use super::settings::*;

// =============================================================================
// Partitions
// =============================================================================

/// Base name of the application shell partition.
pub const DEFAULT_APP_PARTITION_BASE: &str = "gis-survey-app";

/// Base name of the map tile partition.
pub const DEFAULT_TILE_PARTITION_BASE: &str = "map-tiles";

/// Version tag shared by both partitions. Bumping it retires the old
/// partitions at the next activation.
pub const DEFAULT_PARTITION_VERSION: &str = "v2";

// =============================================================================
// Application
// =============================================================================

/// Origin the application shell is served from.
pub const DEFAULT_APP_ORIGIN: &str = "http://localhost:8000";

/// Paths stored into the app partition at install.
pub const DEFAULT_PRECACHE_MANIFEST: &[&str] = &[
    "/",
    "/index.html",
    "/static/icons/lb.ico",
    "/static/icons/lb-192.png",
    "/static/icons/lb-512.png",
];

// =============================================================================
// Tiles
// =============================================================================

/// URL prefixes identifying map tile requests.
pub const DEFAULT_TILE_ORIGINS: &[&str] = &[
    "https://mt0.google.com",
    "https://mt1.google.com",
    "https://mt2.google.com",
    "https://mt3.google.com",
];

/// Entries kept in the tile partition after a clean.
pub const DEFAULT_MAX_TILE_ENTRIES: usize = 100;

/// Whether concurrent refreshes of one tile share a fetch.
pub const DEFAULT_COALESCE_REFRESHES: bool = false;

// =============================================================================
// Paths
// =============================================================================

/// Directory name used under the platform config, cache and data dirs.
pub const APP_DIR_NAME: &str = "tilekeep";

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "tilekeep.log";

/// Default on-disk store location (`~/.cache/tilekeep/store` on Linux).
pub fn default_store_directory() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join("store")
}

/// Default log directory (`~/.local/share/tilekeep/logs` on Linux).
pub fn default_log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join("logs")
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            interceptor: InterceptorConfig::default(),
            store: StoreSettings {
                directory: default_store_directory(),
            },
            network: NetworkSettings {
                connect_timeout: None,
            },
            logging: LoggingSettings {
                directory: default_log_directory(),
                file: DEFAULT_LOG_FILE.to_string(),
            },
        }
    }
}
