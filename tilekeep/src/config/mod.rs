//! Configuration for the interception layer.
//!
//! [`InterceptorConfig`] carries the deployment settings the core needs:
//! partition names, origins, precache manifest and tile policy. Hosts that
//! keep settings on disk load them through [`ConfigFile`], which wraps an
//! `InterceptorConfig` together with store, network and logging settings.
//!
//! # Example
//!
//! ```
//! use tilekeep::config::{ConfigFile, InterceptorConfig};
//! use tilekeep::store::RefreshPolicy;
//!
//! let config = InterceptorConfig::new()
//!     .with_max_tile_entries(250)
//!     .with_refresh_policy(RefreshPolicy::PreserveAge);
//!
//! let file = ConfigFile::default();
//! assert_eq!(file.interceptor.max_tile_entries(), 100);
//! ```

mod defaults;
mod file;
mod interceptor;
mod parser;
mod settings;
mod writer;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use interceptor::InterceptorConfig;
pub use settings::{ConfigFile, LoggingSettings, NetworkSettings, StoreSettings};
