//! Common types and utilities shared across CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tilekeep::config::{config_file_path, ConfigFile};
use tilekeep::interceptor::Interceptor;
use tilekeep::network::ReqwestFetcher;
use tilekeep::store::DiskPartitionStore;
use tracing::debug;

use crate::error::CliError;

/// The layer every store-touching command drives.
pub type Layer = Interceptor<DiskPartitionStore, ReqwestFetcher>;

/// Options shared by all subcommands.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Explicit config file
    pub config: Option<PathBuf>,
    /// Store directory overriding the config file
    pub store: Option<PathBuf>,
}

impl GlobalOptions {
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(config_file_path)
    }

    /// Load the config file and apply command-line overrides.
    pub fn load_config(&self) -> Result<ConfigFile, CliError> {
        let path = self.config_path();
        let mut config = ConfigFile::load_from(&path)?;
        if let Some(store) = &self.store {
            config.store.directory = store.clone();
        }
        debug!(
            path = %path.display(),
            store = %config.store.directory.display(),
            "Configuration loaded"
        );
        Ok(config)
    }
}

/// Open the on-disk store named by the config.
pub async fn open_store(config: &ConfigFile) -> Result<DiskPartitionStore, CliError> {
    let root = &config.store.directory;
    DiskPartitionStore::load(root, config.interceptor.refresh_policy())
        .await
        .map_err(|error| store_error(root, error))
}

/// Build a layer over the configured store and a real HTTP client.
pub async fn open_layer(config: &ConfigFile) -> Result<Layer, CliError> {
    let store = open_store(config).await?;
    let fetcher = match config.network.connect_timeout {
        Some(secs) => ReqwestFetcher::with_connect_timeout(secs),
        None => ReqwestFetcher::new(),
    }
    .map_err(CliError::Network)?;

    Ok(Interceptor::new(
        config.interceptor.clone(),
        Arc::new(store),
        Arc::new(fetcher),
    ))
}

pub fn store_error(root: &Path, error: tilekeep::store::StoreError) -> CliError {
    CliError::Store {
        path: root.to_path_buf(),
        error,
    }
}
