//! Interception layer configuration.

use super::defaults::*;
use crate::store::{PartitionRole, PartitionSpec, RefreshPolicy};

/// Everything the interception layer needs to know about its deployment.
///
/// # Example
///
/// ```
/// use tilekeep::config::InterceptorConfig;
///
/// let config = InterceptorConfig::default();
/// assert_eq!(config.partition_name(tilekeep::store::PartitionRole::Tile), "map-tiles-v2");
/// assert_eq!(config.max_tile_entries(), 100);
///
/// let config = InterceptorConfig::new()
///     .with_partition_version("v3")
///     .with_max_tile_entries(500);
/// assert_eq!(config.partition_name(tilekeep::store::PartitionRole::App), "gis-survey-app-v3");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptorConfig {
    app_partition: PartitionSpec,
    tile_partition: PartitionSpec,
    app_origin: String,
    precache_manifest: Vec<String>,
    tile_origins: Vec<String>,
    max_tile_entries: usize,
    refresh_policy: RefreshPolicy,
    coalesce_refreshes: bool,
}

impl InterceptorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the app partition's base name and version.
    pub fn with_app_partition(mut self, spec: PartitionSpec) -> Self {
        self.app_partition = spec;
        self
    }

    /// Set the tile partition's base name and version.
    pub fn with_tile_partition(mut self, spec: PartitionSpec) -> Self {
        self.tile_partition = spec;
        self
    }

    /// Set the version tag of both partitions.
    pub fn with_partition_version(mut self, version: impl Into<String>) -> Self {
        let version = version.into();
        self.app_partition.version = version.clone();
        self.tile_partition.version = version;
        self
    }

    pub fn with_app_origin(mut self, origin: impl Into<String>) -> Self {
        self.app_origin = origin.into();
        self
    }

    pub fn with_precache_manifest<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.precache_manifest = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tile_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tile_origins = origins.into_iter().map(Into::into).collect();
        self
    }

    /// Set how many tile entries survive a clean. Default: 100.
    pub fn with_max_tile_entries(mut self, max: usize) -> Self {
        self.max_tile_entries = max;
        self
    }

    pub fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.refresh_policy = policy;
        self
    }

    pub fn with_coalesce_refreshes(mut self, enabled: bool) -> Self {
        self.coalesce_refreshes = enabled;
        self
    }

    pub fn partition(&self, role: PartitionRole) -> &PartitionSpec {
        match role {
            PartitionRole::App => &self.app_partition,
            PartitionRole::Tile => &self.tile_partition,
        }
    }

    /// Current partition name for `role`.
    pub fn partition_name(&self, role: PartitionRole) -> String {
        self.partition(role).name()
    }

    /// Both current partition names, app first.
    pub fn current_partition_names(&self) -> [String; 2] {
        [
            self.partition_name(PartitionRole::App),
            self.partition_name(PartitionRole::Tile),
        ]
    }

    pub fn app_origin(&self) -> &str {
        &self.app_origin
    }

    pub fn precache_manifest(&self) -> &[String] {
        &self.precache_manifest
    }

    pub fn tile_origins(&self) -> &[String] {
        &self.tile_origins
    }

    pub fn max_tile_entries(&self) -> usize {
        self.max_tile_entries
    }

    pub fn refresh_policy(&self) -> RefreshPolicy {
        self.refresh_policy
    }

    pub fn coalesce_refreshes(&self) -> bool {
        self.coalesce_refreshes
    }
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            app_partition: PartitionSpec::new(
                DEFAULT_APP_PARTITION_BASE,
                DEFAULT_PARTITION_VERSION,
            ),
            tile_partition: PartitionSpec::new(
                DEFAULT_TILE_PARTITION_BASE,
                DEFAULT_PARTITION_VERSION,
            ),
            app_origin: DEFAULT_APP_ORIGIN.to_string(),
            precache_manifest: DEFAULT_PRECACHE_MANIFEST
                .iter()
                .map(|s| s.to_string())
                .collect(),
            tile_origins: DEFAULT_TILE_ORIGINS.iter().map(|s| s.to_string()).collect(),
            max_tile_entries: DEFAULT_MAX_TILE_ENTRIES,
            refresh_policy: RefreshPolicy::default(),
            coalesce_refreshes: DEFAULT_COALESCE_REFRESHES,
        }
    }
}
