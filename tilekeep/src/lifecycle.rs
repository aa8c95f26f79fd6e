//! Install and activation of the versioned partitions.
//!
//! Install opens the current app and tile partitions and fills the app
//! partition from the precache manifest. Activation removes every partition
//! left behind by an older version.

use crate::config::InterceptorConfig;
use crate::network::Fetcher;
use crate::request::{CacheEntry, Request};
use crate::store::{Partition, PartitionRole, PartitionStore, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

/// One manifest asset that could not be stored at install.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to precache {path}: {reason}")]
pub struct PrecacheAssetError {
    pub path: String,
    pub reason: String,
}

/// Lifecycle steps that cannot continue.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Failed to open partition {name}: {source}")]
    OpenPartition {
        name: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to list partitions: {0}")]
    ListPartitions(#[source] StoreError),
}

/// Handles to the current partitions, built once by install or attach.
pub struct PartitionContext<P> {
    app: Arc<P>,
    tile: Arc<P>,
}

impl<P: Partition> PartitionContext<P> {
    pub fn app(&self) -> &Arc<P> {
        &self.app
    }

    pub fn tile(&self) -> &Arc<P> {
        &self.tile
    }

    pub fn get(&self, role: PartitionRole) -> &Arc<P> {
        match role {
            PartitionRole::App => &self.app,
            PartitionRole::Tile => &self.tile,
        }
    }
}

impl<P> Clone for PartitionContext<P> {
    fn clone(&self) -> Self {
        Self {
            app: Arc::clone(&self.app),
            tile: Arc::clone(&self.tile),
        }
    }
}

/// What install managed to precache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Manifest paths stored, in manifest order
    pub stored: Vec<String>,
    /// Manifest paths that failed, in manifest order
    pub failures: Vec<PrecacheAssetError>,
}

impl InstallReport {
    /// Whether every manifest asset was stored.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// What activation removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
    /// Current partitions that exist
    pub retained: Vec<String>,
    /// Stale partitions removed
    pub deleted: Vec<String>,
    /// Stale partitions that could not be removed
    pub failed: Vec<String>,
}

/// Drives install and activation against a partition store.
pub struct CacheLifecycleManager<S, F> {
    store: Arc<S>,
    fetcher: Arc<F>,
    config: InterceptorConfig,
}

impl<S: PartitionStore, F: Fetcher> CacheLifecycleManager<S, F> {
    pub fn new(store: Arc<S>, fetcher: Arc<F>, config: InterceptorConfig) -> Self {
        Self {
            store,
            fetcher,
            config,
        }
    }

    pub fn config(&self) -> &InterceptorConfig {
        &self.config
    }

    /// Open both current partitions and precache the manifest.
    ///
    /// Assets are fetched concurrently and independently; a failed asset is
    /// logged and reported but does not fail the install.
    pub async fn install(
        &self,
    ) -> Result<(PartitionContext<S::Partition>, InstallReport), LifecycleError> {
        let context = self.attach().await?;
        let report = self.precache(context.app()).await;

        info!(
            partition = context.app().name(),
            stored = report.stored.len(),
            failed = report.failures.len(),
            "Install complete"
        );

        Ok((context, report))
    }

    /// Open both current partitions without precaching anything.
    ///
    /// Used when resuming a layer that was installed in an earlier run.
    pub async fn attach(&self) -> Result<PartitionContext<S::Partition>, LifecycleError> {
        let app_name = self.config.partition_name(PartitionRole::App);
        let tile_name = self.config.partition_name(PartitionRole::Tile);

        let (app, tile) = tokio::join!(self.store.open(&app_name), self.store.open(&tile_name));

        let app = app.map_err(|source| LifecycleError::OpenPartition {
            name: app_name,
            source,
        })?;
        let tile = tile.map_err(|source| LifecycleError::OpenPartition {
            name: tile_name,
            source,
        })?;

        Ok(PartitionContext { app, tile })
    }

    async fn precache(&self, partition: &Arc<S::Partition>) -> InstallReport {
        let origin = self.config.app_origin();
        let mut assets = JoinSet::new();

        for (index, path) in self.config.precache_manifest().iter().enumerate() {
            let path = path.clone();
            let url = resolve_asset_url(origin, &path);
            let fetcher = Arc::clone(&self.fetcher);
            let partition = Arc::clone(partition);

            assets.spawn(async move {
                let result = match url {
                    Ok(url) => precache_asset(fetcher, partition, &path, &url).await,
                    Err(reason) => Err(PrecacheAssetError {
                        path: path.clone(),
                        reason,
                    }),
                };
                (index, path, result)
            });
        }

        let mut outcomes = Vec::with_capacity(assets.len());
        while let Some(joined) = assets.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(join_err) => {
                    warn!(error = %join_err, "Precache task panicked");
                }
            }
        }
        outcomes.sort_by_key(|(index, _, _)| *index);

        let mut report = InstallReport::default();
        for (_, path, result) in outcomes {
            match result {
                Ok(()) => report.stored.push(path),
                Err(err) => {
                    warn!(path = %err.path, reason = %err.reason, "Precache asset failed");
                    report.failures.push(err);
                }
            }
        }
        report
    }

    /// Delete every partition that is not one of the two current ones.
    ///
    /// A partition that cannot be deleted is logged and reported; the rest
    /// are still processed.
    pub async fn activate(&self) -> Result<ActivationReport, LifecycleError> {
        let current = self.config.current_partition_names();
        let names = self
            .store
            .names()
            .await
            .map_err(LifecycleError::ListPartitions)?;

        let mut report = ActivationReport::default();
        for name in names {
            if current.contains(&name) {
                report.retained.push(name);
                continue;
            }

            info!(partition = %name, "Deleting old cache");
            match self.store.delete(&name).await {
                Ok(true) => report.deleted.push(name),
                Ok(false) => debug!(partition = %name, "Partition already gone"),
                Err(e) => {
                    warn!(partition = %name, error = %e, "Failed to delete old cache");
                    report.failed.push(name);
                }
            }
        }

        Ok(report)
    }
}

/// Resolve a manifest path against the application origin.
fn resolve_asset_url(origin: &str, path: &str) -> Result<String, String> {
    let base = Url::parse(origin).map_err(|e| format!("invalid app origin '{}': {}", origin, e))?;
    base.join(path)
        .map(String::from)
        .map_err(|e| format!("invalid path: {}", e))
}

async fn precache_asset<P: Partition, F: Fetcher>(
    fetcher: Arc<F>,
    partition: Arc<P>,
    path: &str,
    url: &str,
) -> Result<(), PrecacheAssetError> {
    let failed = |reason: String| PrecacheAssetError {
        path: path.to_string(),
        reason,
    };

    let request = Request::get(url);
    let response = fetcher
        .fetch(&request)
        .await
        .map_err(|e| failed(e.to_string()))?;

    if !response.is_cacheable() {
        return Err(failed(format!("HTTP status {}", response.status())));
    }

    partition
        .put(request.identity(), CacheEntry::new(response))
        .await
        .map_err(|e| failed(e.to_string()))?;

    debug!(path = path, url = url, "Precached asset");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{FetchError, MockFetcher, MockReply};
    use crate::request::Response;
    use crate::store::MemoryPartitionStore;

    fn manager(
        store: &Arc<MemoryPartitionStore>,
        fetcher: MockFetcher,
    ) -> CacheLifecycleManager<MemoryPartitionStore, MockFetcher> {
        CacheLifecycleManager::new(
            Arc::clone(store),
            Arc::new(fetcher),
            InterceptorConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_install_creates_both_partitions_and_precaches() {
        let store = Arc::new(MemoryPartitionStore::default());
        let fetcher = MockFetcher::new(MockReply::Respond(Response::ok("asset")));
        let lifecycle = manager(&store, fetcher);

        let (context, report) = lifecycle.install().await.unwrap();

        assert_eq!(
            store.names().await.unwrap(),
            vec!["gis-survey-app-v2".to_string(), "map-tiles-v2".to_string()]
        );
        assert!(report.is_complete());
        assert_eq!(
            report.stored,
            vec![
                "/",
                "/index.html",
                "/static/icons/lb.ico",
                "/static/icons/lb-192.png",
                "/static/icons/lb-512.png"
            ]
        );
        assert_eq!(context.app().len().await.unwrap(), 5);
        assert_eq!(context.tile().len().await.unwrap(), 0);

        let index = context
            .app()
            .get(&Request::get("http://localhost:8000/index.html").identity())
            .await
            .unwrap();
        assert!(index.is_some());
    }

    #[tokio::test]
    async fn test_failed_asset_does_not_abort_install() {
        let store = Arc::new(MemoryPartitionStore::default());
        let fetcher = MockFetcher::new(MockReply::Respond(Response::ok("asset")))
            .with_reply(
                "http://localhost:8000/static/icons/lb.ico",
                MockReply::Fail(FetchError::Transport("reset".into())),
            )
            .with_reply(
                "http://localhost:8000/static/icons/lb-512.png",
                MockReply::Respond(Response::new(404, "")),
            );
        let lifecycle = manager(&store, fetcher);

        let (context, report) = lifecycle.install().await.unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.stored.len(), 3);
        assert_eq!(
            report.failures,
            vec![
                PrecacheAssetError {
                    path: "/static/icons/lb.ico".into(),
                    reason: "Request failed: reset".into(),
                },
                PrecacheAssetError {
                    path: "/static/icons/lb-512.png".into(),
                    reason: "HTTP status 404".into(),
                },
            ]
        );
        assert_eq!(context.app().len().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_activate_deletes_only_stale_partitions() {
        let store = Arc::new(MemoryPartitionStore::default());
        for name in ["gis-survey-app-v1", "map-tiles-v1", "unrelated"] {
            store.open(name).await.unwrap();
        }
        let lifecycle = manager(&store, MockFetcher::new(MockReply::Respond(Response::ok("a"))));
        lifecycle.install().await.unwrap();

        let report = lifecycle.activate().await.unwrap();

        assert_eq!(
            report.deleted,
            vec!["gis-survey-app-v1", "map-tiles-v1", "unrelated"]
        );
        assert_eq!(report.retained, vec!["gis-survey-app-v2", "map-tiles-v2"]);
        assert!(report.failed.is_empty());
        assert_eq!(
            store.names().await.unwrap(),
            vec!["gis-survey-app-v2".to_string(), "map-tiles-v2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_attach_reuses_existing_entries() {
        let store = Arc::new(MemoryPartitionStore::default());
        let lifecycle = manager(&store, MockFetcher::new(MockReply::Respond(Response::ok("a"))));
        lifecycle.install().await.unwrap();

        let context = lifecycle.attach().await.unwrap();

        assert_eq!(context.get(PartitionRole::App).len().await.unwrap(), 5);
    }

    #[test]
    fn test_resolve_asset_url() {
        assert_eq!(
            resolve_asset_url("http://localhost:8000", "/").unwrap(),
            "http://localhost:8000/"
        );
        assert_eq!(
            resolve_asset_url("https://survey.example.org/", "/static/icons/lb.ico").unwrap(),
            "https://survey.example.org/static/icons/lb.ico"
        );
        assert!(resolve_asset_url("not a url", "/").is_err());
    }
}
