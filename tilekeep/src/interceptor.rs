//! The interception layer as a host sees it.
//!
//! An [`Interceptor`] receives the four inbound signals (install, activate,
//! request, control message) and routes each to the component that owns it:
//!
//! ```text
//!   install ───► CacheLifecycleManager ──► PartitionContext
//!   activate ──► CacheLifecycleManager
//!   request ───► RequestClassifier ─┬─► TileCacheOrchestrator (tile origins)
//!                                   └─► AppAssetHandler       (everything else)
//!   message ───► ControlMessage ──────► CachePruner (tile partition)
//! ```

use crate::app::{AppAssetHandler, AppError};
use crate::classify::{RequestClassifier, RequestKind};
use crate::config::InterceptorConfig;
use crate::control::ControlMessage;
use crate::lifecycle::{
    ActivationReport, CacheLifecycleManager, InstallReport, LifecycleError, PartitionContext,
};
use crate::network::Fetcher;
use crate::orchestrator::{OrchestratorStatsSnapshot, TileCacheOrchestrator, TileError};
use crate::pruner::{CachePruner, PruneOutcome};
use crate::request::{Request, Response};
use crate::store::{MemoryPartitionStore, Partition, PartitionRole, PartitionStore, StoreError};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, info, trace};

/// Where the layer is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LayerPhase {
    #[default]
    Idle,
    Installing,
    Installed,
    Activating,
    Active,
}

impl fmt::Display for LayerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LayerPhase::Idle => "idle",
            LayerPhase::Installing => "installing",
            LayerPhase::Installed => "installed",
            LayerPhase::Activating => "activating",
            LayerPhase::Active => "active",
        };
        f.write_str(s)
    }
}

/// Phase plus the two takeover flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayerStatus {
    pub phase: LayerPhase,
    /// Set after install: the layer does not wait for old pages to close
    pub skip_waiting: bool,
    /// Set after activation: already-open pages are routed through the layer
    pub clients_claimed: bool,
}

/// Errors surfaced to the host.
#[derive(Debug, Error)]
pub enum InterceptError {
    #[error("Interception layer is not installed")]
    NotInstalled,

    #[error(transparent)]
    Tile(#[from] TileError),

    #[error(transparent)]
    App(#[from] AppError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("Failed to clean map cache: {0}")]
    Prune(#[source] StoreError),
}

/// Per-install components.
struct Installed<S: PartitionStore, F> {
    context: PartitionContext<S::Partition>,
    tiles: TileCacheOrchestrator<S::Partition, F>,
    app: AppAssetHandler<S, F>,
}

struct LayerState<S: PartitionStore, F> {
    status: LayerStatus,
    installed: Option<Arc<Installed<S, F>>>,
}

/// Offline-tolerant interception layer over a partition store and a fetcher.
///
/// # Example
///
/// ```ignore
/// use tilekeep::config::InterceptorConfig;
/// use tilekeep::interceptor::Interceptor;
/// use tilekeep::network::ReqwestFetcher;
///
/// let fetcher = Arc::new(ReqwestFetcher::new()?);
/// let layer = Interceptor::in_memory(InterceptorConfig::default(), fetcher);
/// layer.install().await?;
/// layer.activate().await?;
///
/// let tile = layer.handle(Request::get("https://mt1.google.com/vt?x=3&y=5&z=4")).await?;
/// layer.on_message(&serde_json::json!({ "type": "CLEAN_MAP_CACHE" })).await?;
/// ```
pub struct Interceptor<S: PartitionStore, F> {
    config: InterceptorConfig,
    store: Arc<S>,
    fetcher: Arc<F>,
    classifier: RequestClassifier,
    lifecycle: CacheLifecycleManager<S, F>,
    pruner: CachePruner,
    state: RwLock<LayerState<S, F>>,
}

impl<F: Fetcher> Interceptor<MemoryPartitionStore, F> {
    /// Layer backed by a fresh in-memory store using the configured refresh policy.
    pub fn in_memory(config: InterceptorConfig, fetcher: Arc<F>) -> Self {
        let store = Arc::new(MemoryPartitionStore::new(config.refresh_policy()));
        Self::new(config, store, fetcher)
    }
}

impl<S: PartitionStore, F: Fetcher> Interceptor<S, F> {
    /// The store's own refresh policy applies; `config.refresh_policy()` is
    /// only consulted by [`Interceptor::in_memory`] and by hosts building
    /// their store from the same config.
    pub fn new(config: InterceptorConfig, store: Arc<S>, fetcher: Arc<F>) -> Self {
        Self {
            classifier: RequestClassifier::new(config.tile_origins().iter().cloned()),
            lifecycle: CacheLifecycleManager::new(
                Arc::clone(&store),
                Arc::clone(&fetcher),
                config.clone(),
            ),
            pruner: CachePruner::new(config.max_tile_entries()),
            config,
            store,
            fetcher,
            state: RwLock::new(LayerState {
                status: LayerStatus::default(),
                installed: None,
            }),
        }
    }

    pub fn config(&self) -> &InterceptorConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn classifier(&self) -> &RequestClassifier {
        &self.classifier
    }

    pub fn status(&self) -> LayerStatus {
        self.read_state(|state| state.status)
    }

    pub fn phase(&self) -> LayerPhase {
        self.status().phase
    }

    /// Counters of the tile path, once installed.
    pub fn tile_stats(&self) -> Option<OrchestratorStatsSnapshot> {
        self.installed().map(|installed| installed.tiles.stats())
    }

    /// Handles to the current partitions, once installed.
    pub fn partitions(&self) -> Option<PartitionContext<S::Partition>> {
        self.installed().map(|installed| installed.context.clone())
    }

    /// Open the current partitions and precache the manifest.
    ///
    /// The layer is usable as soon as this returns; activation only cleans
    /// up after older versions.
    pub async fn install(&self) -> Result<InstallReport, InterceptError> {
        let previous = self.phase();
        self.set_phase(LayerPhase::Installing);

        let (context, report) = match self.lifecycle.install().await {
            Ok(installed) => installed,
            Err(e) => {
                self.set_phase(previous);
                return Err(e.into());
            }
        };

        let installed = self.build(context);
        self.write_state(|state| {
            state.installed = Some(installed);
            state.status.phase = LayerPhase::Installed;
            state.status.skip_waiting = true;
        });

        info!(
            app = %self.config.partition_name(PartitionRole::App),
            tile = %self.config.partition_name(PartitionRole::Tile),
            precached = report.stored.len(),
            "Interception layer installed"
        );
        Ok(report)
    }

    /// Delete partitions left by older versions and take over open pages.
    pub async fn activate(&self) -> Result<ActivationReport, InterceptError> {
        if self.installed().is_none() {
            return Err(InterceptError::NotInstalled);
        }

        let previous = self.phase();
        self.set_phase(LayerPhase::Activating);

        let report = match self.lifecycle.activate().await {
            Ok(report) => report,
            Err(e) => {
                self.set_phase(previous);
                return Err(e.into());
            }
        };

        self.write_state(|state| {
            state.status.phase = LayerPhase::Active;
            state.status.clients_claimed = true;
        });

        info!(
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "Interception layer active"
        );
        Ok(report)
    }

    /// Reattach to partitions installed in an earlier run, without
    /// precaching or cleaning anything.
    pub async fn resume(&self) -> Result<(), InterceptError> {
        let context = self.lifecycle.attach().await?;
        let installed = self.build(context);

        self.write_state(|state| {
            state.installed = Some(installed);
            state.status = LayerStatus {
                phase: LayerPhase::Active,
                skip_waiting: true,
                clients_claimed: true,
            };
        });

        debug!("Interception layer resumed");
        Ok(())
    }

    /// Answer an intercepted request.
    pub async fn handle(&self, request: Request) -> Result<Response, InterceptError> {
        let installed = self.installed().ok_or(InterceptError::NotInstalled)?;

        match self.classifier.classify(&request) {
            RequestKind::Tile => {
                trace!(
                    url = request.url(),
                    origin = self.classifier.matched_origin(&request),
                    "Routing to tile cache"
                );
                Ok(installed.tiles.handle(request).await?)
            }
            RequestKind::App => {
                trace!(url = request.url(), "Routing to app cache");
                Ok(installed.app.handle(request).await?)
            }
        }
    }

    /// React to a message posted by the application.
    ///
    /// Returns the prune outcome for `CLEAN_MAP_CACHE` and `None` for
    /// anything unrecognized.
    pub async fn on_message(
        &self,
        payload: &Value,
    ) -> Result<Option<PruneOutcome>, InterceptError> {
        let Some(message) = ControlMessage::parse(payload) else {
            debug!(payload = %payload, "Ignoring unrecognized message");
            return Ok(None);
        };

        match message {
            ControlMessage::CleanMapCache => {
                let installed = self.installed().ok_or(InterceptError::NotInstalled)?;
                let outcome = self
                    .pruner
                    .prune(installed.context.tile().as_ref())
                    .await
                    .map_err(InterceptError::Prune)?;
                Ok(Some(outcome))
            }
        }
    }

    /// Wait for every background tile refresh started so far.
    pub async fn wait_for_refreshes(&self) {
        if let Some(installed) = self.installed() {
            installed.tiles.wait_for_refreshes().await;
        }
    }

    fn build(&self, context: PartitionContext<S::Partition>) -> Arc<Installed<S, F>> {
        let tiles =
            TileCacheOrchestrator::new(Arc::clone(context.tile()), Arc::clone(&self.fetcher))
                .with_coalescing(self.config.coalesce_refreshes());
        let app = AppAssetHandler::new(
            Arc::clone(&self.store),
            Arc::clone(context.app()),
            Arc::clone(&self.fetcher),
            self.config.app_origin(),
        );

        debug!(
            app = context.app().name(),
            tile = context.tile().name(),
            "Partition context ready"
        );
        Arc::new(Installed {
            context,
            tiles,
            app,
        })
    }

    fn installed(&self) -> Option<Arc<Installed<S, F>>> {
        self.read_state(|state| state.installed.clone())
    }

    fn set_phase(&self, phase: LayerPhase) {
        self.write_state(|state| state.status.phase = phase);
    }

    // State is plain data with no invariants spanning a panic, so a
    // poisoned lock is still usable.
    fn read_state<T>(&self, f: impl FnOnce(&LayerState<S, F>) -> T) -> T {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    fn write_state(&self, f: impl FnOnce(&mut LayerState<S, F>)) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }
}
