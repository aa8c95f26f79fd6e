//! Cache-first handling of application assets.
//!
//! Everything that is not a map tile goes through here: the app partition is
//! checked first and the network is only used on a miss. Responses from the
//! application's own origin are kept for next time.

use crate::network::{FetchError, Fetcher};
use crate::request::{CacheEntry, Request, RequestIdentity, Response};
use crate::store::{Partition, PartitionStore};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// An application request that could not be answered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    /// Not cached anywhere and the network fetch failed
    #[error("Network fetch failed for {identity}: {source}")]
    Network {
        identity: RequestIdentity,
        #[source]
        source: FetchError,
    },
}

/// Cache-first handler backed by the app partition.
pub struct AppAssetHandler<S: PartitionStore, F> {
    store: Arc<S>,
    partition: Arc<S::Partition>,
    fetcher: Arc<F>,
    app_origin: String,
}

impl<S: PartitionStore, F: Fetcher> AppAssetHandler<S, F> {
    /// `app_origin` decides which fetched responses are worth keeping.
    pub fn new(
        store: Arc<S>,
        partition: Arc<S::Partition>,
        fetcher: Arc<F>,
        app_origin: &str,
    ) -> Self {
        let app_origin = Request::get(app_origin)
            .origin()
            .unwrap_or_else(|| app_origin.trim_end_matches('/').to_string());

        Self {
            store,
            partition,
            fetcher,
            app_origin,
        }
    }

    pub fn app_origin(&self) -> &str {
        &self.app_origin
    }

    pub fn partition(&self) -> &Arc<S::Partition> {
        &self.partition
    }

    /// Answer an application request.
    pub async fn handle(&self, request: Request) -> Result<Response, AppError> {
        let identity = request.identity();

        match self.partition.get(&identity).await {
            Ok(Some(entry)) => {
                debug!(identity = %identity, "Serving app asset from cache");
                return Ok(entry.into_response());
            }
            Ok(None) => {}
            Err(e) => {
                warn!(
                    identity = %identity,
                    error = %e,
                    "App cache lookup failed, going to network"
                );
            }
        }

        match self.fetcher.fetch(&request).await {
            Ok(response) => {
                if request.origin().as_deref() == Some(self.app_origin.as_str()) {
                    self.remember(identity, &response).await;
                }
                Ok(response)
            }
            Err(err) => self.offline_fallback(identity, err).await,
        }
    }

    async fn remember(&self, identity: RequestIdentity, response: &Response) {
        if let Err(e) = self
            .partition
            .put(identity.clone(), CacheEntry::new(response.clone()))
            .await
        {
            warn!(identity = %identity, error = %e, "Failed to cache app asset");
        }
    }

    /// Look for the request in every partition once the network is gone.
    async fn offline_fallback(
        &self,
        identity: RequestIdentity,
        err: FetchError,
    ) -> Result<Response, AppError> {
        match self.store.match_any(&identity).await {
            Ok(Some(entry)) => {
                debug!(identity = %identity, error = %err, "Offline, serving from any partition");
                return Ok(entry.into_response());
            }
            Ok(None) => {}
            Err(e) => {
                warn!(identity = %identity, error = %e, "Offline lookup failed");
            }
        }

        warn!(identity = %identity, error = %err, "App asset unavailable offline");
        Err(AppError::Network {
            identity,
            source: err,
        })
    }
}
