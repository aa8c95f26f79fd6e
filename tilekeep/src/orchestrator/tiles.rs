//! Tile cache orchestration implementation

use super::coalesce::{LeaderGuard, RefreshCoalescer, RefreshResult, Registration};
use super::stats::{OrchestratorStats, OrchestratorStatsSnapshot};
use super::types::TileError;
use crate::network::{FetchError, Fetcher};
use crate::request::{CacheEntry, Request, RequestIdentity, Response};
use crate::store::Partition;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace, warn};

/// Serves tile requests stale-while-revalidate against one tile partition.
///
/// For each request the cached entry (if any) is looked up and a network
/// fetch is started. A cached entry is returned at once while the fetch
/// carries on in the background; a `200` answer overwrites the entry, any
/// other answer or a failure leaves it alone. With nothing cached the caller
/// waits for the fetch instead.
///
/// Refreshes are spawned tasks and outlive the request that started them.
/// Nothing cancels or times them out.
///
/// # Example
///
/// ```ignore
/// use tilekeep::orchestrator::TileCacheOrchestrator;
/// use tilekeep::network::ReqwestFetcher;
///
/// let tiles = TileCacheOrchestrator::new(context.tile(), Arc::new(ReqwestFetcher::new()?));
/// let response = tiles.handle(Request::get("https://mt0.google.com/vt?x=1&y=2&z=3")).await?;
/// ```
pub struct TileCacheOrchestrator<P, F> {
    partition: Arc<P>,
    fetcher: Arc<F>,
    refreshes: TaskTracker,
    coalescer: Option<Arc<RefreshCoalescer>>,
    stats: Arc<OrchestratorStats>,
}

/// A refresh the caller may or may not wait for.
enum PendingRefresh {
    /// This request started the fetch
    Owned(JoinHandle<RefreshResult>),
    /// Another request's fetch is being shared
    Shared(broadcast::Receiver<RefreshResult>),
}

impl PendingRefresh {
    async fn settle(self) -> RefreshResult {
        match self {
            PendingRefresh::Owned(handle) => handle
                .await
                .unwrap_or_else(|e| Err(FetchError::Aborted(e.to_string()))),
            PendingRefresh::Shared(mut rx) => rx
                .recv()
                .await
                .unwrap_or_else(|e| Err(FetchError::Aborted(e.to_string()))),
        }
    }
}

impl<P: Partition, F: Fetcher> TileCacheOrchestrator<P, F> {
    /// Creates an orchestrator that issues one fetch per request.
    pub fn new(partition: Arc<P>, fetcher: Arc<F>) -> Self {
        Self {
            partition,
            fetcher,
            refreshes: TaskTracker::new(),
            coalescer: None,
            stats: Arc::new(OrchestratorStats::new()),
        }
    }

    /// Share one in-flight fetch between concurrent requests for the same tile.
    pub fn with_coalescing(mut self, enabled: bool) -> Self {
        self.coalescer = enabled.then(|| Arc::new(RefreshCoalescer::new()));
        self
    }

    pub fn partition(&self) -> &Arc<P> {
        &self.partition
    }

    pub fn stats(&self) -> OrchestratorStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn coalescer(&self) -> Option<&RefreshCoalescer> {
        self.coalescer.as_deref()
    }

    /// Number of background refreshes still running.
    pub fn pending_refreshes(&self) -> usize {
        self.refreshes.len()
    }

    /// Wait until every refresh started so far has settled.
    ///
    /// Requests keep being served meanwhile; refreshes they start are
    /// awaited too.
    pub async fn wait_for_refreshes(&self) {
        self.refreshes.close();
        self.refreshes.wait().await;
        self.refreshes.reopen();
    }

    /// Answer a tile request.
    pub async fn handle(&self, request: Request) -> Result<Response, TileError> {
        let identity = request.identity();
        let cached = self.lookup(&identity).await;
        let refresh = self.start_refresh(request, identity.clone());

        if let Some(entry) = cached {
            self.stats.record_hit();
            debug!(identity = %identity, "Serving cached tile, refreshing in background");
            return Ok(entry.into_response());
        }

        self.stats.record_miss();
        trace!(identity = %identity, "Tile not cached, waiting on network");

        match refresh.settle().await {
            Ok(response) => Ok(response),
            Err(err) => {
                if let Some(entry) = self.lookup(&identity).await {
                    self.stats.record_fallback();
                    debug!(
                        identity = %identity,
                        error = %err,
                        "Network failed, serving tile cached meanwhile"
                    );
                    return Ok(entry.into_response());
                }

                warn!(identity = %identity, error = %err, "Tile unavailable offline");
                Err(TileError::Network {
                    identity,
                    source: err,
                })
            }
        }
    }

    /// Read the tile partition, degrading storage failures to a miss.
    async fn lookup(&self, identity: &RequestIdentity) -> Option<CacheEntry> {
        match self.partition.get(identity).await {
            Ok(entry) => entry,
            Err(e) => {
                self.stats.record_storage_error();
                warn!(
                    identity = %identity,
                    partition = self.partition.name(),
                    error = %e,
                    "Tile lookup failed, treating as miss"
                );
                None
            }
        }
    }

    fn start_refresh(&self, request: Request, identity: RequestIdentity) -> PendingRefresh {
        let partition = Arc::clone(&self.partition);
        let fetcher = Arc::clone(&self.fetcher);
        let stats = Arc::clone(&self.stats);

        let Some(coalescer) = &self.coalescer else {
            let task = refresh(partition, fetcher, stats, request, identity);
            return PendingRefresh::Owned(self.refreshes.spawn(task));
        };

        match coalescer.register(&identity) {
            Registration::Follower(rx) => PendingRefresh::Shared(rx),
            Registration::Leader => {
                let guard = LeaderGuard::new(Arc::clone(coalescer), identity.clone());
                PendingRefresh::Owned(self.refreshes.spawn(async move {
                    let result = refresh(partition, fetcher, stats, request, identity).await;
                    guard.finish(result.clone());
                    result
                }))
            }
        }
    }
}

/// Fetch `request` and write a `200` answer back to the partition.
async fn refresh<P: Partition, F: Fetcher>(
    partition: Arc<P>,
    fetcher: Arc<F>,
    stats: Arc<OrchestratorStats>,
    request: Request,
    identity: RequestIdentity,
) -> RefreshResult {
    let response = match fetcher.fetch(&request).await {
        Ok(response) => response,
        Err(e) => {
            stats.record_refresh_failure();
            debug!(identity = %identity, error = %e, "Tile refresh failed");
            return Err(e);
        }
    };

    if !response.is_cacheable() {
        stats.record_not_ok();
        debug!(
            identity = %identity,
            status = response.status(),
            "Tile refresh not cached"
        );
        return Ok(response);
    }

    match partition
        .put(identity.clone(), CacheEntry::new(response.clone()))
        .await
    {
        Ok(()) => {
            stats.record_stored();
            trace!(
                identity = %identity,
                bytes = response.body().len(),
                "Tile refreshed"
            );
        }
        Err(e) => {
            stats.record_storage_error();
            warn!(
                identity = %identity,
                partition = partition.name(),
                error = %e,
                "Failed to store refreshed tile"
            );
        }
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{MockFetcher, MockReply};
    use crate::store::{MemoryPartition, MemoryPartitionStore, PartitionStore, StoreError};
    use std::time::Duration;
    use tokio::sync::Notify;

    const TILE_URL: &str = "https://mt0.google.com/vt/lyrs=s&x=10&y=20&z=5";

    async fn tile_partition() -> Arc<MemoryPartition> {
        MemoryPartitionStore::default()
            .open("map-tiles-v2")
            .await
            .unwrap()
    }

    async fn cached_body(partition: &MemoryPartition, url: &str) -> Option<Vec<u8>> {
        partition
            .get(&Request::get(url).identity())
            .await
            .unwrap()
            .map(|e| e.into_response().into_body().to_vec())
    }

    async fn seed(partition: &MemoryPartition, url: &str, body: &'static str) {
        partition
            .put(Request::get(url).identity(), CacheEntry::new(Response::ok(body)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_hit_returns_without_waiting_for_network() {
        let partition = tile_partition().await;
        seed(&partition, TILE_URL, "stale").await;
        let fetcher = Arc::new(MockFetcher::new(MockReply::Hang));
        let tiles = TileCacheOrchestrator::new(partition, Arc::clone(&fetcher));

        let response = tokio::time::timeout(
            Duration::from_secs(5),
            tiles.handle(Request::get(TILE_URL)),
        )
        .await
        .expect("cached tile must not wait on the network")
        .unwrap();

        assert_eq!(response.body().as_ref(), b"stale");
        assert_eq!(tiles.stats().hits, 1);
        assert_eq!(tiles.pending_refreshes(), 1);
    }

    #[tokio::test]
    async fn test_hit_is_refreshed_in_background() {
        let partition = tile_partition().await;
        seed(&partition, TILE_URL, "old").await;
        let fetcher = Arc::new(MockFetcher::new(MockReply::Respond(Response::ok("new"))));
        let tiles = TileCacheOrchestrator::new(Arc::clone(&partition), fetcher);

        let response = tiles.handle(Request::get(TILE_URL)).await.unwrap();
        tiles.wait_for_refreshes().await;

        assert_eq!(response.body().as_ref(), b"old");
        assert_eq!(cached_body(&partition, TILE_URL).await.as_deref(), Some(&b"new"[..]));
        assert_eq!(tiles.stats().refreshes_stored, 1);
    }

    #[tokio::test]
    async fn test_miss_fetches_and_caches() {
        let partition = tile_partition().await;
        let fetcher = Arc::new(
            MockFetcher::offline().with_reply(TILE_URL, MockReply::Respond(Response::ok("B"))),
        );
        let tiles = TileCacheOrchestrator::new(Arc::clone(&partition), Arc::clone(&fetcher));

        let first = tiles.handle(Request::get(TILE_URL)).await.unwrap();
        tiles.wait_for_refreshes().await;
        let second = tiles.handle(Request::get(TILE_URL)).await.unwrap();

        assert_eq!(first.body().as_ref(), b"B");
        assert_eq!(second.body().as_ref(), b"B");
        let stats = tiles.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test]
    async fn test_hit_with_network_failure_keeps_old_entry() {
        let partition = tile_partition().await;
        seed(&partition, TILE_URL, "B_old").await;
        let tiles =
            TileCacheOrchestrator::new(Arc::clone(&partition), Arc::new(MockFetcher::offline()));

        let response = tiles.handle(Request::get(TILE_URL)).await.unwrap();
        tiles.wait_for_refreshes().await;

        assert_eq!(response.body().as_ref(), b"B_old");
        assert_eq!(cached_body(&partition, TILE_URL).await.as_deref(), Some(&b"B_old"[..]));
        assert_eq!(tiles.stats().refresh_failures, 1);
    }

    #[tokio::test]
    async fn test_miss_with_network_failure_is_error() {
        let tiles =
            TileCacheOrchestrator::new(tile_partition().await, Arc::new(MockFetcher::offline()));

        let err = tiles.handle(Request::get(TILE_URL)).await.unwrap_err();

        assert_eq!(
            err,
            TileError::Network {
                identity: Request::get(TILE_URL).identity(),
                source: FetchError::Transport("network unreachable".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_non_200_passes_through_uncached() {
        let partition = tile_partition().await;
        let fetcher = Arc::new(MockFetcher::new(MockReply::Respond(Response::new(
            404, "nope",
        ))));
        let tiles = TileCacheOrchestrator::new(Arc::clone(&partition), fetcher);

        let response = tiles.handle(Request::get(TILE_URL)).await.unwrap();
        tiles.wait_for_refreshes().await;

        assert_eq!(response.status(), 404);
        assert_eq!(response.body().as_ref(), b"nope");
        assert!(cached_body(&partition, TILE_URL).await.is_none());
        assert_eq!(tiles.stats().refreshes_not_ok, 1);
    }

    #[tokio::test]
    async fn test_non_200_never_overwrites_hit() {
        let partition = tile_partition().await;
        seed(&partition, TILE_URL, "good").await;
        let fetcher = Arc::new(MockFetcher::new(MockReply::Respond(Response::new(
            503, "busy",
        ))));
        let tiles = TileCacheOrchestrator::new(Arc::clone(&partition), fetcher);

        tiles.handle(Request::get(TILE_URL)).await.unwrap();
        tiles.wait_for_refreshes().await;

        assert_eq!(cached_body(&partition, TILE_URL).await.as_deref(), Some(&b"good"[..]));
    }

    #[tokio::test]
    async fn test_entry_materialized_during_failing_fetch_is_served() {
        let partition = tile_partition().await;
        let gate = Arc::new(Notify::new());
        let fetcher = Arc::new(MockFetcher::new(MockReply::Gated(
            Arc::clone(&gate),
            Box::new(MockReply::Fail(FetchError::Transport("dropped".into()))),
        )));
        let tiles = Arc::new(TileCacheOrchestrator::new(
            Arc::clone(&partition),
            Arc::clone(&fetcher),
        ));

        let waiting = {
            let tiles = Arc::clone(&tiles);
            tokio::spawn(async move { tiles.handle(Request::get(TILE_URL)).await })
        };
        while fetcher.calls() == 0 {
            tokio::task::yield_now().await;
        }

        seed(&partition, TILE_URL, "written by another request").await;
        gate.notify_one();

        let response = waiting.await.unwrap().unwrap();
        assert_eq!(response.body().as_ref(), b"written by another request");
        assert_eq!(tiles.stats().fallbacks, 1);
    }

    #[tokio::test]
    async fn test_concurrent_requests_not_coalesced_by_default() {
        let fetcher = Arc::new(MockFetcher::new(MockReply::Respond(Response::ok("t"))));
        let tiles = TileCacheOrchestrator::new(tile_partition().await, Arc::clone(&fetcher));

        let (a, b) = tokio::join!(
            tiles.handle(Request::get(TILE_URL)),
            tiles.handle(Request::get(TILE_URL))
        );

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(fetcher.calls_for(TILE_URL), 2);
    }

    #[tokio::test]
    async fn test_coalescing_shares_one_fetch() {
        let gate = Arc::new(Notify::new());
        let fetcher = Arc::new(MockFetcher::new(MockReply::Gated(
            Arc::clone(&gate),
            Box::new(MockReply::Respond(Response::ok("shared"))),
        )));
        let tiles = TileCacheOrchestrator::new(tile_partition().await, Arc::clone(&fetcher))
            .with_coalescing(true);

        let (a, b, ()) = tokio::join!(
            tiles.handle(Request::get(TILE_URL)),
            tiles.handle(Request::get(TILE_URL)),
            async { gate.notify_one() }
        );

        assert_eq!(a.unwrap().body().as_ref(), b"shared");
        assert_eq!(b.unwrap().body().as_ref(), b"shared");
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(tiles.coalescer().unwrap().stats().coalesced, 1);
    }

    #[tokio::test]
    async fn test_later_completing_refresh_wins() {
        let partition = tile_partition().await;
        let first_gate = Arc::new(Notify::new());
        let second_gate = Arc::new(Notify::new());
        let fetcher = Arc::new(
            MockFetcher::offline()
                .with_reply(
                    TILE_URL,
                    MockReply::Gated(
                        Arc::clone(&first_gate),
                        Box::new(MockReply::Respond(Response::ok("issued first"))),
                    ),
                )
                .with_reply(
                    TILE_URL,
                    MockReply::Gated(
                        Arc::clone(&second_gate),
                        Box::new(MockReply::Respond(Response::ok("issued second"))),
                    ),
                ),
        );
        let tiles = Arc::new(TileCacheOrchestrator::new(
            Arc::clone(&partition),
            Arc::clone(&fetcher),
        ));

        let requests: Vec<_> = (0..2)
            .map(|_| {
                let tiles = Arc::clone(&tiles);
                tokio::spawn(async move { tiles.handle(Request::get(TILE_URL)).await })
            })
            .collect();
        while fetcher.calls() < 2 {
            tokio::task::yield_now().await;
        }

        // Newer fetch lands first, then the older one completes over it
        second_gate.notify_one();
        while cached_body(&partition, TILE_URL).await.as_deref() != Some(&b"issued second"[..]) {
            tokio::task::yield_now().await;
        }
        first_gate.notify_one();

        for request in requests {
            request.await.unwrap().unwrap();
        }
        tiles.wait_for_refreshes().await;

        assert_eq!(
            cached_body(&partition, TILE_URL).await.as_deref(),
            Some(&b"issued first"[..])
        );
        assert_eq!(tiles.stats().refreshes_stored, 2);
    }

    #[tokio::test]
    async fn test_coalesced_failure_reaches_every_waiter() {
        let gate = Arc::new(Notify::new());
        let fetcher = Arc::new(MockFetcher::new(MockReply::Gated(
            Arc::clone(&gate),
            Box::new(MockReply::Fail(FetchError::Transport("reset".into()))),
        )));
        let tiles = TileCacheOrchestrator::new(tile_partition().await, Arc::clone(&fetcher))
            .with_coalescing(true);

        let (a, b, ()) = tokio::join!(
            tiles.handle(Request::get(TILE_URL)),
            tiles.handle(Request::get(TILE_URL)),
            async { gate.notify_one() }
        );

        for result in [a, b] {
            assert!(matches!(
                result,
                Err(TileError::Network {
                    source: FetchError::Transport(_),
                    ..
                })
            ));
        }
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_coalesced_failure_falls_back_to_entry_cached_meanwhile() {
        let partition = tile_partition().await;
        let gate = Arc::new(Notify::new());
        let fetcher = Arc::new(MockFetcher::new(MockReply::Gated(
            Arc::clone(&gate),
            Box::new(MockReply::Fail(FetchError::Transport("reset".into()))),
        )));
        let tiles = Arc::new(
            TileCacheOrchestrator::new(Arc::clone(&partition), Arc::clone(&fetcher))
                .with_coalescing(true),
        );

        let requests: Vec<_> = (0..2)
            .map(|_| {
                let tiles = Arc::clone(&tiles);
                tokio::spawn(async move { tiles.handle(Request::get(TILE_URL)).await })
            })
            .collect();
        while tiles.coalescer().unwrap().stats().total < 2 {
            tokio::task::yield_now().await;
        }

        seed(&partition, TILE_URL, "written elsewhere").await;
        gate.notify_one();

        for request in requests {
            let response = request.await.unwrap().unwrap();
            assert_eq!(response.body().as_ref(), b"written elsewhere");
        }
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(tiles.stats().fallbacks, 2);
    }

    /// Partition whose every operation fails.
    struct BrokenPartition;

    impl Partition for BrokenPartition {
        fn name(&self) -> &str {
            "broken"
        }

        async fn get(&self, _: &RequestIdentity) -> Result<Option<CacheEntry>, StoreError> {
            Err(StoreError::LockError)
        }

        async fn put(&self, _: RequestIdentity, _: CacheEntry) -> Result<(), StoreError> {
            Err(StoreError::LockError)
        }

        async fn delete(&self, _: &RequestIdentity) -> Result<bool, StoreError> {
            Err(StoreError::LockError)
        }

        async fn keys(&self) -> Result<Vec<RequestIdentity>, StoreError> {
            Err(StoreError::LockError)
        }

        async fn len(&self) -> Result<usize, StoreError> {
            Err(StoreError::LockError)
        }

        async fn evict_oldest(&self, _: usize) -> Result<Vec<RequestIdentity>, StoreError> {
            Err(StoreError::LockError)
        }
    }

    #[tokio::test]
    async fn test_storage_failure_degrades_to_passthrough() {
        let fetcher = Arc::new(MockFetcher::new(MockReply::Respond(Response::ok("live"))));
        let tiles = TileCacheOrchestrator::new(Arc::new(BrokenPartition), fetcher);

        let response = tiles.handle(Request::get(TILE_URL)).await.unwrap();
        tiles.wait_for_refreshes().await;

        assert_eq!(response.body().as_ref(), b"live");
        assert_eq!(tiles.stats().storage_errors, 2);
    }
}
