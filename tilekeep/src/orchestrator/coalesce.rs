//! Optional coalescing of background refreshes.
//!
//! Without coalescing, every tile request issues its own network fetch, so a
//! burst of requests for the same tile produces a burst of identical fetches.
//! With it, the first request for an identity owns the fetch and later
//! requests subscribe to its result.
//!
//! ```text
//! handle(T) ─┐
//!            │                               one fetch
//! handle(T) ─┼──► RefreshCoalescer ─────────► Fetcher
//!            │          │                        │
//! handle(T) ─┘          ▼                        ▼
//!                 [all three get         result broadcast
//!                  the same result] ◄────────────┘
//! ```

use crate::network::FetchError;
use crate::request::{RequestIdentity, Response};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Shared outcome of one refresh.
pub type RefreshResult = Result<Response, FetchError>;

/// Tracks in-flight refreshes keyed by request identity.
pub struct RefreshCoalescer {
    in_flight: DashMap<RequestIdentity, broadcast::Sender<RefreshResult>>,
    total: AtomicU64,
    coalesced: AtomicU64,
}

/// Counters for coalescing effectiveness.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CoalescerStats {
    /// Refreshes requested
    pub total: u64,
    /// Requests that joined an existing refresh
    pub coalesced: u64,
}

impl CoalescerStats {
    /// Fraction of requests that joined an existing refresh (0.0 to 1.0).
    pub fn coalescing_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.coalesced as f64 / self.total as f64
        }
    }
}

/// Outcome of [`RefreshCoalescer::register`].
pub enum Registration {
    /// Caller owns the refresh and must call [`RefreshCoalescer::complete`].
    Leader,
    /// A refresh is already running; wait on the receiver.
    Follower(broadcast::Receiver<RefreshResult>),
}

impl Registration {
    pub fn is_leader(&self) -> bool {
        matches!(self, Self::Leader)
    }
}

impl RefreshCoalescer {
    pub fn new() -> Self {
        Self {
            in_flight: DashMap::new(),
            total: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
        }
    }

    /// Register interest in refreshing `identity`.
    pub fn register(&self, identity: &RequestIdentity) -> Registration {
        self.total.fetch_add(1, Ordering::Relaxed);

        match self.in_flight.entry(identity.clone()) {
            Entry::Occupied(entry) => {
                self.coalesced.fetch_add(1, Ordering::Relaxed);
                debug!(identity = %identity, "Joining in-flight refresh");
                Registration::Follower(entry.get().subscribe())
            }
            Entry::Vacant(entry) => {
                // Typical fan-in is a handful of map views asking for one tile
                let (tx, _rx) = broadcast::channel(16);
                entry.insert(tx);
                Registration::Leader
            }
        }
    }

    /// Publish the leader's result to every follower and clear the slot.
    pub fn complete(&self, identity: &RequestIdentity, result: RefreshResult) {
        if let Some((_, tx)) = self.in_flight.remove(identity) {
            let waiters = tx.receiver_count();
            let _ = tx.send(result);
            if waiters > 0 {
                debug!(identity = %identity, waiters = waiters, "Refresh result shared");
            }
        }
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn stats(&self) -> CoalescerStats {
        CoalescerStats {
            total: self.total.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
        }
    }
}

/// Held by the leader's refresh task; publishes its result.
///
/// Dropped without [`LeaderGuard::finish`] (the task panicked or was
/// cancelled), it completes the slot with [`FetchError::Aborted`] so
/// followers are never left waiting.
pub struct LeaderGuard {
    coalescer: Arc<RefreshCoalescer>,
    identity: Option<RequestIdentity>,
}

impl LeaderGuard {
    pub fn new(coalescer: Arc<RefreshCoalescer>, identity: RequestIdentity) -> Self {
        Self {
            coalescer,
            identity: Some(identity),
        }
    }

    pub fn finish(mut self, result: RefreshResult) {
        if let Some(identity) = self.identity.take() {
            self.coalescer.complete(&identity, result);
        }
    }
}

impl Drop for LeaderGuard {
    fn drop(&mut self) {
        if let Some(identity) = self.identity.take() {
            self.coalescer.complete(
                &identity,
                Err(FetchError::Aborted("refresh ended without a result".to_string())),
            );
        }
    }
}

impl Default for RefreshCoalescer {
    fn default() -> Self {
        Self::new()
    }
}
