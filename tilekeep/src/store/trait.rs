//! Partition and store traits.
//!
//! Every method is a suspension point: callers `.await` each storage read or
//! write, and implementations are free to do real I/O behind them.

use crate::request::{CacheEntry, RequestIdentity};
use crate::store::types::StoreError;
use std::future::Future;
use std::sync::Arc;

/// A named container of cache entries kept in insertion order.
///
/// Writes to the same identity are last-write-wins; there is no
/// compare-and-swap.
pub trait Partition: Send + Sync + 'static {
    /// Partition name, including its version tag.
    fn name(&self) -> &str;

    /// Look up the entry stored for `identity`.
    fn get(
        &self,
        identity: &RequestIdentity,
    ) -> impl Future<Output = Result<Option<CacheEntry>, StoreError>> + Send;

    /// Store `entry` under `identity`, replacing any previous entry.
    ///
    /// Whether a replacement moves to the newest position is decided by the
    /// store's [`RefreshPolicy`](crate::store::RefreshPolicy).
    fn put(
        &self,
        identity: RequestIdentity,
        entry: CacheEntry,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Remove the entry for `identity`. Returns whether one existed.
    fn delete(
        &self,
        identity: &RequestIdentity,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// All identities, oldest first.
    fn keys(&self) -> impl Future<Output = Result<Vec<RequestIdentity>, StoreError>> + Send;

    /// Number of stored entries.
    fn len(&self) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// Remove up to `count` of the oldest entries and return their identities,
    /// oldest first.
    fn evict_oldest(
        &self,
        count: usize,
    ) -> impl Future<Output = Result<Vec<RequestIdentity>, StoreError>> + Send;
}

/// A collection of named partitions.
pub trait PartitionStore: Send + Sync + 'static {
    type Partition: Partition;

    /// Open the named partition, creating it if needed.
    ///
    /// Opening the same name twice yields handles to the same partition.
    fn open(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Arc<Self::Partition>, StoreError>> + Send;

    /// Names of all existing partitions, in creation order.
    fn names(&self) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;

    /// Delete the named partition and everything in it. Returns whether it existed.
    ///
    /// Handles already given out are detached: the in-memory store keeps
    /// them readable, the disk store fails their I/O.
    fn delete(&self, name: &str) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Whether a partition with this name exists.
    fn contains(&self, name: &str) -> impl Future<Output = Result<bool, StoreError>> + Send {
        async move { Ok(self.names().await?.iter().any(|n| n == name)) }
    }

    /// Search every partition, in creation order, for `identity`.
    fn match_any(
        &self,
        identity: &RequestIdentity,
    ) -> impl Future<Output = Result<Option<CacheEntry>, StoreError>> + Send {
        async move {
            for name in self.names().await? {
                let partition = self.open(&name).await?;
                if let Some(entry) = partition.get(identity).await? {
                    return Ok(Some(entry));
                }
            }
            Ok(None)
        }
    }
}
