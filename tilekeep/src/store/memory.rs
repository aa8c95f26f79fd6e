//! In-memory partitioned store.

use crate::request::{CacheEntry, RequestIdentity};
use crate::store::ordered::OrderedIndex;
use crate::store::r#trait::{Partition, PartitionStore};
use crate::store::types::{validate_partition_name, RefreshPolicy, StoreError};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// A partition held entirely in memory.
pub struct MemoryPartition {
    name: String,
    entries: Mutex<OrderedIndex<CacheEntry>>,
}

impl MemoryPartition {
    fn new(name: String, policy: RefreshPolicy) -> Self {
        Self {
            name,
            entries: Mutex::new(OrderedIndex::new(policy)),
        }
    }

    fn with_entries<T>(
        &self,
        f: impl FnOnce(&mut OrderedIndex<CacheEntry>) -> T,
    ) -> Result<T, StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::LockError)?;
        Ok(f(&mut entries))
    }
}

impl Partition for MemoryPartition {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, identity: &RequestIdentity) -> Result<Option<CacheEntry>, StoreError> {
        self.with_entries(|entries| entries.get(identity).cloned())
    }

    async fn put(&self, identity: RequestIdentity, entry: CacheEntry) -> Result<(), StoreError> {
        self.with_entries(|entries| {
            entries.insert(identity, entry);
        })
    }

    async fn delete(&self, identity: &RequestIdentity) -> Result<bool, StoreError> {
        self.with_entries(|entries| entries.remove(identity).is_some())
    }

    async fn keys(&self) -> Result<Vec<RequestIdentity>, StoreError> {
        self.with_entries(|entries| entries.keys())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        self.with_entries(|entries| entries.len())
    }

    async fn evict_oldest(&self, count: usize) -> Result<Vec<RequestIdentity>, StoreError> {
        self.with_entries(|entries| {
            entries
                .pop_oldest(count)
                .into_iter()
                .map(|(identity, _, _)| identity)
                .collect()
        })
    }
}

/// Partitioned store that lives for the lifetime of the process.
///
/// Useful for embedding the interception layer where the host already
/// persists nothing, and as the reference store in tests.
pub struct MemoryPartitionStore {
    partitions: Mutex<Vec<Arc<MemoryPartition>>>,
    policy: RefreshPolicy,
}

impl MemoryPartitionStore {
    pub fn new(policy: RefreshPolicy) -> Self {
        Self {
            partitions: Mutex::new(Vec::new()),
            policy,
        }
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.policy
    }
}

impl Default for MemoryPartitionStore {
    fn default() -> Self {
        Self::new(RefreshPolicy::default())
    }
}

impl PartitionStore for MemoryPartitionStore {
    type Partition = MemoryPartition;

    async fn open(&self, name: &str) -> Result<Arc<MemoryPartition>, StoreError> {
        validate_partition_name(name)?;
        let mut partitions = self.partitions.lock().map_err(|_| StoreError::LockError)?;

        if let Some(existing) = partitions.iter().find(|p| p.name == name) {
            return Ok(Arc::clone(existing));
        }

        debug!(partition = name, "Creating memory partition");
        let partition = Arc::new(MemoryPartition::new(name.to_string(), self.policy));
        partitions.push(Arc::clone(&partition));
        Ok(partition)
    }

    async fn names(&self) -> Result<Vec<String>, StoreError> {
        let partitions = self.partitions.lock().map_err(|_| StoreError::LockError)?;
        Ok(partitions.iter().map(|p| p.name.clone()).collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let mut partitions = self.partitions.lock().map_err(|_| StoreError::LockError)?;
        let before = partitions.len();
        partitions.retain(|p| p.name != name);
        Ok(partitions.len() != before)
    }
}
