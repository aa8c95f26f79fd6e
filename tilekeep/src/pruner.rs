//! FIFO size bound for the tile partition.
//!
//! Pruning is never automatic: it runs when the application asks for it
//! (see [`ControlMessage::CleanMapCache`](crate::control::ControlMessage)).
//! Eviction is strictly by insertion order. Reading an entry does not
//! protect it; only rewriting it can, and only under
//! [`RefreshPolicy::ResetAge`](crate::store::RefreshPolicy).

use crate::request::RequestIdentity;
use crate::store::{Partition, StoreError};
use tracing::{debug, info};

/// Result of one prune pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneOutcome {
    /// Partition that was pruned
    pub partition: String,
    /// Entry count before pruning
    pub before: usize,
    /// Identities removed, oldest first
    pub removed: Vec<RequestIdentity>,
    /// Entry count after pruning
    pub retained: usize,
}

impl PruneOutcome {
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty()
    }
}

/// Enforces a maximum entry count on a partition.
#[derive(Debug, Clone, Copy)]
pub struct CachePruner {
    max_entries: usize,
}

impl CachePruner {
    pub fn new(max_entries: usize) -> Self {
        Self { max_entries }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub async fn prune<P: Partition>(&self, partition: &P) -> Result<PruneOutcome, StoreError> {
        prune(partition, self.max_entries).await
    }
}

/// Delete the oldest entries of `partition` until at most `max_entries` remain.
pub async fn prune<P: Partition>(
    partition: &P,
    max_entries: usize,
) -> Result<PruneOutcome, StoreError> {
    let before = partition.len().await?;

    if before <= max_entries {
        debug!(
            partition = partition.name(),
            entries = before,
            max_entries = max_entries,
            "Prune not needed"
        );
        return Ok(PruneOutcome {
            partition: partition.name().to_string(),
            before,
            removed: Vec::new(),
            retained: before,
        });
    }

    let excess = before - max_entries;
    let removed = partition.evict_oldest(excess).await?;
    let retained = partition.len().await?;

    info!(
        partition = partition.name(),
        deleted = removed.len(),
        retained = retained,
        "Cleaned map cache: deleted {} old tiles",
        removed.len()
    );

    Ok(PruneOutcome {
        partition: partition.name().to_string(),
        before,
        removed,
        retained,
    })
}
