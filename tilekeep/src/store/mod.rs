//! Partitioned response store.
//!
//! A store holds named partitions; each partition holds [`CacheEntry`]s in
//! insertion order. Two implementations are provided:
//!
//! - [`MemoryPartitionStore`]: process-lifetime storage
//! - [`DiskPartitionStore`]: one directory per partition, reloaded on start
//!
//! [`CacheEntry`]: crate::request::CacheEntry

mod disk;
mod memory;
mod ordered;
mod r#trait;
mod types;

pub use disk::{DiskPartition, DiskPartitionStore};
pub use memory::{MemoryPartition, MemoryPartitionStore};
pub use r#trait::{Partition, PartitionStore};
pub use types::{validate_partition_name, PartitionRole, PartitionSpec, RefreshPolicy, StoreError};
