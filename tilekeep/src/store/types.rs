//! Core types for the partitioned store.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Store-related errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error during store operations
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to acquire lock
    #[error("Failed to acquire store lock")]
    LockError,

    /// Partition names become directory names, so they are restricted
    #[error("Invalid partition name: '{0}'")]
    InvalidPartitionName(String),

    /// A persisted entry could not be decoded
    #[error("Corrupt entry record {path}: {reason}")]
    CorruptRecord { path: PathBuf, reason: String },

    /// Record serialization failed
    #[error("Record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// What happens to an entry's position when it is overwritten.
///
/// Position drives FIFO pruning, so this decides whether a tile that keeps
/// being refreshed survives a prune.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshPolicy {
    /// Overwriting moves the entry to the newest position.
    #[default]
    ResetAge,
    /// Overwriting keeps the entry where it was first inserted.
    PreserveAge,
}

impl RefreshPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshPolicy::ResetAge => "reset_age",
            RefreshPolicy::PreserveAge => "preserve_age",
        }
    }
}

impl fmt::Display for RefreshPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefreshPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "reset_age" | "reset" => Ok(RefreshPolicy::ResetAge),
            "preserve_age" | "preserve" => Ok(RefreshPolicy::PreserveAge),
            other => Err(format!(
                "unknown refresh policy '{}', expected 'reset_age' or 'preserve_age'",
                other
            )),
        }
    }
}

/// Logical role of a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitionRole {
    /// Application shell assets
    App,
    /// Map imagery
    Tile,
}

impl fmt::Display for PartitionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionRole::App => f.write_str("app"),
            PartitionRole::Tile => f.write_str("tile"),
        }
    }
}

/// Base name plus version tag; together they form the partition name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSpec {
    pub base: String,
    pub version: String,
}

impl PartitionSpec {
    pub fn new(base: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            version: version.into(),
        }
    }

    /// Full partition name, e.g. `map-tiles-v2`.
    pub fn name(&self) -> String {
        if self.version.is_empty() {
            self.base.clone()
        } else {
            format!("{}-{}", self.base, self.version)
        }
    }
}

/// Check that a partition name is usable as a single path component.
pub fn validate_partition_name(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidPartitionName(name.to_string()))
    }
}
