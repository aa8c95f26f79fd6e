//! Directory-backed partitioned store.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/
//!   partitions.json            # partition names in creation order
//!   <partition-name>/
//!     00000000000000000042.body  # response body
//!     00000000000000000042.json  # identity, status, headers, timestamps
//! ```
//!
//! File stems are the entry's sequence number, so a directory scan rebuilds
//! insertion order. The body is written before the record; an entry without a
//! readable record is ignored on load.

use crate::request::{CacheEntry, RequestIdentity, Response};
use crate::store::ordered::OrderedIndex;
use crate::store::r#trait::{Partition, PartitionStore};
use crate::store::types::{validate_partition_name, RefreshPolicy, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const MANIFEST_FILE: &str = "partitions.json";
const RECORD_EXT: &str = "json";
const BODY_EXT: &str = "body";

/// Metadata persisted next to each body file.
#[derive(Debug, Serialize, Deserialize)]
struct EntryRecord {
    identity: String,
    sequence: u64,
    status: u16,
    headers: Vec<(String, String)>,
    stored_at_ms: u64,
    body_len: u64,
}

fn entry_stem(sequence: u64) -> String {
    format!("{:020}", sequence)
}

async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, data).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

async fn remove_if_exists(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// A partition stored as one directory of body/record file pairs.
pub struct DiskPartition {
    name: String,
    dir: PathBuf,
    index: Mutex<OrderedIndex<()>>,
}

impl DiskPartition {
    /// Open the partition directory, creating it if needed, and rebuild the
    /// index from the records found there.
    async fn load(name: String, dir: PathBuf, policy: RefreshPolicy) -> Result<Self, StoreError> {
        fs::create_dir_all(&dir).await?;

        let mut index = OrderedIndex::new(policy);
        let mut stale = Vec::new();
        let mut skipped = 0usize;

        let mut entries = fs::read_dir(&dir).await?;
        while let Some(dirent) = entries.next_entry().await? {
            let path = dirent.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
                continue;
            }

            match Self::read_record(&path).await {
                Ok(record) => {
                    let identity = RequestIdentity::from_serialized(record.identity);
                    if let Some((loser, ())) = index.restore(record.sequence, identity, ()) {
                        stale.push(loser);
                    }
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable entry record");
                    skipped += 1;
                }
            }
        }

        let partition = Self {
            name,
            dir,
            index: Mutex::new(index),
        };

        for sequence in stale {
            partition.remove_files(sequence).await?;
        }

        let entries = partition.index.lock().await.len();
        debug!(
            partition = %partition.name,
            entries = entries,
            skipped = skipped,
            "Disk partition loaded"
        );

        Ok(partition)
    }

    async fn read_record(path: &Path) -> Result<EntryRecord, StoreError> {
        let raw = fs::read(path).await?;
        let record: EntryRecord =
            serde_json::from_slice(&raw).map_err(|e| StoreError::CorruptRecord {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let stem_matches = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<u64>().ok())
            == Some(record.sequence);
        if !stem_matches {
            return Err(StoreError::CorruptRecord {
                path: path.to_path_buf(),
                reason: format!("file name does not match sequence {}", record.sequence),
            });
        }
        if record.sequence.checked_add(1).is_none() {
            return Err(StoreError::CorruptRecord {
                path: path.to_path_buf(),
                reason: "sequence out of range".to_string(),
            });
        }

        Ok(record)
    }

    fn record_path(&self, sequence: u64) -> PathBuf {
        self.dir
            .join(entry_stem(sequence))
            .with_extension(RECORD_EXT)
    }

    fn body_path(&self, sequence: u64) -> PathBuf {
        self.dir.join(entry_stem(sequence)).with_extension(BODY_EXT)
    }

    async fn remove_files(&self, sequence: u64) -> Result<(), StoreError> {
        remove_if_exists(&self.record_path(sequence)).await?;
        remove_if_exists(&self.body_path(sequence)).await
    }

    async fn read_entry(&self, sequence: u64) -> Result<CacheEntry, StoreError> {
        let record_path = self.record_path(sequence);
        let record = Self::read_record(&record_path).await?;
        let body = fs::read(self.body_path(sequence)).await?;

        if body.len() as u64 != record.body_len {
            return Err(StoreError::CorruptRecord {
                path: record_path,
                reason: format!(
                    "body length {} does not match recorded {}",
                    body.len(),
                    record.body_len
                ),
            });
        }

        let response = Response::new(record.status, body).with_headers(record.headers);
        Ok(CacheEntry::with_stored_at(
            response,
            CacheEntry::time_from_millis(record.stored_at_ms),
        ))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Partition for DiskPartition {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, identity: &RequestIdentity) -> Result<Option<CacheEntry>, StoreError> {
        let mut index = self.index.lock().await;
        let Some(sequence) = index.sequence_of(identity) else {
            return Ok(None);
        };

        match self.read_entry(sequence).await {
            Ok(entry) => Ok(Some(entry)),
            Err(StoreError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                // Files removed underneath us
                index.remove(identity);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn put(&self, identity: RequestIdentity, entry: CacheEntry) -> Result<(), StoreError> {
        let mut index = self.index.lock().await;
        let sequence = index.sequence_for(&identity);

        let response = entry.response();
        let record = EntryRecord {
            identity: identity.as_str().to_string(),
            sequence,
            status: response.status(),
            headers: response.headers().to_vec(),
            stored_at_ms: entry.stored_at_millis(),
            body_len: response.body().len() as u64,
        };

        write_atomic(&self.body_path(sequence), response.body()).await?;
        write_atomic(&self.record_path(sequence), &serde_json::to_vec(&record)?).await?;

        let inserted = index.insert(identity, ());
        if let Some((old_sequence, ())) = inserted.replaced {
            if old_sequence != inserted.sequence {
                self.remove_files(old_sequence).await?;
            }
        }
        Ok(())
    }

    async fn delete(&self, identity: &RequestIdentity) -> Result<bool, StoreError> {
        let mut index = self.index.lock().await;
        match index.remove(identity) {
            Some((sequence, ())) => {
                self.remove_files(sequence).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn keys(&self) -> Result<Vec<RequestIdentity>, StoreError> {
        Ok(self.index.lock().await.keys())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.index.lock().await.len())
    }

    async fn evict_oldest(&self, count: usize) -> Result<Vec<RequestIdentity>, StoreError> {
        let mut index = self.index.lock().await;

        // Drop each slot only once its files are gone, so a failed delete
        // leaves the index agreeing with the directory.
        let mut identities = Vec::with_capacity(count.min(index.len()));
        while identities.len() < count {
            let Some((sequence, identity)) = index.oldest() else {
                break;
            };
            self.remove_files(sequence).await?;
            index.remove(&identity);
            identities.push(identity);
        }
        Ok(identities)
    }
}

struct StoreState {
    /// Partition names in creation order
    names: Vec<String>,
    /// Partitions opened so far
    loaded: HashMap<String, Arc<DiskPartition>>,
}

/// Partitioned store persisted under a root directory.
///
/// Survives process restarts: reopening the same root sees the partitions
/// and entries written before, in the same order.
pub struct DiskPartitionStore {
    root: PathBuf,
    policy: RefreshPolicy,
    state: Mutex<StoreState>,
}

impl DiskPartitionStore {
    /// Open (or initialise) a store rooted at `root`.
    ///
    /// Only directories listed in the manifest are partitions. Anything else
    /// under `root` is left alone; manifest names without a directory are
    /// dropped.
    pub async fn load(root: impl Into<PathBuf>, policy: RefreshPolicy) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;

        let manifest_path = root.join(MANIFEST_FILE);
        let manifest: Vec<String> = match fs::read(&manifest_path).await {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|e| StoreError::CorruptRecord {
                path: manifest_path.clone(),
                reason: e.to_string(),
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::with_capacity(manifest.len());
        for name in manifest {
            if validate_partition_name(&name).is_err() || names.contains(&name) {
                warn!(partition = %name, "Ignoring invalid manifest entry");
                continue;
            }
            match fs::metadata(root.join(&name)).await {
                Ok(meta) if meta.is_dir() => names.push(name),
                Ok(_) => warn!(partition = %name, "Manifest entry is not a directory, dropping"),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(partition = %name, "Partition directory missing, dropping")
                }
                Err(e) => return Err(e.into()),
            }
        }

        let store = Self {
            root,
            policy,
            state: Mutex::new(StoreState {
                names,
                loaded: HashMap::new(),
            }),
        };

        {
            let state = store.state.lock().await;
            store.write_manifest(&state.names).await?;
            info!(
                root = %store.root.display(),
                partitions = state.names.len(),
                "Disk store opened"
            );
        }

        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.policy
    }

    async fn write_manifest(&self, names: &[String]) -> Result<(), StoreError> {
        let raw = serde_json::to_vec_pretty(names)?;
        write_atomic(&self.root.join(MANIFEST_FILE), &raw).await
    }
}

impl PartitionStore for DiskPartitionStore {
    type Partition = DiskPartition;

    async fn open(&self, name: &str) -> Result<Arc<DiskPartition>, StoreError> {
        validate_partition_name(name)?;
        let mut state = self.state.lock().await;

        if let Some(existing) = state.loaded.get(name) {
            return Ok(Arc::clone(existing));
        }

        let partition = Arc::new(
            DiskPartition::load(name.to_string(), self.root.join(name), self.policy).await?,
        );
        state.loaded.insert(name.to_string(), Arc::clone(&partition));

        if !state.names.iter().any(|n| n == name) {
            state.names.push(name.to_string());
            self.write_manifest(&state.names).await?;
        }

        Ok(partition)
    }

    async fn names(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.state.lock().await.names.clone())
    }

    async fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let Some(position) = state.names.iter().position(|n| n == name) else {
            return Ok(false);
        };

        state.names.remove(position);
        state.loaded.remove(name);

        match fs::remove_dir_all(self.root.join(name)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        self.write_manifest(&state.names).await?;
        Ok(true)
    }
}
