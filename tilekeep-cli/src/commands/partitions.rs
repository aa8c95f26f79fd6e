//! `partitions` command: list what the store holds.

use serde_json::json;
use tilekeep::config::ConfigFile;
use tilekeep::store::{Partition, PartitionStore};

use super::common::{open_store, store_error};
use crate::error::CliError;

pub async fn run(config: &ConfigFile, as_json: bool) -> Result<(), CliError> {
    let root = &config.store.directory;
    let store = open_store(config).await?;
    let current = config.interceptor.current_partition_names();

    let mut rows = Vec::new();
    for name in store.names().await.map_err(|e| store_error(root, e))? {
        let partition = store.open(&name).await.map_err(|e| store_error(root, e))?;
        let entries = partition.len().await.map_err(|e| store_error(root, e))?;
        rows.push((current.contains(&name), name, entries));
    }

    if as_json {
        let list: Vec<_> = rows
            .iter()
            .map(|(is_current, name, entries)| {
                json!({ "name": name, "entries": entries, "current": is_current })
            })
            .collect();
        println!("{}", json!({ "store": root.display().to_string(), "partitions": list }));
        return Ok(());
    }

    println!("Store: {}", root.display());
    if rows.is_empty() {
        println!("  (no partitions)");
    }
    for (is_current, name, entries) in rows {
        let marker = if is_current { "*" } else { " " };
        println!("  {} {:<32} {:>8} entries", marker, name, entries);
    }

    Ok(())
}
