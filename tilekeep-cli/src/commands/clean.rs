//! `clean` command: the CLEAN_MAP_CACHE control message from the shell.

use tilekeep::config::ConfigFile;
use tilekeep::control::ControlMessage;

use super::common::open_layer;
use crate::error::CliError;

pub async fn run(config: &ConfigFile, max: Option<usize>) -> Result<(), CliError> {
    let mut config = config.clone();
    if let Some(max) = max {
        config.interceptor = config.interceptor.with_max_tile_entries(max);
    }

    let layer = open_layer(&config).await?;
    layer.resume().await?;

    let payload = ControlMessage::CleanMapCache.to_payload();
    match layer.on_message(&payload).await? {
        Some(outcome) if outcome.is_noop() => {
            println!(
                "{}: {} entries, nothing to clean (max {})",
                outcome.partition,
                outcome.before,
                config.interceptor.max_tile_entries()
            );
        }
        Some(outcome) => {
            println!(
                "{}: deleted {} old tiles, {} kept",
                outcome.partition,
                outcome.removed.len(),
                outcome.retained
            );
        }
        None => {}
    }

    Ok(())
}
