//! `install` and `activate` commands.

use tilekeep::config::ConfigFile;

use super::common::open_layer;
use crate::error::CliError;

/// Open the current partitions and precache the application shell.
pub async fn run_install(config: &ConfigFile) -> Result<(), CliError> {
    let layer = open_layer(config).await?;

    println!("Installing into: {}", config.store.directory.display());
    let report = layer.install().await?;

    for path in &report.stored {
        println!("  cached  {}", path);
    }
    for failure in &report.failures {
        println!("  FAILED  {} ({})", failure.path, failure.reason);
    }
    println!();
    println!(
        "Precached {} of {} assets",
        report.stored.len(),
        report.stored.len() + report.failures.len()
    );

    Ok(())
}

/// Delete partitions that belong to older versions.
pub async fn run_activate(config: &ConfigFile) -> Result<(), CliError> {
    let layer = open_layer(config).await?;
    layer.resume().await?;

    let report = layer.activate().await?;

    if report.deleted.is_empty() && report.failed.is_empty() {
        println!("No old partitions to delete");
    }
    for name in &report.deleted {
        println!("  deleted  {}", name);
    }
    for name in &report.failed {
        println!("  FAILED   {}", name);
    }
    for name in &report.retained {
        println!("  current  {}", name);
    }

    Ok(())
}
