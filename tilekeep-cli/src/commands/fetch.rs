//! `fetch` command: push URLs through the interception layer.
//!
//! Tile URLs are served stale-while-revalidate, everything else cache-first,
//! exactly as an intercepted page request would be. The command waits for
//! background refreshes before exiting so they land in the store.

use tilekeep::classify::RequestKind;
use tilekeep::config::ConfigFile;
use tilekeep::request::Request;

use super::common::open_layer;
use crate::error::CliError;

pub async fn run(config: &ConfigFile, urls: &[String], method: &str) -> Result<(), CliError> {
    let layer = open_layer(config).await?;
    layer.resume().await?;

    let mut failed = 0;
    for url in urls {
        let request = Request::new(method, url);
        let kind = match layer.classifier().classify(&request) {
            RequestKind::Tile => "tile",
            RequestKind::App => "app",
        };

        match layer.handle(request).await {
            Ok(response) => {
                println!(
                    "{} {:>4} {:>9} bytes  {}",
                    kind,
                    response.status(),
                    response.body().len(),
                    url
                );
            }
            Err(e) => {
                failed += 1;
                println!("{} FAIL  {}  ({})", kind, url, e);
            }
        }
    }

    layer.wait_for_refreshes().await;

    if let Some(stats) = layer.tile_stats() {
        tracing::debug!(
            hits = stats.hits,
            misses = stats.misses,
            stored = stats.refreshes_stored,
            "Tile refreshes settled"
        );
    }

    if failed > 0 {
        return Err(CliError::Fetch {
            failed,
            total: urls.len(),
        });
    }
    Ok(())
}
