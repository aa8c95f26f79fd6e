//! Error type for the tile path.

use crate::network::FetchError;
use crate::request::RequestIdentity;
use thiserror::Error;

/// A tile request that could not be answered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TileError {
    /// Nothing cached and the network fetch failed
    #[error("Network fetch failed for {identity}: {source}")]
    Network {
        identity: RequestIdentity,
        #[source]
        source: FetchError,
    },
}

impl TileError {
    pub fn fetch_error(&self) -> &FetchError {
        match self {
            TileError::Network { source, .. } => source,
        }
    }
}
