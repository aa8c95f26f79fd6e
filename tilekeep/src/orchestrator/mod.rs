//! Stale-while-revalidate handling of map tile requests.
//!
//! A tile request is answered from the tile partition when possible and
//! refreshed from the network in the background either way. Only when
//! nothing is cached does the caller wait on the network.

mod coalesce;
mod stats;
mod tiles;
mod types;

pub use coalesce::{CoalescerStats, RefreshCoalescer, RefreshResult, Registration};
pub use stats::{OrchestratorStats, OrchestratorStatsSnapshot};
pub use tiles::TileCacheOrchestrator;
pub use types::TileError;
