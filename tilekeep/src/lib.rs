//! tilekeep - offline-tolerant interception layer for map tiles
//!
//! Sits between a mapping application and the network. Map tile requests are
//! served stale-while-revalidate from a versioned tile partition; everything
//! else is served cache-first from an application partition filled at
//! install time.
//!
//! # High-Level API
//!
//! For most use cases, the [`interceptor`] module provides the facade:
//!
//! ```ignore
//! use tilekeep::config::InterceptorConfig;
//! use tilekeep::interceptor::Interceptor;
//! use tilekeep::network::ReqwestFetcher;
//! use tilekeep::store::DiskPartitionStore;
//!
//! let config = InterceptorConfig::default();
//! let store = DiskPartitionStore::load("/var/cache/tilekeep", config.refresh_policy()).await?;
//! let layer = Interceptor::new(config, Arc::new(store), Arc::new(ReqwestFetcher::new()?));
//!
//! layer.install().await?;
//! layer.activate().await?;
//! let response = layer.handle(Request::get("https://mt0.google.com/vt?x=1&y=2&z=3")).await?;
//! ```

pub mod app;
pub mod classify;
pub mod config;
pub mod control;
pub mod interceptor;
pub mod lifecycle;
pub mod logging;
pub mod network;
pub mod orchestrator;
pub mod pruner;
pub mod request;
pub mod store;

/// Version of the tilekeep library and CLI.
///
/// Synchronized across the workspace and injected from `Cargo.toml` at
/// compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
