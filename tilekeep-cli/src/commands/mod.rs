//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`install`] - Install (precache) and activate (retire old versions)
//! - [`fetch`] - Push URLs through the interception layer
//! - [`clean`] - Prune the tile partition
//! - [`partitions`] - List partitions in the store
//! - [`config`] - Configuration management (show, path, init)

pub mod clean;
pub mod common;
pub mod config;
pub mod fetch;
pub mod install;
pub mod partitions;
