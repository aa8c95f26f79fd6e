//! Network access abstraction.
//!
//! The interception core never talks to the network directly; it goes
//! through a [`Fetcher`], which lets tests substitute scripted responses and
//! lets hosts plug in their own transport.
//!
//! ```ignore
//! use tilekeep::network::{Fetcher, ReqwestFetcher};
//! use tilekeep::request::Request;
//!
//! let fetcher = ReqwestFetcher::new()?;
//! let response = fetcher.fetch(&Request::get("https://mt0.google.com/vt?x=1&y=2&z=3")).await?;
//! ```

mod http;
mod types;

pub use http::ReqwestFetcher;
pub use types::{FetchError, Fetcher};

#[cfg(test)]
pub use http::tests::{MockFetcher, MockReply};
