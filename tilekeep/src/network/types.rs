//! Fetcher trait and network error type.

use crate::request::{Request, Response};
use std::future::Future;
use thiserror::Error;

/// A network fetch that produced no response at all.
///
/// Non-success HTTP statuses are *not* errors: they come back as an ordinary
/// [`Response`] and are passed through to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Connection, DNS, TLS or protocol failure
    #[error("Request failed: {0}")]
    Transport(String),

    /// The response started but its body could not be read
    #[error("Failed to read response body: {0}")]
    Body(String),

    /// The request could not be expressed on the wire
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The task driving the fetch ended without a result
    #[error("Fetch aborted: {0}")]
    Aborted(String),
}

/// Asynchronous network transport.
///
/// Implementations must be cheap to share: the orchestrator holds one behind
/// an `Arc` and calls it from spawned background tasks.
pub trait Fetcher: Send + Sync + 'static {
    /// Issue the request and return whatever the server answered.
    fn fetch(&self, request: &Request) -> impl Future<Output = Result<Response, FetchError>> + Send;
}
