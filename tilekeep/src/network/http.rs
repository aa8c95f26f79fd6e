//! HTTP transport backed by reqwest.

use super::types::{FetchError, Fetcher};
use crate::request::{Request, Response};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Default User-Agent string for outbound requests.
/// Some tile servers reject requests that carry none.
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Async HTTP fetcher using a pooled reqwest client.
///
/// No overall request timeout is applied: a fetch completes, fails, or stays
/// pending for as long as the transport allows.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// Creates a fetcher with default pooling and no connect timeout.
    pub fn new() -> Result<Self, FetchError> {
        Self::build(None)
    }

    /// Creates a fetcher that gives up on connection establishment after
    /// `connect_timeout_secs`.
    pub fn with_connect_timeout(connect_timeout_secs: u64) -> Result<Self, FetchError> {
        Self::build(Some(Duration::from_secs(connect_timeout_secs)))
    }

    fn build(connect_timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            // Tile bursts hit the same handful of hosts
            .pool_max_idle_per_host(32)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_nodelay(true);

        if let Some(timeout) = connect_timeout {
            builder = builder.connect_timeout(timeout);
        }

        let client = builder.build().map_err(|e| {
            FetchError::Transport(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self { client })
    }
}

impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let url = request.url();
        trace!(method = request.method(), url = url, "HTTP request starting");

        let method = reqwest::Method::from_bytes(request.method().as_bytes())
            .map_err(|e| FetchError::InvalidRequest(format!("{}: {}", request.method(), e)))?;

        let mut builder = self.client.request(method, url);
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = match builder.send().await {
            Ok(resp) => {
                debug!(url = url, status = resp.status().as_u16(), "HTTP response received");
                resp
            }
            Err(e) if e.is_builder() => {
                return Err(FetchError::InvalidRequest(format!("{}: {}", url, e)));
            }
            Err(e) => {
                warn!(
                    url = url,
                    error = %e,
                    is_connect = e.is_connect(),
                    is_timeout = e.is_timeout(),
                    "HTTP request failed"
                );
                return Err(FetchError::Transport(e.to_string()));
            }
        };

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        match response.bytes().await {
            Ok(body) => {
                trace!(url = url, bytes = body.len(), "HTTP response body read");
                Ok(Response::new(status, body).with_headers(headers))
            }
            Err(e) => {
                warn!(url = url, error = %e, "Failed to read response body");
                Err(FetchError::Body(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::Notify;

    /// One scripted answer from [`MockFetcher`].
    #[derive(Clone, Debug)]
    pub enum MockReply {
        /// Answer immediately
        Respond(Response),
        /// Fail immediately
        Fail(FetchError),
        /// Never settle
        Hang,
        /// Answer once the notify fires
        Gated(Arc<Notify>, Box<MockReply>),
    }

    /// Scripted fetcher for tests.
    ///
    /// Replies queued for a URL are consumed in order; once a URL's queue is
    /// empty the fallback reply is used.
    pub struct MockFetcher {
        queued: Mutex<HashMap<String, VecDeque<MockReply>>>,
        fallback: MockReply,
        calls: AtomicUsize,
        requested: Mutex<Vec<String>>,
    }

    impl MockFetcher {
        pub fn new(fallback: MockReply) -> Self {
            Self {
                queued: Mutex::new(HashMap::new()),
                fallback,
                calls: AtomicUsize::new(0),
                requested: Mutex::new(Vec::new()),
            }
        }

        /// Fetcher whose every request fails with a transport error.
        pub fn offline() -> Self {
            Self::new(MockReply::Fail(FetchError::Transport(
                "network unreachable".to_string(),
            )))
        }

        pub fn with_reply(self, url: &str, reply: MockReply) -> Self {
            let key = Request::get(url).url().to_string();
            self.queued
                .lock()
                .unwrap()
                .entry(key)
                .or_default()
                .push_back(reply);
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn calls_for(&self, url: &str) -> usize {
            let key = Request::get(url).url().to_string();
            self.requested
                .lock()
                .unwrap()
                .iter()
                .filter(|u| **u == key)
                .count()
        }

        fn next_reply(&self, url: &str) -> MockReply {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requested.lock().unwrap().push(url.to_string());
            self.queued
                .lock()
                .unwrap()
                .get_mut(url)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| self.fallback.clone())
        }
    }

    async fn settle(reply: MockReply) -> Result<Response, FetchError> {
        let mut reply = reply;
        loop {
            match reply {
                MockReply::Respond(response) => return Ok(response),
                MockReply::Fail(err) => return Err(err),
                MockReply::Hang => std::future::pending::<()>().await,
                MockReply::Gated(gate, inner) => {
                    gate.notified().await;
                    reply = *inner;
                }
            }
        }
    }

    impl Fetcher for MockFetcher {
        async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
            let reply = self.next_reply(request.url());
            settle(reply).await
        }
    }

    #[tokio::test]
    async fn test_mock_fetcher_queue_then_fallback() {
        let mock = MockFetcher::offline()
            .with_reply("https://a.example/x", MockReply::Respond(Response::ok("first")));

        let first = mock.fetch(&Request::get("https://a.example/x")).await;
        let second = mock.fetch(&Request::get("https://a.example/x")).await;

        assert_eq!(first.unwrap().body().as_ref(), b"first");
        assert!(matches!(second, Err(FetchError::Transport(_))));
        assert_eq!(mock.calls(), 2);
        assert_eq!(mock.calls_for("https://a.example/x"), 2);
    }

    #[tokio::test]
    async fn test_mock_fetcher_gate_releases() {
        let gate = Arc::new(Notify::new());
        let mock = MockFetcher::new(MockReply::Gated(
            gate.clone(),
            Box::new(MockReply::Respond(Response::ok("late"))),
        ));

        gate.notify_one();
        let response = mock.fetch(&Request::get("https://a.example/y")).await.unwrap();
        assert_eq!(response.body().as_ref(), b"late");
    }

    #[test]
    fn test_reqwest_fetcher_builds() {
        assert!(ReqwestFetcher::new().is_ok());
        assert!(ReqwestFetcher::with_connect_timeout(5).is_ok());
    }

    #[tokio::test]
    async fn test_reqwest_fetcher_rejects_bad_method() {
        let fetcher = ReqwestFetcher::new().unwrap();
        let result = fetcher
            .fetch(&Request::new("BAD METHOD", "http://127.0.0.1:9/"))
            .await;

        assert!(matches!(result, Err(FetchError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_reqwest_fetcher_rejects_relative_url() {
        let fetcher = ReqwestFetcher::new().unwrap();
        let result = fetcher.fetch(&Request::get("/index.html")).await;

        assert!(matches!(result, Err(FetchError::InvalidRequest(_))));
    }
}
