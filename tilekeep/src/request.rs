//! Request, response, and identity types shared by every interception path.
//!
//! A [`Request`] is what the application asks for. Its [`RequestIdentity`]
//! (method + normalized URL) is the key used to address cached entries, so
//! two requests that differ only in headers resolve to the same entry.

use bytes::Bytes;
use url::Url;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// An outbound resource request issued by the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: String,
    url: String,
    headers: Vec<(String, String)>,
}

impl Request {
    /// Create a request with an explicit method.
    ///
    /// The method is upper-cased and the URL normalized (lower-case scheme and
    /// host, default port dropped, fragment removed). URLs that cannot be
    /// parsed are kept verbatim after trimming.
    pub fn new(method: impl AsRef<str>, url: impl AsRef<str>) -> Self {
        Self {
            method: method.as_ref().trim().to_ascii_uppercase(),
            url: normalize_url(url.as_ref()),
            headers: Vec::new(),
        }
    }

    /// Create a GET request.
    pub fn get(url: impl AsRef<str>) -> Self {
        Self::new("GET", url)
    }

    /// Attach a header. Headers travel to the network but never affect identity.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// The cache key for this request.
    pub fn identity(&self) -> RequestIdentity {
        RequestIdentity::from_parts(&self.method, &self.url)
    }

    /// ASCII serialization of the URL's origin (`scheme://host[:port]`).
    ///
    /// Returns `None` for unparseable URLs and opaque origins.
    pub fn origin(&self) -> Option<String> {
        let url = Url::parse(&self.url).ok()?;
        let origin = url.origin();
        origin.is_tuple().then(|| origin.ascii_serialization())
    }
}

fn normalize_url(raw: &str) -> String {
    let raw = raw.trim();
    match Url::parse(raw) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => raw.to_string(),
    }
}

/// Normalized key (method + URL) addressing one cached resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestIdentity(String);

impl RequestIdentity {
    fn from_parts(method: &str, url: &str) -> Self {
        Self(format!("{} {}", method, url))
    }

    /// Rebuild an identity from its serialized form (as produced by [`Self::as_str`]).
    ///
    /// Used by persistent stores when reloading their index.
    pub(crate) fn from_serialized(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn method(&self) -> &str {
        self.0.split_once(' ').map(|(m, _)| m).unwrap_or("")
    }

    pub fn url(&self) -> &str {
        self.0.split_once(' ').map(|(_, u)| u).unwrap_or(&self.0)
    }
}

impl fmt::Display for RequestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A response as seen by the application, whether it came from the network
/// or from a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Shorthand for a `200 OK` response.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(200, body)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Only `200` responses are written back into the tile partition.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First header value matching `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }
}

/// A stored response plus the time it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    response: Response,
    stored_at: SystemTime,
}

impl CacheEntry {
    /// Wrap a response, stamping it with the current time.
    pub fn new(response: Response) -> Self {
        Self {
            response,
            stored_at: SystemTime::now(),
        }
    }

    pub(crate) fn with_stored_at(response: Response, stored_at: SystemTime) -> Self {
        Self {
            response,
            stored_at,
        }
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn into_response(self) -> Response {
        self.response
    }

    pub fn stored_at(&self) -> SystemTime {
        self.stored_at
    }

    pub(crate) fn stored_at_millis(&self) -> u64 {
        self.stored_at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    pub(crate) fn time_from_millis(millis: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(millis)
    }
}
