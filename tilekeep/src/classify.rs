//! Routing decision between the tile path and the application path.

use crate::request::Request;

/// Which interception path a request takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Map imagery from one of the configured tile origins.
    Tile,
    /// Anything else: app shell, API calls, third-party assets.
    App,
}

/// Classifies requests by matching their URL against an ordered allow-list
/// of tile-origin prefixes.
///
/// Matching is a plain string prefix test on the normalized URL; the first
/// matching prefix wins and no match means [`RequestKind::App`].
#[derive(Debug, Clone, Default)]
pub struct RequestClassifier {
    tile_origins: Vec<String>,
}

impl RequestClassifier {
    pub fn new<I, T>(tile_origins: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            tile_origins: tile_origins
                .into_iter()
                .map(Into::into)
                .filter(|origin: &String| !origin.is_empty())
                .collect(),
        }
    }

    pub fn classify(&self, request: &Request) -> RequestKind {
        if self.matched_origin(request).is_some() {
            RequestKind::Tile
        } else {
            RequestKind::App
        }
    }

    /// The first tile-origin prefix that matches, if any.
    pub fn matched_origin(&self, request: &Request) -> Option<&str> {
        self.tile_origins
            .iter()
            .find(|origin| request.url().starts_with(origin.as_str()))
            .map(String::as_str)
    }

    pub fn tile_origins(&self) -> &[String] {
        &self.tile_origins
    }
}
