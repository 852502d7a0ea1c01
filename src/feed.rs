//! Entry feed: a single GET returning `{ "entries": [...] }`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::entry::Entry;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("feed body is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Anything that can produce the current entry list.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<Entry>, FeedError>;
}

#[derive(Deserialize)]
struct FeedDocument {
    #[serde(default)]
    entries: Vec<serde_json::Value>,
}

/// Decode a feed body. Entries that do not decode are skipped, not fatal.
pub fn parse_feed(body: &[u8]) -> Result<Vec<Entry>, FeedError> {
    let document: FeedDocument = serde_json::from_slice(body)?;
    let total = document.entries.len();

    let entries: Vec<Entry> = document
        .entries
        .into_iter()
        .enumerate()
        .filter_map(|(i, raw)| match serde_json::from_value::<Entry>(raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("skipping feed entry #{}: {}", i, e);
                None
            }
        })
        .collect();

    if entries.len() < total {
        warn!("{} of {} feed entries could not be decoded", total - entries.len(), total);
    }
    Ok(entries)
}

pub struct HttpFeedSource {
    client: Client,
    url: String,
}

impl HttpFeedSource {
    /// `base_url` plus `path`, e.g. `http://host:3000` + `feed`.
    pub fn new(base_url: &str, path: &str, timeout: Duration) -> Result<Self, FeedError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: feed_url(base_url, path),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self) -> Result<Vec<Entry>, FeedError> {
        debug!("GET {}", self.url);
        let resp = self.client.get(&self.url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }

        let body = resp.bytes().await?;
        let entries = parse_feed(&body)?;
        info!("📰 Fetched {} entries from {}", entries.len(), self.url);
        Ok(entries)
    }
}

/// A fixed entry list, for tests and offline runs.
pub struct StaticFeedSource {
    entries: Vec<Entry>,
}

impl StaticFeedSource {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl FeedSource for StaticFeedSource {
    async fn fetch(&self) -> Result<Vec<Entry>, FeedError> {
        Ok(self.entries.clone())
    }
}

fn feed_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_base_and_path() {
        assert_eq!(feed_url("http://host:3000", "feed"), "http://host:3000/feed");
        assert_eq!(feed_url("http://host:3000/", "/news"), "http://host:3000/news");
    }

    #[test]
    fn parses_full_and_minimal_entries() {
        let body = br#"{
            "entries": [
                {
                    "link": "https://example.com/1",
                    "title": "Flyers win",
                    "body": "Late goal",
                    "date": "2024-05-01T12:00:00Z",
                    "image": { "src": "https://example.com/1.jpg" },
                    "emoji": "hockey",
                    "coordinates": { "latitude": 39.90122, "longitude": -75.172 }
                },
                {
                    "link": "https://example.com/2",
                    "title": "Street fair",
                    "coordinates": { "latitude": 39.95, "longitude": -75.16 }
                }
            ]
        }"#;

        let entries = parse_feed(body).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].emoji, "hockey");
        assert_eq!(
            entries[0].image.as_ref().map(|i| i.src.as_str()),
            Some("https://example.com/1.jpg")
        );
        assert_eq!(entries[1].body, "");
        assert!(entries[1].date.is_none());
    }

    #[test]
    fn skips_entries_that_do_not_decode() {
        let body = br#"{ "entries": [
            { "link": "a", "title": "no coordinates" },
            { "link": "b", "title": "ok", "coordinates": { "latitude": 1, "longitude": 2 } }
        ] }"#;
        let entries = parse_feed(body).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].link, "b");
    }

    #[test]
    fn rejects_non_json() {
        assert!(matches!(parse_feed(b"<html>"), Err(FeedError::Decode(_))));
    }

    #[test]
    fn missing_entries_key_is_empty() {
        assert!(parse_feed(b"{}").unwrap().is_empty());
    }

    #[tokio::test]
    async fn static_source_returns_its_entries() {
        let source = StaticFeedSource::new(parse_feed(br#"{ "entries": [
            { "link": "a", "title": "a", "coordinates": { "latitude": 1, "longitude": 2 } }
        ] }"#).unwrap());
        assert_eq!(source.fetch().await.unwrap().len(), 1);
    }
}
