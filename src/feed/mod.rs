//! Feed retrieval: engines, the HTTP download path and the engine selector.
//!
//! Three engines turn a feed URL into items, each with its own tolerance for
//! broken documents:
//!
//! - [`Engine::FeedReader`] - `feed-rs`, handles RSS, Atom and JSON Feed
//! - [`Engine::Syndication`] - strict `rss` / `atom_syndication` readers
//! - [`Engine::RawXml`] - a `quick-xml` scraper over a sanitized body
//!
//! The [`EngineSelector`] decides which engines to try for a channel, in
//! what order, and normalizes whatever the winning engine produced.
//!
//! # Example
//!
//! ```ignore
//! use feedcrawl::feed::{EngineSelector, HttpEngines, HttpFetcher};
//!
//! let fetcher = HttpFetcher::from_config(&config.http)?;
//! let selector = EngineSelector::new(Arc::new(HttpEngines::new(fetcher)));
//! let fetched = selector
//!     .fetch("https://example.com/feed.xml", channel.engine, clock.now())
//!     .await?;
//! ```

mod engine;
mod fetcher;
mod opml;
mod parser;
mod scraper;
mod selector;
mod syndication;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub use engine::{Engine, UnknownEngine};
pub use fetcher::{FetchError, HttpFetcher};
pub use opml::{parse as parse_opml, OpmlError, OpmlFeed};
pub use selector::{EngineRunner, EngineSelector, FetchFailure, FetchedFeed, HttpEngines};

/// An item as produced by one engine, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFeedItem {
    pub id: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub author: Option<String>,
    pub content: Option<String>,
}

/// A normalized item: non-blank link and title, defaults filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    /// External id as published by the feed, if any.
    pub id: Option<String>,
    /// Never blank; falls back to the link.
    pub title: String,
    pub link: String,
    pub description: String,
    /// Falls back to the time the feed was fetched.
    pub published: DateTime<Utc>,
    pub author: String,
    pub content: String,
}

/// Why a single engine could not produce an item list.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The body could not be downloaded
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// The body was downloaded but the engine could not read it
    #[error("Parse error: {0}")]
    Parse(String),
}

impl Engine {
    /// Parse an already-downloaded body with this engine.
    pub fn parse(self, bytes: &[u8]) -> Result<Vec<RawFeedItem>, EngineError> {
        match self {
            Engine::FeedReader => parser::parse_feed(bytes),
            Engine::Syndication => syndication::parse_syndication(bytes),
            Engine::RawXml => scraper::parse_raw_xml(bytes),
        }
    }
}
