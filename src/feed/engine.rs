use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A strategy for turning a feed URL into a list of items.
///
/// The declaration order is the canonical attempt order used by the
/// engine selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    /// Structured reader backed by `feed-rs` (RSS, Atom, JSON Feed).
    FeedReader,
    /// Syndication-standard reader backed by the `rss` and `atom_syndication` crates.
    Syndication,
    /// Lenient `rss/channel/item` scraper over a sanitized XML body.
    RawXml,
}

impl Engine {
    /// Every engine, in canonical order.
    pub const ALL: [Engine; 3] = [Engine::FeedReader, Engine::Syndication, Engine::RawXml];

    /// Stable name used for persistence and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Engine::FeedReader => "feed_reader",
            Engine::Syndication => "syndication",
            Engine::RawXml => "raw_xml",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown engine: {0}")]
pub struct UnknownEngine(pub String);

impl FromStr for Engine {
    type Err = UnknownEngine;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Engine::ALL
            .into_iter()
            .find(|engine| engine.as_str() == s.trim())
            .ok_or_else(|| UnknownEngine(s.to_string()))
    }
}
