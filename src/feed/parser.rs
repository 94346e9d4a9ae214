use feed_rs::parser;

use super::{EngineError, RawFeedItem};

/// Parse a feed body with `feed-rs` (RSS 0.9x/1.0/2.0, Atom, JSON Feed).
///
/// Entries the document gives no id keep a blank one: feed-rs would
/// otherwise hash the link and title into an id, which changes whenever
/// the title is edited.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<RawFeedItem>, EngineError> {
    let feed = parser::Builder::new()
        .id_generator(|_, _, _| String::new())
        .build()
        .parse(bytes)
        .map_err(|e| EngineError::Parse(e.to_string()))?;

    let items = feed
        .entries
        .into_iter()
        .map(|entry| {
            let id = if entry.id.trim().is_empty() {
                None
            } else {
                Some(entry.id)
            };

            RawFeedItem {
                id,
                title: entry.title.map(|t| t.content),
                link: entry.links.into_iter().next().map(|l| l.href),
                description: entry.summary.map(|s| s.content),
                published: entry.published.or(entry.updated),
                author: entry.authors.into_iter().next().map(|a| a.name),
                content: entry.content.and_then(|c| c.body),
            }
        })
        .collect();

    Ok(items)
}
