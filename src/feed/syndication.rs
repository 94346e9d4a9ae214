//! Syndication-standard engine: strict RSS 2.0 via the `rss` crate, with
//! Atom 1.0 via `atom_syndication` when the document is not RSS.

use chrono::{DateTime, Utc};

use super::{EngineError, RawFeedItem};

pub fn parse_syndication(bytes: &[u8]) -> Result<Vec<RawFeedItem>, EngineError> {
    match rss::Channel::read_from(bytes) {
        Ok(channel) => Ok(channel.items().iter().map(from_rss_item).collect()),
        Err(rss_err) => match atom_syndication::Feed::read_from(bytes) {
            Ok(feed) => Ok(feed.entries().iter().map(from_atom_entry).collect()),
            Err(atom_err) => {
                tracing::debug!(error = %atom_err, "Document is neither RSS nor Atom");
                Err(EngineError::Parse(rss_err.to_string()))
            }
        },
    }
}

fn from_rss_item(item: &rss::Item) -> RawFeedItem {
    let guid = item.guid().map(|g| g.value().to_string());
    let link = non_blank(item.link()).or_else(|| guid.clone());
    let author = non_blank(item.author()).or_else(|| {
        item.dublin_core_ext()
            .and_then(|dc| dc.creators().first())
            .map(|c| c.to_string())
    });

    RawFeedItem {
        id: guid,
        title: item.title().map(str::to_string),
        link,
        description: item.description().map(str::to_string),
        published: item
            .pub_date()
            .and_then(|d| DateTime::parse_from_rfc2822(d.trim()).ok())
            .map(|d| d.with_timezone(&Utc)),
        author,
        content: item.content().map(str::to_string),
    }
}

fn from_atom_entry(entry: &atom_syndication::Entry) -> RawFeedItem {
    let links = entry.links();
    let link = links
        .iter()
        .find(|l| l.rel() == "alternate")
        .or_else(|| links.first())
        .map(|l| l.href().to_string())
        .or_else(|| non_blank(Some(entry.id())));

    RawFeedItem {
        id: non_blank(Some(entry.id())),
        title: Some(entry.title().value.clone()),
        link,
        description: entry.summary().map(|s| s.value.clone()),
        published: Some(
            entry
                .published()
                .unwrap_or_else(|| entry.updated())
                .with_timezone(&Utc),
        ),
        author: entry.authors().first().map(|a| a.name().to_string()),
        content: entry
            .content()
            .and_then(|c| c.value())
            .map(str::to_string),
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
