use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

use crate::feed::FeedItem;
use crate::util::is_blank;

/// Stable identity of an item within its channel.
///
/// The external id wins when it is not blank, then the link. `None` means
/// the item cannot be deduplicated and must be skipped.
pub fn derive_item_key(item: &FeedItem) -> Option<String> {
    item.id
        .as_deref()
        .filter(|id| !is_blank(id))
        .or_else(|| Some(item.link.as_str()).filter(|link| !is_blank(link)))
        .map(|key| key.trim().to_string())
}

/// SHA-256 hex of `"{channel_id}>{item_key}"`.
pub fn cache_key(channel_id: i64, item_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{channel_id}>{item_key}").as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// In-memory record of the (channel, key) pairs seen today.
///
/// The day is recorded when a pass finishes; the next pass starting on a
/// different local calendar day wipes the set. The durable store covers
/// anything seen before that.
#[derive(Debug)]
pub struct DedupCache {
    seen: HashSet<String>,
    day: NaiveDate,
}

impl DedupCache {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            seen: HashSet::new(),
            day: today,
        }
    }

    pub fn seen(&self, channel_id: i64, item_key: &str) -> bool {
        self.seen.contains(&cache_key(channel_id, item_key))
    }

    pub fn mark_seen(&mut self, channel_id: i64, item_key: &str) {
        self.seen.insert(cache_key(channel_id, item_key));
    }

    /// Clear the cache if `today` differs from the recorded day.
    /// Returns whether it was cleared. The recorded day is left alone.
    pub fn roll_day(&mut self, today: NaiveDate) -> bool {
        if today == self.day {
            return false;
        }
        self.seen.clear();
        true
    }

    /// Remember the day a pass ended on.
    pub fn record_day(&mut self, day: NaiveDate) {
        self.day = day;
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
