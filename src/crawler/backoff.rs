use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::DelayRange;

/// Per-channel "do not crawl before" timestamps.
///
/// Entries expire lazily: a lookup past the deadline removes the entry and
/// reports the channel as eligible.
#[derive(Debug, Default)]
pub struct BackoffStore {
    until: HashMap<i64, DateTime<Utc>>,
}

impl BackoffStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff the channel has an entry that has not yet expired at `now`.
    pub fn is_suppressed(&mut self, channel_id: i64, now: DateTime<Utc>) -> bool {
        match self.until.get(&channel_id) {
            Some(until) if *until > now => true,
            Some(_) => {
                self.until.remove(&channel_id);
                false
            }
            None => false,
        }
    }

    pub fn suppress(&mut self, channel_id: i64, until: DateTime<Utc>) {
        self.until.insert(channel_id, until);
    }

    pub fn suppressed_until(&self, channel_id: i64) -> Option<DateTime<Utc>> {
        self.until.get(&channel_id).copied()
    }

    pub fn len(&self) -> usize {
        self.until.len()
    }

    pub fn is_empty(&self) -> bool {
        self.until.is_empty()
    }
}

/// Uniform random duration in `[min, max]`, whole milliseconds.
///
/// An inverted range collapses to `min`.
pub fn random_window<R: Rng + ?Sized>(rng: &mut R, range: DelayRange) -> Duration {
    let min_ms = range.min().as_millis() as u64;
    let max_ms = range.max().as_millis() as u64;
    if max_ms <= min_ms {
        return Duration::from_millis(min_ms);
    }
    Duration::from_millis(rng.random_range(min_ms..=max_ms))
}

/// `now + delay`, saturating at the far future.
pub fn deadline(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|delay| now.checked_add_signed(delay))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
