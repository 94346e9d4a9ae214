//! Collaborators the crawler depends on.
//!
//! The crawl loop only talks to persistence, error telemetry and time
//! through these traits. [`Database`](crate::storage::Database),
//! [`ErrorReporter`](crate::telemetry::ErrorReporter) and [`SystemClock`]
//! are the production implementations.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::feed::Engine;
use crate::storage::{Channel, StoredFeedItem};

/// Channel list and item storage.
///
/// Every method must be safe to call repeatedly: a pass interrupted after
/// an insert but before the status update is simply replayed next pass.
#[async_trait]
pub trait ChannelStore: Send + Sync {
    /// Active channels ordered by ascending id.
    async fn get_active_channels(&self) -> Result<Vec<Channel>>;

    /// Remember (or forget) the engine that last parsed the channel.
    async fn update_channel_default_engine(&self, channel_id: i64, engine: Option<Engine>) -> Result<()>;

    async fn update_channel_error_status(
        &self,
        channel_id: i64,
        has_error: bool,
        error_detail: Option<&str>,
    ) -> Result<()>;

    /// Durable dedup check, consulted when the in-memory cache misses.
    async fn check_exist_feed_item(&self, channel_id: i64, item_key: &str) -> Result<bool>;

    async fn insert_feed_item(&self, item: &StoredFeedItem) -> Result<()>;
}

/// Fire-and-forget error telemetry.
pub trait ErrorSink: Send + Sync {
    fn report(&self, error: &(dyn std::error::Error + 'static), feed_url: Option<&str>);
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
