//! SQLite persistence for channels and crawled items.

mod channels;
mod items;
mod schema;
mod types;

use anyhow::Result;
use async_trait::async_trait;

use crate::feed::Engine;
use crate::ports::ChannelStore;

pub use schema::Database;
pub use types::{Channel, DatabaseError, StoredFeedItem};

#[async_trait]
impl ChannelStore for Database {
    async fn get_active_channels(&self) -> Result<Vec<Channel>> {
        Database::get_active_channels(self).await
    }

    async fn update_channel_default_engine(&self, channel_id: i64, engine: Option<Engine>) -> Result<()> {
        self.set_channel_engine(channel_id, engine).await
    }

    async fn update_channel_error_status(
        &self,
        channel_id: i64,
        has_error: bool,
        error_detail: Option<&str>,
    ) -> Result<()> {
        self.set_channel_error(channel_id, has_error, error_detail).await
    }

    async fn check_exist_feed_item(&self, channel_id: i64, item_key: &str) -> Result<bool> {
        self.feed_item_exists(channel_id, item_key).await
    }

    async fn insert_feed_item(&self, item: &StoredFeedItem) -> Result<()> {
        if !self.insert_item(item).await? {
            tracing::debug!(
                channel_id = item.channel_id,
                item_key = %item.item_key,
                "Item already stored, insert ignored"
            );
        }
        Ok(())
    }
}
