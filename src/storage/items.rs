use anyhow::Result;

use super::schema::Database;
use super::types::{FeedItemRow, StoredFeedItem};

/// Maximum number of items returned by a single listing (OOM protection)
const MAX_ITEMS: i64 = 2000;

impl Database {
    // ========================================================================
    // Item Operations
    // ========================================================================

    pub async fn feed_item_exists(&self, channel_id: i64, item_key: &str) -> Result<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM feed_items WHERE channel_id = ? AND item_key = ?)",
        )
        .bind(channel_id)
        .bind(item_key)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Store an item. A second write of the same (channel, key) is ignored;
    /// returns whether a row was inserted.
    pub async fn insert_item(&self, item: &StoredFeedItem) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO feed_items
                (channel_id, item_key, title, link, description, published, author, content, fetched_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(item.channel_id)
        .bind(&item.item_key)
        .bind(&item.title)
        .bind(&item.link)
        .bind(&item.description)
        .bind(item.published.timestamp())
        .bind(&item.author)
        .bind(&item.content)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Newest first, capped at 2000 rows.
    pub async fn get_items_for_channel(&self, channel_id: i64) -> Result<Vec<StoredFeedItem>> {
        let rows: Vec<FeedItemRow> = sqlx::query_as(
            r#"
            SELECT channel_id, item_key, title, link, description, published, author, content
            FROM feed_items
            WHERE channel_id = ?
            ORDER BY published DESC, id DESC
            LIMIT ?
        "#,
        )
        .bind(channel_id)
        .bind(MAX_ITEMS)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FeedItemRow::into_item).collect())
    }

    pub async fn count_items(&self, channel_id: i64) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM feed_items WHERE channel_id = ?")
            .bind(channel_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
