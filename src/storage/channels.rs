use anyhow::Result;
use sqlx::QueryBuilder;

use super::schema::Database;
use super::types::{Channel, ChannelRow};
use crate::feed::{Engine, OpmlFeed};

const CHANNEL_COLUMNS: &str = "id, title, url, engine, active, has_error, error_detail";

impl Database {
    // ========================================================================
    // Channel Operations
    // ========================================================================

    /// Insert a channel, or update the title of the channel with that URL.
    /// Returns the channel id either way.
    pub async fn add_channel(&self, url: &str, title: &str) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO channels (title, url) VALUES (?, ?)
            ON CONFLICT(url) DO UPDATE SET title = excluded.title
            RETURNING id
        "#,
        )
        .bind(title)
        .bind(url)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Add channels from an OPML import; existing URLs keep their row and
    /// only get their title refreshed.
    ///
    /// Batched in chunks of 100 (2 binds per row stays well under SQLite's
    /// parameter limit).
    pub async fn import_channels(&self, feeds: &[OpmlFeed]) -> Result<()> {
        if feeds.is_empty() {
            return Ok(());
        }

        const BATCH_SIZE: usize = 100;
        let mut tx = self.pool.begin().await?;

        for chunk in feeds.chunks(BATCH_SIZE) {
            let mut builder: QueryBuilder<sqlx::Sqlite> =
                QueryBuilder::new("INSERT INTO channels (title, url) ");

            builder.push_values(chunk, |mut b, feed| {
                b.push_bind(&feed.title).push_bind(&feed.xml_url);
            });

            builder.push(" ON CONFLICT(url) DO UPDATE SET title = excluded.title");
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Active channels ordered by ascending id.
    pub async fn get_active_channels(&self) -> Result<Vec<Channel>> {
        let rows: Vec<ChannelRow> = sqlx::query_as(&format!(
            "SELECT {CHANNEL_COLUMNS} FROM channels WHERE active = 1 ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ChannelRow::into_channel).collect())
    }

    pub async fn get_channel(&self, channel_id: i64) -> Result<Option<Channel>> {
        let row: Option<ChannelRow> =
            sqlx::query_as(&format!("SELECT {CHANNEL_COLUMNS} FROM channels WHERE id = ?"))
                .bind(channel_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(ChannelRow::into_channel))
    }

    /// Returns false if no channel has that id.
    pub async fn set_channel_active(&self, channel_id: i64, active: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE channels SET active = ? WHERE id = ?")
            .bind(active)
            .bind(channel_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_channel_engine(&self, channel_id: i64, engine: Option<Engine>) -> Result<()> {
        sqlx::query("UPDATE channels SET engine = ? WHERE id = ?")
            .bind(engine.map(Engine::as_str))
            .bind(channel_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record the outcome of the latest crawl of a channel.
    pub async fn set_channel_error(
        &self,
        channel_id: i64,
        has_error: bool,
        error_detail: Option<&str>,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            "UPDATE channels SET has_error = ?, error_detail = ?, last_checked = ? WHERE id = ?",
        )
        .bind(has_error)
        .bind(error_detail)
        .bind(now)
        .bind(channel_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
