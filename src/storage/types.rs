use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::feed::Engine;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds the database lock
    #[error("The database is locked by another process. Is another crawler running?")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_message(&err.to_string()) {
            return DatabaseError::InstanceLocked;
        }
        DatabaseError::Other(err)
    }
}

/// SQLITE_BUSY (5), SQLITE_LOCKED (6) and SQLITE_CANTOPEN (14) as rendered by sqlx.
pub(crate) fn is_lock_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
        || message.contains("unable to open database file")
}

// ============================================================================
// Domain Types
// ============================================================================

/// A configured feed source, as read at the start of a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub id: i64,
    pub title: String,
    pub url: String,
    /// Engine that last parsed this channel successfully.
    pub engine: Option<Engine>,
    pub active: bool,
    pub has_error: bool,
    /// JSON error document written by the crawler on failure.
    pub error_detail: Option<String>,
}

/// An item as persisted: written once per (channel, key), never updated.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFeedItem {
    pub channel_id: i64,
    pub item_key: String,
    pub title: String,
    pub link: String,
    pub description: String,
    pub published: DateTime<Utc>,
    pub author: String,
    pub content: String,
}

// ============================================================================
// Row Types
// ============================================================================

/// Internal row type for channel queries (used by sqlx FromRow)
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ChannelRow {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub engine: Option<String>,
    pub active: bool,
    pub has_error: bool,
    pub error_detail: Option<String>,
}

impl ChannelRow {
    pub fn into_channel(self) -> Channel {
        let engine = self.engine.and_then(|raw| match raw.parse::<Engine>() {
            Ok(engine) => Some(engine),
            Err(e) => {
                tracing::warn!(channel_id = self.id, error = %e, "Ignoring stored engine hint");
                None
            }
        });

        Channel {
            id: self.id,
            title: self.title,
            url: self.url,
            engine,
            active: self.active,
            has_error: self.has_error,
            error_detail: self.error_detail,
        }
    }
}

/// Internal row type for stored item queries
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FeedItemRow {
    pub channel_id: i64,
    pub item_key: String,
    pub title: String,
    pub link: String,
    pub description: String,
    pub published: i64,
    pub author: String,
    pub content: String,
}

impl FeedItemRow {
    pub fn into_item(self) -> StoredFeedItem {
        StoredFeedItem {
            channel_id: self.channel_id,
            item_key: self.item_key,
            title: self.title,
            link: self.link,
            description: self.description,
            published: DateTime::from_timestamp(self.published, 0).unwrap_or_default(),
            author: self.author,
            content: self.content,
        }
    }
}
