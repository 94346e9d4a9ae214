//! The crawl loop.
//!
//! One [`Crawler`] owns the per-process state (dedup cache, backoff store,
//! recorded day) and walks the active channels one at a time, forever.
//! Failures are contained at the smallest granularity that makes sense:
//! an engine failure falls through to the next engine, a channel failure
//! is recorded on that channel, and a failure to list channels skips the
//! pass.

mod backoff;
mod dedup;

use anyhow::Context;
use chrono::Local;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::config::CrawlerConfig;
use crate::feed::{Engine, EngineSelector, FetchFailure};
use crate::ports::{ChannelStore, Clock, ErrorSink};
use crate::storage::{Channel, StoredFeedItem};
use crate::telemetry::error_chain;
use crate::util::{is_blank, is_item_link};

pub use backoff::{deadline, random_window, BackoffStore};
pub use dedup::{cache_key, derive_item_key, DedupCache};

/// Why a channel could not be processed this pass.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Every engine failed
    #[error(transparent)]
    Fetch(#[from] FetchFailure),
    /// The feed was read but the outcome could not be persisted
    #[error("Storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

/// JSON document stored as a channel's error detail.
#[derive(Debug, Serialize)]
struct ErrorDetail {
    kind: &'static str,
    message: String,
    engine: Option<Engine>,
    chain: Vec<String>,
}

impl ChannelError {
    fn detail(&self) -> ErrorDetail {
        match self {
            ChannelError::Fetch(failure) => ErrorDetail {
                kind: "fetch",
                message: failure.to_string(),
                engine: Some(failure.engine),
                chain: error_chain(failure),
            },
            ChannelError::Storage(error) => ErrorDetail {
                kind: "storage",
                message: format!("{:#}", error),
                engine: None,
                chain: error.chain().map(ToString::to_string).collect(),
            },
        }
    }

    fn detail_json(&self) -> String {
        serde_json::to_string(&self.detail()).unwrap_or_else(|_| self.to_string())
    }
}

/// What one pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassReport {
    /// Active channels listed
    pub channels: usize,
    /// Channels fetched and persisted successfully
    pub crawled: usize,
    /// Blank URL or inside a backoff window
    pub skipped: usize,
    pub failed: usize,
    pub new_items: usize,
}

pub struct Crawler {
    store: Arc<dyn ChannelStore>,
    selector: EngineSelector,
    errors: Arc<dyn ErrorSink>,
    clock: Arc<dyn Clock>,
    settings: CrawlerConfig,
    dedup: DedupCache,
    backoff: BackoffStore,
    rng: StdRng,
}

impl Crawler {
    pub fn new(
        store: Arc<dyn ChannelStore>,
        selector: EngineSelector,
        errors: Arc<dyn ErrorSink>,
        clock: Arc<dyn Clock>,
        settings: CrawlerConfig,
    ) -> Self {
        let today = clock.now().with_timezone(&Local).date_naive();
        let seed = rand::rng().random::<[u8; 32]>();

        Self {
            store,
            selector,
            errors,
            clock,
            settings,
            dedup: DedupCache::new(today),
            backoff: BackoffStore::new(),
            rng: StdRng::from_seed(seed),
        }
    }

    /// Run passes until the future is dropped.
    pub async fn run(&mut self) {
        tracing::info!(
            loop_delay_secs = self.settings.loop_delay_secs,
            "Crawler started"
        );

        loop {
            if self.run_pass().await.is_err() {
                tokio::time::sleep(self.settings.error_delay()).await;
            }
            tokio::time::sleep(self.settings.loop_delay()).await;
        }
    }

    /// One pass over every active channel.
    ///
    /// # Errors
    ///
    /// Only when the channel list cannot be read. The error has already
    /// been logged and reported; no channel was touched.
    pub async fn run_pass(&mut self) -> anyhow::Result<PassReport> {
        let today = self.clock.now().with_timezone(&Local).date_naive();
        if self.dedup.roll_day(today) {
            tracing::info!(day = %today, "New day, dedup cache cleared");
        }

        let channels = match self
            .store
            .get_active_channels()
            .await
            .context("Failed to list active channels")
        {
            Ok(channels) => channels,
            Err(e) => {
                tracing::error!(error = %format!("{:#}", e), "Crawl pass aborted");
                self.errors.report(e.as_ref(), None);
                return Err(e);
            }
        };

        let mut report = PassReport {
            channels: channels.len(),
            ..PassReport::default()
        };

        for channel in &channels {
            if is_blank(&channel.url) {
                tracing::warn!(channel_id = channel.id, "Channel has no URL, skipping");
                report.skipped += 1;
                continue;
            }

            if self.backoff.is_suppressed(channel.id, self.clock.now()) {
                tracing::debug!(
                    channel_id = channel.id,
                    until = ?self.backoff.suppressed_until(channel.id),
                    "Channel sleeping"
                );
                report.skipped += 1;
                continue;
            }

            match self.crawl_channel(channel).await {
                Ok(new_items) => {
                    report.crawled += 1;
                    report.new_items += new_items;
                }
                Err(error) => {
                    report.failed += 1;
                    self.record_failure(channel, error).await;
                }
            }
        }

        tracing::info!(
            channels = report.channels,
            crawled = report.crawled,
            skipped = report.skipped,
            failed = report.failed,
            new_items = report.new_items,
            cached_keys = self.dedup.len(),
            "Crawl pass complete"
        );
        self.dedup
            .record_day(self.clock.now().with_timezone(&Local).date_naive());
        Ok(report)
    }

    /// Fetch one channel and store its unseen items. Returns the number stored.
    async fn crawl_channel(&mut self, channel: &Channel) -> Result<usize, ChannelError> {
        let fetched = self
            .selector
            .fetch(&channel.url, channel.engine, self.clock.now())
            .await?;
        self.store
            .update_channel_default_engine(channel.id, Some(fetched.engine))
            .await?;

        let mut new_items = 0;
        for item in fetched.items {
            if !is_item_link(&item.link) {
                tracing::debug!(channel_id = channel.id, link = %item.link, "Skipping item with non-http link");
                continue;
            }
            let Some(item_key) = derive_item_key(&item) else {
                continue;
            };
            if self.dedup.seen(channel.id, &item_key) {
                continue;
            }

            if !self.store.check_exist_feed_item(channel.id, &item_key).await? {
                let stored = StoredFeedItem {
                    channel_id: channel.id,
                    item_key: item_key.clone(),
                    title: item.title,
                    link: item.link,
                    description: item.description,
                    published: item.published,
                    author: item.author,
                    content: item.content,
                };
                self.store.insert_feed_item(&stored).await?;
                new_items += 1;
            }
            self.dedup.mark_seen(channel.id, &item_key);
        }

        self.store
            .update_channel_error_status(channel.id, false, None)
            .await?;

        if new_items == 0 {
            let window = random_window(&mut self.rng, self.settings.channel_fetching_delay);
            let until = deadline(self.clock.now(), window);
            self.backoff.suppress(channel.id, until);
            tracing::debug!(channel_id = channel.id, until = %until, "No new items, backing off");
        } else {
            tracing::info!(
                channel_id = channel.id,
                engine = %fetched.engine,
                new_items,
                "Stored new items"
            );
        }

        Ok(new_items)
    }

    async fn record_failure(&mut self, channel: &Channel, error: ChannelError) {
        tracing::warn!(channel_id = channel.id, url = %channel.url, error = %error, "Channel crawl failed");

        if matches!(error, ChannelError::Fetch(_)) {
            if let Err(e) = self.store.update_channel_default_engine(channel.id, None).await {
                tracing::warn!(channel_id = channel.id, error = %e, "Failed to clear engine hint");
            }
        }

        let detail = error.detail_json();
        if let Err(e) = self
            .store
            .update_channel_error_status(channel.id, true, Some(&detail))
            .await
        {
            tracing::warn!(channel_id = channel.id, error = %e, "Failed to record channel error");
        }

        let until = deadline(self.clock.now(), self.settings.channel_error_delay());
        self.backoff.suppress(channel.id, until);

        self.errors.report(&error, Some(&channel.url));
    }
}
