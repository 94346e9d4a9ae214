use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

use super::{Engine, EngineError, FeedItem, HttpFetcher, RawFeedItem};
use crate::util::is_blank;

/// Runs one engine against one URL.
///
/// This is the seam between the selection policy and the concrete engines:
/// production code uses [`HttpEngines`], tests script the outcomes.
#[async_trait]
pub trait EngineRunner: Send + Sync {
    async fn run(&self, engine: Engine, url: &str) -> Result<Vec<RawFeedItem>, EngineError>;
}

/// Downloads the URL and hands the body to the requested engine.
///
/// Every attempt downloads afresh: a transport error is charged to the
/// engine that was running, and the next engine gets its own request.
pub struct HttpEngines {
    fetcher: HttpFetcher,
}

impl HttpEngines {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl EngineRunner for HttpEngines {
    async fn run(&self, engine: Engine, url: &str) -> Result<Vec<RawFeedItem>, EngineError> {
        let bytes = self.fetcher.fetch(url).await?;
        engine.parse(&bytes)
    }
}

/// Items from the engine that succeeded.
#[derive(Debug)]
pub struct FetchedFeed {
    pub engine: Engine,
    pub items: Vec<FeedItem>,
}

/// Every attempted engine failed; carries the most recent error.
#[derive(Debug, Error)]
#[error("{engine} engine failed: {source}")]
pub struct FetchFailure {
    pub engine: Engine,
    pub source: EngineError,
}

/// Picks the engines to try for a channel and normalizes the result.
#[derive(Clone)]
pub struct EngineSelector {
    runner: Arc<dyn EngineRunner>,
}

impl EngineSelector {
    pub fn new(runner: Arc<dyn EngineRunner>) -> Self {
        Self { runner }
    }

    /// Fetch a feed, preferring the engine remembered for the channel.
    ///
    /// # Attempt order
    ///
    /// - No hint: every engine in canonical order, first success wins.
    /// - Hint: the hinted engine alone; if it fails, exactly one more round
    ///   over the remaining engines in canonical order. The hinted engine is
    ///   never retried in that round.
    ///
    /// # Errors
    ///
    /// Returns [`FetchFailure`] with the last engine's error when every
    /// attempt failed. A reachable feed with no items is a success.
    ///
    /// Undated items are stamped with `now`.
    pub async fn fetch(
        &self,
        url: &str,
        hint: Option<Engine>,
        now: DateTime<Utc>,
    ) -> Result<FetchedFeed, FetchFailure> {
        let mut last_failure: Option<FetchFailure> = None;

        for (round, engines) in attempt_rounds(hint).into_iter().enumerate() {
            if round > 0 {
                tracing::info!(
                    url = %url,
                    remembered = ?hint,
                    "Remembered engine failed, trying the remaining engines"
                );
            }

            for engine in engines {
                tracing::debug!(url = %url, engine = %engine, "Trying engine");
                match self.runner.run(engine, url).await {
                    Ok(raw) => {
                        let items = normalize(raw, now);
                        tracing::debug!(url = %url, engine = %engine, items = items.len(), "Engine succeeded");
                        return Ok(FetchedFeed { engine, items });
                    }
                    Err(error) => {
                        tracing::warn!(url = %url, engine = %engine, error = %error, "Engine failed");
                        last_failure = Some(FetchFailure {
                            engine,
                            source: error,
                        });
                    }
                }
            }
        }

        // Every round holds at least one engine, so a failure was recorded
        Err(last_failure.unwrap_or_else(|| FetchFailure {
            engine: hint.unwrap_or(Engine::FeedReader),
            source: EngineError::Parse("no engine attempted".to_string()),
        }))
    }
}

/// At most two rounds: the hint alone, then its complement.
fn attempt_rounds(hint: Option<Engine>) -> Vec<Vec<Engine>> {
    match hint {
        None => vec![Engine::ALL.to_vec()],
        Some(remembered) => vec![
            vec![remembered],
            Engine::ALL
                .into_iter()
                .filter(|engine| *engine != remembered)
                .collect(),
        ],
    }
}

/// Apply the per-item defaults shared by every engine.
///
/// Items without a non-blank link are dropped; a blank title becomes the
/// link; a missing publish date becomes `now`.
pub(crate) fn normalize(raw: Vec<RawFeedItem>, now: DateTime<Utc>) -> Vec<FeedItem> {
    raw.into_iter()
        .filter_map(|item| {
            let link = item.link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty())?;
            let title = item
                .title
                .filter(|t| !is_blank(t))
                .unwrap_or_else(|| link.clone());

            Some(FeedItem {
                id: item.id.map(|id| id.trim().to_string()).filter(|id| !id.is_empty()),
                title,
                link,
                description: item.description.unwrap_or_default(),
                published: item.published.unwrap_or(now),
                author: item.author.unwrap_or_default(),
                content: item.content.unwrap_or_default(),
            })
        })
        .collect()
}
