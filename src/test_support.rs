//! In-memory fakes for the crawler's collaborators.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::feed::{Engine, EngineError, EngineRunner, FetchError, RawFeedItem};
use crate::ports::{ChannelStore, Clock, ErrorSink};
use crate::storage::{Channel, StoredFeedItem};

pub(crate) fn raw_item(id: Option<&str>, link: &str) -> RawFeedItem {
    RawFeedItem {
        id: id.map(str::to_string),
        title: Some(format!("Title of {}", link)),
        link: Some(link.to_string()),
        ..RawFeedItem::default()
    }
}

pub(crate) fn channel(id: i64, url: &str) -> Channel {
    Channel {
        id,
        title: format!("Channel {}", id),
        url: url.to_string(),
        engine: None,
        active: true,
        has_error: false,
        error_detail: None,
    }
}

// ============================================================================
// Engine runner
// ============================================================================

#[derive(Debug, Clone)]
pub(crate) enum Outcome {
    Items(Vec<RawFeedItem>),
    /// The engine could not read the body
    Fail(&'static str),
    /// The body could not be downloaded
    Transport,
}

/// Engines answer from a script; anything unscripted fails to parse.
///
/// URL-specific entries take precedence over per-engine defaults.
#[derive(Default)]
pub(crate) struct ScriptedRunner {
    defaults: Mutex<HashMap<Engine, Outcome>>,
    per_url: Mutex<HashMap<(String, Engine), Outcome>>,
    calls: Mutex<Vec<(String, Engine)>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, engine: Engine, outcome: Outcome) -> Self {
        self.set(engine, outcome);
        self
    }

    pub fn with_url(self, url: &str, engine: Engine, outcome: Outcome) -> Self {
        self.set_url(url, engine, outcome);
        self
    }

    pub fn set(&self, engine: Engine, outcome: Outcome) {
        self.defaults.lock().unwrap().insert(engine, outcome);
    }

    pub fn set_url(&self, url: &str, engine: Engine, outcome: Outcome) {
        self.per_url
            .lock()
            .unwrap()
            .insert((url.to_string(), engine), outcome);
    }

    /// Engines invoked so far, in order.
    pub fn calls(&self) -> Vec<Engine> {
        self.calls.lock().unwrap().iter().map(|(_, e)| *e).collect()
    }

    pub fn calls_for(&self, url: &str) -> Vec<Engine> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, e)| *e)
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl EngineRunner for ScriptedRunner {
    async fn run(&self, engine: Engine, url: &str) -> Result<Vec<RawFeedItem>, EngineError> {
        self.calls.lock().unwrap().push((url.to_string(), engine));

        let outcome = self
            .per_url
            .lock()
            .unwrap()
            .get(&(url.to_string(), engine))
            .cloned()
            .or_else(|| self.defaults.lock().unwrap().get(&engine).cloned());

        match outcome {
            Some(Outcome::Items(items)) => Ok(items),
            Some(Outcome::Fail(message)) => Err(EngineError::Parse(message.to_string())),
            Some(Outcome::Transport) => Err(EngineError::Fetch(FetchError::Timeout)),
            None => Err(EngineError::Parse(format!("{} not scripted", engine))),
        }
    }
}

// ============================================================================
// Channel store
// ============================================================================

#[derive(Default)]
struct StoreState {
    channels: Vec<Channel>,
    items: Vec<StoredFeedItem>,
    list_calls: usize,
    exist_checks: usize,
    fail_listing: bool,
    fail_inserts_for: HashSet<i64>,
}

/// Channel store backed by plain vectors, with failure switches.
#[derive(Default)]
pub(crate) struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn with_channels(channels: Vec<Channel>) -> Self {
        let store = Self::default();
        store.state.lock().unwrap().channels = channels;
        store
    }

    pub fn channel(&self, id: i64) -> Channel {
        self.state
            .lock()
            .unwrap()
            .channels
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .unwrap()
    }

    pub fn items(&self) -> Vec<StoredFeedItem> {
        self.state.lock().unwrap().items.clone()
    }

    pub fn items_for(&self, channel_id: i64) -> Vec<StoredFeedItem> {
        self.items()
            .into_iter()
            .filter(|i| i.channel_id == channel_id)
            .collect()
    }

    /// Store an item directly, as if a previous process had crawled it.
    pub fn preload(&self, item: StoredFeedItem) {
        self.state.lock().unwrap().items.push(item);
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    pub fn exist_checks(&self) -> usize {
        self.state.lock().unwrap().exist_checks
    }

    pub fn set_fail_listing(&self, fail: bool) {
        self.state.lock().unwrap().fail_listing = fail;
    }

    pub fn fail_inserts_for(&self, channel_id: i64) {
        self.state.lock().unwrap().fail_inserts_for.insert(channel_id);
    }

    fn update_channel(&self, id: i64, f: impl FnOnce(&mut Channel)) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let channel = state
            .channels
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| anyhow!("no channel {}", id))?;
        f(channel);
        Ok(())
    }
}

#[async_trait]
impl ChannelStore for MemoryStore {
    async fn get_active_channels(&self) -> Result<Vec<Channel>> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        if state.fail_listing {
            return Err(anyhow!("database is unavailable"));
        }
        let mut channels: Vec<Channel> = state.channels.iter().filter(|c| c.active).cloned().collect();
        channels.sort_by_key(|c| c.id);
        Ok(channels)
    }

    async fn update_channel_default_engine(&self, channel_id: i64, engine: Option<Engine>) -> Result<()> {
        self.update_channel(channel_id, |c| c.engine = engine)
    }

    async fn update_channel_error_status(
        &self,
        channel_id: i64,
        has_error: bool,
        error_detail: Option<&str>,
    ) -> Result<()> {
        self.update_channel(channel_id, |c| {
            c.has_error = has_error;
            c.error_detail = error_detail.map(str::to_string);
        })
    }

    async fn check_exist_feed_item(&self, channel_id: i64, item_key: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        state.exist_checks += 1;
        Ok(state
            .items
            .iter()
            .any(|i| i.channel_id == channel_id && i.item_key == item_key))
    }

    async fn insert_feed_item(&self, item: &StoredFeedItem) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_inserts_for.contains(&item.channel_id) {
            return Err(anyhow!("disk I/O error"));
        }
        state.items.push(item.clone());
        Ok(())
    }
}

// ============================================================================
// Error sink and clock
// ============================================================================

#[derive(Default)]
pub(crate) struct RecordingSink {
    reports: Mutex<Vec<(String, Option<String>)>>,
}

impl RecordingSink {
    /// (message, feed url) per report.
    pub fn reports(&self) -> Vec<(String, Option<String>)> {
        self.reports.lock().unwrap().clone()
    }
}

impl ErrorSink for RecordingSink {
    fn report(&self, error: &(dyn std::error::Error + 'static), feed_url: Option<&str>) {
        self.reports
            .lock()
            .unwrap()
            .push((error.to_string(), feed_url.map(str::to_string)));
    }
}

pub(crate) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
