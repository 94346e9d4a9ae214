//! Polling RSS/Atom crawler.
//!
//! [`crawler::Crawler`] walks the active channels of a [`storage::Database`],
//! fetches each feed through the [`feed::EngineSelector`] and records every
//! item exactly once.

pub mod config;
pub mod crawler;
pub mod feed;
pub mod ports;
pub mod storage;
pub mod telemetry;
pub mod util;

#[cfg(test)]
mod test_support;
