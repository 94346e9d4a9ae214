//! Logging setup and the error sink used by the crawl loop.

use chrono::Utc;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::ports::ErrorSink;

/// Install the global `fmt` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_level` (the config's
/// `log_level`) is used as the filter directive.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Walk `source()` from the outermost error inwards.
pub fn error_chain(error: &(dyn std::error::Error + 'static)) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = Some(error);
    while let Some(err) = current {
        chain.push(err.to_string());
        current = err.source();
    }
    chain
}

#[derive(Serialize)]
struct ErrorRecord<'a> {
    timestamp: String,
    feed_url: Option<&'a str>,
    message: String,
    chain: Vec<String>,
}

/// Logs every reported error and optionally appends it to a JSON-lines file.
///
/// Reporting never fails: a broken error log only produces a warning.
pub struct ErrorReporter {
    error_log: Option<PathBuf>,
    // Serializes appends so records never interleave
    write_lock: Mutex<()>,
}

impl ErrorReporter {
    pub fn new(error_log: Option<PathBuf>) -> Self {
        Self {
            error_log,
            write_lock: Mutex::new(()),
        }
    }

    fn append(&self, path: &std::path::Path, record: &ErrorRecord<'_>) -> std::io::Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(line.as_bytes())
    }
}

impl ErrorSink for ErrorReporter {
    fn report(&self, error: &(dyn std::error::Error + 'static), feed_url: Option<&str>) {
        let chain = error_chain(error);
        tracing::error!(
            feed_url = feed_url.unwrap_or("-"),
            error = %error,
            chain = ?chain,
            "Crawler error"
        );

        if let Some(path) = &self.error_log {
            let record = ErrorRecord {
                timestamp: Utc::now().to_rfc3339(),
                feed_url,
                message: error.to_string(),
                chain,
            };
            if let Err(e) = self.append(path, &record) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to append to error log");
            }
        }
    }
}
