//! Configuration file parser for `feedcrawl.toml`.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde (`deny_unknown_fields` is off), though
//! we log a warning when the file contains potential typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// Values parsed but are out of range.
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database path, or `:memory:`.
    pub database: String,

    /// Default tracing filter when `RUST_LOG` is not set.
    pub log_level: String,

    /// Append reported errors as JSON lines to this file.
    pub error_log: Option<PathBuf>,

    pub crawler: CrawlerConfig,

    pub http: HttpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: "feedcrawl.db".to_string(),
            log_level: "info".to_string(),
            error_log: None,
            crawler: CrawlerConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

/// Timing of the crawl loop. All values are in seconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// A channel with no new items is skipped for a random time in this range.
    pub channel_fetching_delay: DelayRange,

    /// A failing channel is skipped for exactly this long.
    pub channel_error_delay_secs: u64,

    /// Extra sleep after a pass that could not list channels.
    pub error_delay_secs: u64,

    /// Sleep between passes.
    pub loop_delay_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            channel_fetching_delay: DelayRange::default(),
            channel_error_delay_secs: 600,
            error_delay_secs: 60,
            loop_delay_secs: 30,
        }
    }
}

impl CrawlerConfig {
    pub fn channel_error_delay(&self) -> Duration {
        Duration::from_secs(self.channel_error_delay_secs)
    }

    pub fn error_delay(&self) -> Duration {
        Duration::from_secs(self.error_delay_secs)
    }

    pub fn loop_delay(&self) -> Duration {
        Duration::from_secs(self.loop_delay_secs)
    }
}

/// Inclusive range of seconds.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct DelayRange {
    pub min_secs: u64,
    pub max_secs: u64,
}

impl Default for DelayRange {
    fn default() -> Self {
        Self {
            min_secs: 300,
            max_secs: 900,
        }
    }
}

impl DelayRange {
    pub fn min(&self) -> Duration {
        Duration::from_secs(self.min_secs)
    }

    pub fn max(&self) -> Duration {
        Duration::from_secs(self.max_secs)
    }
}

/// Settings for the shared HTTP client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout.
    pub timeout_secs: u64,

    /// Bodies larger than this are rejected.
    pub max_feed_bytes: usize,

    /// Retries for 429, 5xx and truncated responses.
    pub max_retries: u32,

    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_feed_bytes: 10 * 1024 * 1024,
            max_retries: 2,
            user_agent: concat!("feedcrawl/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

const TOP_LEVEL_KEYS: &[&str] = &["database", "log_level", "error_log", "crawler", "http"];
const CRAWLER_KEYS: &[&str] = &[
    "channel_fetching_delay",
    "channel_error_delay_secs",
    "error_delay_secs",
    "loop_delay_secs",
];
const DELAY_RANGE_KEYS: &[&str] = &["min_secs", "max_secs"];
const HTTP_KEYS: &[&str] = &["timeout_secs", "max_feed_bytes", "max_retries", "user_agent"];

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Out-of-range values → `Err(ConfigError::Invalid)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading to prevent memory exhaustion
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            warn_unknown_keys(&raw);
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(path = %path.display(), database = %config.database, "Loaded configuration");
        Ok(config)
    }

    /// Reject values the crawler cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let delay = &self.crawler.channel_fetching_delay;
        if delay.min_secs > delay.max_secs {
            return Err(ConfigError::Invalid(format!(
                "crawler.channel_fetching_delay: min_secs ({}) is greater than max_secs ({})",
                delay.min_secs, delay.max_secs
            )));
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::Invalid("http.timeout_secs must be greater than 0".to_string()));
        }
        if self.http.max_feed_bytes == 0 {
            return Err(ConfigError::Invalid("http.max_feed_bytes must be greater than 0".to_string()));
        }
        Ok(())
    }
}

fn warn_unknown_keys(raw: &toml::Table) {
    warn_unknown_in("", raw, TOP_LEVEL_KEYS);

    if let Some(toml::Value::Table(crawler)) = raw.get("crawler") {
        warn_unknown_in("crawler.", crawler, CRAWLER_KEYS);
        if let Some(toml::Value::Table(delay)) = crawler.get("channel_fetching_delay") {
            warn_unknown_in("crawler.channel_fetching_delay.", delay, DELAY_RANGE_KEYS);
        }
    }
    if let Some(toml::Value::Table(http)) = raw.get("http") {
        warn_unknown_in("http.", http, HTTP_KEYS);
    }
}

fn warn_unknown_in(prefix: &str, table: &toml::Table, known_keys: &[&str]) {
    for key in table.keys() {
        if !known_keys.contains(&key.as_str()) {
            tracing::warn!(key = %format!("{prefix}{key}"), "Unknown key in config file, ignoring");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_config(name: &str, content: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("feedcrawl_config_test_{}", name));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("feedcrawl.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database, "feedcrawl.db");
        assert_eq!(config.log_level, "info");
        assert!(config.error_log.is_none());
        assert_eq!(
            config.crawler.channel_fetching_delay,
            DelayRange {
                min_secs: 300,
                max_secs: 900
            }
        );
        assert_eq!(config.crawler.channel_error_delay(), Duration::from_secs(600));
        assert_eq!(config.http.timeout_secs, 30);
        assert_eq!(config.http.max_feed_bytes, 10_485_760);
        assert_eq!(config.http.max_retries, 2);
        assert!(config.http.user_agent.starts_with("feedcrawl/"));
        config.validate().unwrap();
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/feedcrawl_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.database, "feedcrawl.db");
    }

    #[test]
    fn test_empty_and_whitespace_files_return_default() {
        for (name, content) in [("empty", ""), ("whitespace", "   \n  \n  ")] {
            let (dir, path) = write_config(name, content);
            let config = Config::load(&path).unwrap();
            assert_eq!(config.crawler, CrawlerConfig::default());
            std::fs::remove_dir_all(&dir).ok();
        }
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let (dir, path) = write_config(
            "partial",
            "database = \"/var/lib/feedcrawl/crawl.db\"\n[crawler]\nloop_delay_secs = 5\n",
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.database, "/var/lib/feedcrawl/crawl.db");
        assert_eq!(config.crawler.loop_delay_secs, 5);
        assert_eq!(config.crawler.error_delay_secs, 60); // default
        assert_eq!(config.http, HttpConfig::default());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let content = r#"
database = "crawl.db"
log_level = "debug"
error_log = "errors.jsonl"

[crawler]
channel_fetching_delay = { min_secs = 10, max_secs = 20 }
channel_error_delay_secs = 120
error_delay_secs = 15
loop_delay_secs = 1

[http]
timeout_secs = 5
max_feed_bytes = 1024
max_retries = 0
user_agent = "test-agent"
"#;
        let (dir, path) = write_config("full", content);

        let config = Config::load(&path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.error_log, Some(PathBuf::from("errors.jsonl")));
        assert_eq!(
            config.crawler,
            CrawlerConfig {
                channel_fetching_delay: DelayRange {
                    min_secs: 10,
                    max_secs: 20
                },
                channel_error_delay_secs: 120,
                error_delay_secs: 15,
                loop_delay_secs: 1,
            }
        );
        assert_eq!(
            config.http,
            HttpConfig {
                timeout_secs: 5,
                max_feed_bytes: 1024,
                max_retries: 0,
                user_agent: "test-agent".to_string(),
            }
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (dir, path) = write_config("invalid", "this is not [valid toml");

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let content = r#"
database = "crawl.db"
totally_fake_key = "should not fail"

[http]
timeout = 5
"#;
        let (dir, path) = write_config("unknown", content);

        let config = Config::load(&path).unwrap();
        assert_eq!(config.database, "crawl.db");
        assert_eq!(config.http.timeout_secs, 30);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let (dir, path) = write_config("wrongtype", "[crawler]\nloop_delay_secs = \"soon\"\n");
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_inverted_delay_range_rejected() {
        let (dir, path) = write_config(
            "inverted",
            "[crawler]\nchannel_fetching_delay = { min_secs = 60, max_secs = 10 }\n",
        );

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("min_secs"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_zero_http_limits_rejected() {
        let mut config = Config::default();
        config.http.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.http.max_feed_bytes = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_equal_delay_bounds_accepted() {
        let mut config = Config::default();
        config.crawler.channel_fetching_delay = DelayRange {
            min_secs: 42,
            max_secs: 42,
        };
        config.validate().unwrap();
    }

    // SEC-014: File size limit
    #[test]
    fn test_too_large_file_rejected() {
        let (dir, path) = write_config("too_large", &"a".repeat(1_048_577));

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_file_at_size_limit_accepted() {
        let mut content = "log_level = \"warn\"\n".to_string();
        while content.len() < 1_048_576 - 20 {
            content.push_str("# padding comment\n");
        }
        content.truncate(1_048_576);
        let (dir, path) = write_config("at_limit", &content);

        assert!(Config::load(&path).is_ok());

        std::fs::remove_dir_all(&dir).ok();
    }
}
