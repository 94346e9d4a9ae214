use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use feedcrawl::config::Config;
use feedcrawl::crawler::Crawler;
use feedcrawl::feed::{parse_opml, EngineSelector, HttpEngines, HttpFetcher};
use feedcrawl::ports::SystemClock;
use feedcrawl::storage::{Database, DatabaseError};
use feedcrawl::telemetry::{init_logging, ErrorReporter};
use feedcrawl::util::validate_channel_url;

#[derive(Parser, Debug)]
#[command(name = "feedcrawl", version, about = "Polling RSS/Atom crawler")]
struct Args {
    /// Configuration file (missing file means defaults)
    #[arg(long, value_name = "FILE", default_value = "feedcrawl.toml")]
    config: PathBuf,

    /// Database path, overrides the config file
    #[arg(long, value_name = "FILE")]
    database: Option<String>,

    /// Add a channel before crawling
    #[arg(long, value_name = "URL")]
    add: Option<String>,

    /// Title for the channel added with --add
    #[arg(long, value_name = "TITLE", requires = "add")]
    title: Option<String>,

    /// Import channels from an OPML file before crawling
    #[arg(long, value_name = "FILE")]
    import: Option<PathBuf>,

    /// Run a single pass and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    if let Some(database) = args.database {
        config.database = database;
    }

    init_logging(&config.log_level);

    let db = match Database::open(&config.database).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: {}", DatabaseError::InstanceLocked);
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    if let Some(url) = &args.add {
        let url = validate_channel_url(url).with_context(|| format!("Refusing to add {}", url))?;
        let title = args.title.clone().unwrap_or_else(|| url.to_string());
        let id = db
            .add_channel(url.as_str(), &title)
            .await
            .context("Failed to add channel")?;
        tracing::info!(channel_id = id, url = %url, "Channel added");
        println!("Added channel {}: {}", id, url);
    }

    if let Some(path) = &args.import {
        let feeds = parse_opml(path)
            .await
            .with_context(|| format!("Failed to parse OPML file {}", path.display()))?;
        if feeds.is_empty() {
            eprintln!("Warning: No valid channels found in {}", path.display());
        }
        db.import_channels(&feeds)
            .await
            .context("Failed to import channels")?;
        tracing::info!(count = feeds.len(), path = %path.display(), "Channels imported");
        println!("Imported {} channels from {}", feeds.len(), path.display());
    }

    let fetcher = HttpFetcher::from_config(&config.http).context("Failed to build HTTP client")?;
    let selector = EngineSelector::new(Arc::new(HttpEngines::new(fetcher)));
    let mut crawler = Crawler::new(
        Arc::new(db),
        selector,
        Arc::new(ErrorReporter::new(config.error_log.clone())),
        Arc::new(SystemClock),
        config.crawler.clone(),
    );

    if args.once {
        let report = crawler.run_pass().await?;
        println!(
            "Crawled {} of {} channels: {} new items, {} failed, {} skipped",
            report.crawled, report.channels, report.new_items, report.failed, report.skipped
        );
        return Ok(());
    }

    tokio::select! {
        _ = crawler.run() => {}
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl-C")?;
            tracing::info!("Shutting down");
        }
    }

    Ok(())
}
