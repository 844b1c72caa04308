use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use fixture_sync::config::Config;
use fixture_sync::db::Database;
use fixture_sync::feed::build_feed_client;
use fixture_sync::sync::Scheduler;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    // Open database
    let db = Database::open(&config.database_path)?;
    info!(
        "Database opened: {} ({} matches stored)",
        config.database_path,
        db.count_matches()?
    );

    let feed = build_feed_client(&config)?;
    info!("Feed provider: {}", feed.name());

    let mut scheduler = Scheduler::new(
        feed,
        Arc::new(db.clone()),
        Duration::from_secs(config.sync_interval_secs),
    );

    if config.run_once {
        match scheduler.run_cycle().await {
            Ok(report) => info!(
                "Sync finished: fetched={} upserted={} rejected={} failed={} (total stored: {})",
                report.fetched,
                report.upserted,
                report.rejected,
                report.failed,
                db.count_matches()?
            ),
            Err(e) => error!(category = e.category(), "Sync failed: {}", e),
        }
        return Ok(());
    }

    scheduler.start();

    // Runs for the process lifetime; Ctrl-C disarms the timer and drains
    // cycles that are mid-write
    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    scheduler.shutdown().await;

    Ok(())
}
