use clap::{Parser, ValueEnum};
use url::Url;

/// Upstream fixtures providers this build can talk to.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedProvider {
    /// API-Football v3 (api-sports.io)
    ApiFootball,
}

/// Football fixtures sync service
#[derive(Parser, Debug, Clone)]
#[command(name = "fixture-sync", version, about)]
pub struct Config {
    /// SQLite database path (":memory:" for a throwaway store)
    #[arg(long, env = "DATABASE_PATH", default_value = "matches.db")]
    pub database_path: String,

    /// Which upstream feed to poll
    #[arg(long, env = "FEED_PROVIDER", value_enum, default_value = "api-football")]
    pub feed_provider: FeedProvider,

    /// Feed base URL
    #[arg(
        long,
        env = "FOOTBALL_API_URL",
        default_value = "https://v3.football.api-sports.io"
    )]
    pub feed_api_url: String,

    /// Feed API key
    #[arg(long, env = "FOOTBALL_API_KEY", hide_env_values = true)]
    pub feed_api_key: String,

    /// Query string for the fixtures endpoint
    #[arg(long, env = "FOOTBALL_API_QUERY", default_value = "live=all")]
    pub feed_query: String,

    /// Seconds between sync cycles
    #[arg(long, env = "SYNC_INTERVAL_SECS", default_value = "9")]
    pub sync_interval_secs: u64,

    /// Per-request timeout for the feed, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "10")]
    pub request_timeout_secs: u64,

    /// Run a single sync cycle and exit
    #[arg(long, env = "RUN_ONCE", default_value = "false")]
    pub run_once: bool,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.feed_api_key.trim().is_empty() {
            anyhow::bail!("FOOTBALL_API_KEY must not be empty");
        }
        let url = Url::parse(&self.feed_api_url)
            .map_err(|e| anyhow::anyhow!("feed_api_url is not a valid URL: {}", e))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("feed_api_url must be http or https, got {}", url.scheme());
        }
        if self.sync_interval_secs == 0 {
            anyhow::bail!("sync_interval_secs must be positive");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be positive");
        }
        Ok(())
    }
}
