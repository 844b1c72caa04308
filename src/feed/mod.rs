pub mod api_football;
pub mod normalize;
pub mod provider;

pub use api_football::ApiFootball;
pub use normalize::{normalize, RawRecord};
pub use provider::FeedClient;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, FeedProvider};

/// Build the feed client selected by `--feed-provider`.
pub fn build_feed_client(config: &Config) -> anyhow::Result<Arc<dyn FeedClient>> {
    let timeout = Duration::from_secs(config.request_timeout_secs);
    match config.feed_provider {
        FeedProvider::ApiFootball => Ok(Arc::new(ApiFootball::new(
            &config.feed_api_url,
            &config.feed_api_key,
            &config.feed_query,
            timeout,
        )?)),
    }
}
