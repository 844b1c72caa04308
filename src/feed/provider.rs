use async_trait::async_trait;

use super::normalize::RawRecord;
use crate::error::SyncResult;

/// Trait that every upstream fixtures feed must implement.
#[async_trait]
pub trait FeedClient: Send + Sync {
    /// One outbound request; the current window of fixtures or a categorized failure.
    async fn fetch(&self) -> SyncResult<Vec<RawRecord>>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}
