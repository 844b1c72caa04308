use thiserror::Error;

/// Failures of the fetch → normalize → upsert pipeline.
///
/// None of these are fatal: the scheduler logs them at the cycle boundary
/// (or per record) and carries on with the next tick.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Feed unreachable, timed out, or the body could not be read.
    #[error("network failure: {0}")]
    Network(String),

    /// Upstream answered with a non-2xx status.
    #[error("upstream returned HTTP {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    /// Body is not JSON, lacks the `response` array, or reports provider errors.
    #[error("malformed upstream payload: {0}")]
    UpstreamFormat(String),

    /// A single provider record that cannot be mapped to a match (no usable id).
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Persistence layer unreachable or write rejected.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl SyncError {
    /// Stable category label used in log fields.
    pub fn category(&self) -> &'static str {
        match self {
            SyncError::Network(_) => "network",
            SyncError::UpstreamStatus { .. } | SyncError::UpstreamFormat(_) => "upstream_format",
            SyncError::InvalidRecord(_) => "invalid_record",
            SyncError::Storage(_) => "storage",
        }
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        SyncError::Storage(err.to_string())
    }
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;
