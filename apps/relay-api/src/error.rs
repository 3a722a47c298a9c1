use std::time::Duration;

/// Failure of a history-store operation.
///
/// Store failures never reach end users. Each coordinator call site decides
/// what to fall back to when one of these comes back.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("store unavailable")]
    Unavailable,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// True when the store could not be reached at all, as opposed to a
    /// malformed value coming back.
    pub fn is_connectivity(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Unavailable => true,
            Self::Redis(e) => e.is_io_error() || e.is_connection_dropped() || e.is_timeout(),
            Self::Serialization(_) => false,
        }
    }
}
