use thiserror::Error;

/// Boxed error type accepted from fetchers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for cache operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("store error: {0}")]
    Store(#[from] berth_store::Error),

    #[error("invalid cache record: {0}")]
    Record(#[from] serde_json::Error),

    #[error("fetch failed for key {key}: {source}")]
    Fetch {
        key: String,
        #[source]
        source: BoxError,
    },
}

impl Error {
    /// Wrap a fetcher failure for `key`. The source is carried unchanged.
    #[must_use]
    pub fn fetch(key: impl Into<String>, source: BoxError) -> Self {
        Self::Fetch {
            key: key.into(),
            source,
        }
    }
}
