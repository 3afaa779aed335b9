use thiserror::Error;

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for store operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid store record: {0}")]
    Record(#[from] serde_json::Error),

    #[error("No entry found for key: {key}")]
    NotFound { key: String },

    #[error("Corrupt entry for key {key}: {detail}")]
    Corrupt { key: String, detail: String },

    #[error("Invalid store configuration: {0}")]
    Config(String),
}

impl Error {
    /// Create a not-found error for `key`.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create a corruption error for `key`.
    #[must_use]
    pub fn corrupt(key: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Corrupt {
            key: key.into(),
            detail: detail.into(),
        }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
