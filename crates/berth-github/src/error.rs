use thiserror::Error;

/// Result alias for GitHub operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for GitHub operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid GitHub API URL '{url}': {detail}")]
    Url { url: String, detail: String },

    #[error("GitHub API rate limit exceeded{}", reset_suffix(.reset))]
    RateLimited { reset: Option<u64> },

    #[error("GitHub API error {status}: {status_text}")]
    Api { status: u16, status_text: String },

    #[error("failed to resolve ref {gitref} for {owner}/{repo}")]
    RefNotResolved {
        owner: String,
        repo: String,
        gitref: String,
    },

    #[error("cache error: {0}")]
    Cache(#[from] berth_cache::Error),
}

fn reset_suffix(reset: &Option<u64>) -> String {
    match reset {
        Some(epoch_secs) => format!(", resets at {epoch_secs}"),
        None => String::new(),
    }
}

impl Error {
    /// Create an API error from a non-success status.
    #[must_use]
    pub fn api(status: reqwest::StatusCode) -> Self {
        Self::Api {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
        }
    }

    /// Create a resolution-failure error.
    #[must_use]
    pub fn ref_not_resolved(owner: &str, repo: &str, gitref: &str) -> Self {
        Self::RefNotResolved {
            owner: owner.to_string(),
            repo: repo.to_string(),
            gitref: gitref.to_string(),
        }
    }
}
