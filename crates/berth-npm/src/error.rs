//! Manifest error types.

use serde_json::Value;
use std::path::{Path, PathBuf};

/// Errors from manifest loading and editing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("package.json not found: {path}")]
    ManifestNotFound { path: PathBuf },

    #[error("Invalid package.json at {path}: {detail}")]
    ManifestInvalid { path: PathBuf, detail: String },

    #[error("Invalid version '{version}': {source}")]
    VersionInvalid {
        version: String,
        #[source]
        source: semver::Error,
    },

    #[error("Invalid package spec: {detail}")]
    SpecInvalid { detail: String },
}

impl Error {
    pub(crate) fn not_found(path: &Path) -> Self {
        Self::ManifestNotFound {
            path: path.to_path_buf(),
        }
    }

    pub(crate) fn invalid(path: &Path, detail: impl Into<String>) -> Self {
        Self::ManifestInvalid {
            path: path.to_path_buf(),
            detail: detail.into(),
        }
    }

    pub(crate) fn spec(detail: impl Into<String>) -> Self {
        Self::SpecInvalid {
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Human-readable JSON type name for issue messages.
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
