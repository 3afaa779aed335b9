//! Store root resolution.
//!
//! Resolution order (first match wins):
//! 1. the `BERTH_CACHE_DIR` environment variable
//! 2. the platform cache directory + `berth`
//!    - Linux: `$XDG_CACHE_HOME/berth` or `~/.cache/berth`
//!    - macOS: `~/Library/Caches/berth`
//!    - Windows: `%LOCALAPPDATA%\berth`
//! 3. `~/.berth/cache`
//! 4. the system temp directory + `berth-cache`

use std::path::PathBuf;

/// Environment variable overriding the store root.
pub const STORE_DIR_ENV: &str = "BERTH_CACHE_DIR";

/// Inputs to store-root resolution.
///
/// Factored out of the process environment so the resolution order is
/// testable without mutating env vars.
#[derive(Debug, Clone, Default)]
pub struct StoreRootInputs {
    /// Value of [`STORE_DIR_ENV`], if set and non-empty.
    pub env_dir: Option<PathBuf>,
    /// Platform cache directory, if known.
    pub platform_cache_dir: Option<PathBuf>,
    /// Home directory, if known.
    pub home_dir: Option<PathBuf>,
}

impl StoreRootInputs {
    /// Capture resolution inputs from the current process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            env_dir: std::env::var_os(STORE_DIR_ENV)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            platform_cache_dir: dirs_next::cache_dir(),
            home_dir: dirs_next::home_dir(),
        }
    }
}

/// Resolve the store root from explicit inputs.
#[must_use]
pub fn store_root_from_inputs(inputs: &StoreRootInputs) -> PathBuf {
    if let Some(dir) = &inputs.env_dir {
        return dir.clone();
    }
    if let Some(cache) = &inputs.platform_cache_dir {
        return cache.join("berth");
    }
    if let Some(home) = &inputs.home_dir {
        return home.join(".berth").join("cache");
    }
    std::env::temp_dir().join("berth-cache")
}

/// Resolve the store root from the current environment.
#[must_use]
pub fn resolve_store_root() -> PathBuf {
    store_root_from_inputs(&StoreRootInputs::from_env())
}
