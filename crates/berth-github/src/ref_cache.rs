//! In-memory cache of resolved refs.

use std::collections::HashMap;
use std::sync::RwLock;

/// Key identifying one ref of one repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RefKey {
    pub owner: String,
    pub repo: String,
    pub gitref: String,
}

impl RefKey {
    #[must_use]
    pub fn new(owner: &str, repo: &str, gitref: &str) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            gitref: gitref.to_string(),
        }
    }
}

/// A resolved ref.
///
/// `expires_at_ms: None` marks an immutable resolution (tag or literal
/// commit SHA); branch resolutions carry an expiry.
#[derive(Debug, Clone)]
pub struct RefEntry {
    pub sha: String,
    pub expires_at_ms: Option<u64>,
}

impl RefEntry {
    fn is_live_at(&self, now_ms: u64) -> bool {
        self.expires_at_ms.map_or(true, |t| now_ms < t)
    }
}

/// Process-local map of resolved refs.
///
/// Stale entries are dropped on access or by [`RefCache::clear`]; there is
/// no background sweep.
#[derive(Debug, Default)]
pub struct RefCache {
    entries: RwLock<HashMap<RefKey, RefEntry>>,
}

impl RefCache {
    /// Create a new empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a live entry. An expired entry is evicted and reported as a
    /// miss.
    #[must_use]
    pub fn get(&self, key: &RefKey, now_ms: u64) -> Option<String> {
        let hit = {
            let entries = self.entries.read().unwrap();
            entries.get(key).cloned()
        };
        let entry = hit?;
        if entry.is_live_at(now_ms) {
            Some(entry.sha)
        } else {
            // Re-check under the write lock; a fresh value may have landed
            // in between.
            let mut entries = self.entries.write().unwrap();
            if entries.get(key).is_some_and(|e| !e.is_live_at(now_ms)) {
                entries.remove(key);
            }
            None
        }
    }

    /// Insert or replace an entry.
    pub fn set(&self, key: RefKey, entry: RefEntry) {
        let mut entries = self.entries.write().unwrap();
        entries.insert(key, entry);
    }

    /// Number of entries currently held, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }
}
