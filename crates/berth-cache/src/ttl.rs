//! The TTL cache.

use crate::clock::{Clock, SystemClock};
use crate::error::{BoxError, Error, Result};
use berth_store::{ContentStore, Payload};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::debug;

/// Default key namespace.
pub const DEFAULT_PREFIX: &str = "berth";

/// Default entry lifetime: 5 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Value persisted to the store for each cache entry.
#[derive(Debug, Serialize, Deserialize)]
struct StoredValue {
    value: Value,
    expires_at_ms: u64,
}

/// In-process copy of a live entry.
#[derive(Debug, Clone)]
struct MemoEntry {
    value: Value,
    expires_at_ms: u64,
}

impl MemoEntry {
    fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    pub memo_entries: usize,
}

/// TTL cache over a [`ContentStore`], with an optional in-process memo tier.
///
/// Entries are JSON values stored under `<prefix>:<key>` with an absolute
/// expiry timestamp. An expired entry is logically absent: reads report a
/// miss even while the record is still on disk. All state is owned by the
/// instance; two instances only interact through a shared store, and only
/// when their prefixes match.
#[derive(Debug)]
pub struct TtlCache {
    store: Arc<ContentStore>,
    prefix: String,
    ttl: Duration,
    memoize: bool,
    clock: Arc<dyn Clock>,
    /// Memo tier: namespaced key -> live entry copy.
    memo: RwLock<HashMap<String, MemoEntry>>,
}

impl TtlCache {
    /// Create a cache with the default prefix, TTL, system clock, and
    /// memoization enabled.
    #[must_use]
    pub fn new(store: Arc<ContentStore>) -> Self {
        Self {
            store,
            prefix: DEFAULT_PREFIX.to_string(),
            ttl: DEFAULT_TTL,
            memoize: true,
            clock: Arc::new(SystemClock),
            memo: RwLock::new(HashMap::new()),
        }
    }

    /// Set the key namespace prefix (default [`DEFAULT_PREFIX`]).
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the entry lifetime (default [`DEFAULT_TTL`]).
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Enable or disable the in-process memo tier (default enabled).
    #[must_use]
    pub fn with_memoize(mut self, memoize: bool) -> Self {
        self.memoize = memoize;
        self
    }

    /// Replace the time source (default [`SystemClock`]).
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The key namespace prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The configured entry lifetime.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up `key`. Expired entries report a miss.
    ///
    /// Checks the memo tier first (evicting an expired memo entry on the
    /// spot), then the store. A live store hit repopulates the memo tier.
    ///
    /// # Errors
    /// Returns store read errors and record parse errors; a plain miss is
    /// `Ok(None)`.
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        let skey = self.namespaced(key);
        let now = self.clock.now_ms();

        if self.memoize {
            let hit = {
                let memo = self.memo.read().unwrap();
                memo.get(&skey).cloned()
            };
            if let Some(entry) = hit {
                if entry.is_expired_at(now) {
                    // Re-check under the write lock; a fresh value may have
                    // landed in between.
                    let mut memo = self.memo.write().unwrap();
                    if memo.get(&skey).is_some_and(|e| e.is_expired_at(now)) {
                        memo.remove(&skey);
                    }
                } else {
                    return Ok(Some(entry.value));
                }
            }
        }

        let Some(stored) = self.store.safe_get(&skey)? else {
            return Ok(None);
        };

        let record: StoredValue = serde_json::from_slice(stored.payload.as_bytes())?;

        if now >= record.expires_at_ms {
            debug!(key, "cache entry expired, treating as miss");
            return Ok(None);
        }

        if self.memoize {
            let mut memo = self.memo.write().unwrap();
            memo.insert(
                skey,
                MemoEntry {
                    value: record.value.clone(),
                    expires_at_ms: record.expires_at_ms,
                },
            );
        }

        Ok(Some(record.value))
    }

    /// Store `value` under `key` with expiry `now + ttl`.
    ///
    /// The write always goes to the store; the memo tier is updated only
    /// when memoization is enabled.
    ///
    /// # Errors
    /// Returns store write errors.
    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        let skey = self.namespaced(key);
        let expires_at_ms = self.clock.now_ms().saturating_add(self.ttl.as_millis() as u64);

        let record = StoredValue {
            value,
            expires_at_ms,
        };
        let text = serde_json::to_string(&record)?;
        self.store.put(&skey, &Payload::Text(text), None)?;

        if self.memoize {
            let mut memo = self.memo.write().unwrap();
            memo.insert(
                skey,
                MemoEntry {
                    value: record.value,
                    expires_at_ms,
                },
            );
        }

        Ok(())
    }

    /// Remove `key` from both tiers. Removing a missing key is not an error.
    ///
    /// # Errors
    /// Returns store removal errors.
    pub fn remove(&self, key: &str) -> Result<()> {
        let skey = self.namespaced(key);
        self.store.remove(&skey)?;
        self.memo.write().unwrap().remove(&skey);
        Ok(())
    }

    /// Remove every entry in this cache's namespace.
    ///
    /// Only `<prefix>:`-keyed store records are touched, so caches sharing
    /// the store under other prefixes keep their entries.
    ///
    /// # Errors
    /// Returns store enumeration or removal errors.
    pub fn clear(&self) -> Result<()> {
        let marker = format!("{}:", self.prefix);
        let mut removed = 0usize;
        for record in self.store.entries()? {
            if record.key.starts_with(&marker) {
                self.store.remove(&record.key)?;
                removed += 1;
            }
        }
        self.memo.write().unwrap().clear();
        debug!(prefix = %self.prefix, removed, "cleared cache namespace");
        Ok(())
    }

    /// Drop every memo entry. The store is untouched.
    pub fn clear_memo(&self) {
        self.memo.write().unwrap().clear();
    }

    /// Current cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let memo = self.memo.read().unwrap();
        CacheStats {
            memo_entries: memo.len(),
        }
    }

    /// Return the cached value for `key`, or run `fetcher` and cache its
    /// result.
    ///
    /// The fetcher is not invoked when a live value exists at call time. On
    /// fetch failure nothing is written and the failure is surfaced as
    /// [`Error::Fetch`] with the source unchanged. There is no request
    /// coalescing: two tasks missing the same key concurrently will both
    /// fetch, and the later write wins.
    ///
    /// # Errors
    /// Returns cache read/write errors, or `Error::Fetch` when the fetcher
    /// fails.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetcher: F) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Value, BoxError>>,
    {
        if let Some(value) = self.get(key)? {
            return Ok(value);
        }

        let value = fetcher()
            .await
            .map_err(|source| Error::fetch(key, source))?;

        self.set(key, value.clone())?;
        Ok(value)
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }
}
