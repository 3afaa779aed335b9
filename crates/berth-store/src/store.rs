//! The store itself: keyed entries over content-addressed blobs.

use crate::error::{Error, Result};
use crate::paths::resolve_store_root;
use berth_util::fs::atomic_write;
use berth_util::{sha256_bytes, Integrity};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Payload written to or read from the store.
///
/// The caller declares whether the data is text or raw bytes; the tag is
/// recorded with the entry so reads reconstruct the same variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Bytes(Vec<u8>),
    Text(String),
}

impl Payload {
    /// The payload bytes, regardless of variant.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Bytes(b) => b,
            Self::Text(s) => s.as_bytes(),
        }
    }

    /// Consume the payload, returning its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Bytes(b) => b,
            Self::Text(s) => s.into_bytes(),
        }
    }

    /// Byte length of the payload.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    fn kind(&self) -> PayloadKind {
        match self {
            Self::Bytes(_) => PayloadKind::Bytes,
            Self::Text(_) => PayloadKind::Text,
        }
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// Payload variant tag recorded in index records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    Bytes,
    Text,
}

/// On-disk record mapping a key to stored content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRecord {
    /// The entry key.
    pub key: String,
    /// `sha256-<hex>` integrity of the content.
    pub integrity: String,
    /// Payload variant the entry was written as.
    pub kind: PayloadKind,
    /// Content size in bytes.
    pub size: u64,
    /// Write time, milliseconds since the Unix epoch.
    pub time_ms: u64,
    /// Caller-supplied metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// A fully loaded store entry.
#[derive(Debug, Clone)]
pub struct Entry {
    pub key: String,
    pub integrity: Integrity,
    pub payload: Payload,
    pub time_ms: u64,
    pub metadata: Option<Value>,
}

/// Summary returned by [`ContentStore::put`].
#[derive(Debug, Clone)]
pub struct EntrySummary {
    pub key: String,
    pub integrity: Integrity,
    pub size: u64,
    pub time_ms: u64,
}

/// Content-addressed persistent store.
///
/// Layout under the root:
/// - `content/sha256/<aa>/<hash>` — payload bytes, one file per distinct hash
/// - `index/<aa>/<key-hash>.json` — per-key [`IndexRecord`]s
/// - `tmp/` — scratch space for [`ContentStore::with_tmp`]
///
/// Index writes go through temp-file + rename, so concurrent writers follow
/// last-write-wins and readers never observe a partial entry.
#[derive(Debug, Clone)]
pub struct ContentStore {
    /// Root directory of the store.
    root: PathBuf,
}

impl ContentStore {
    /// Open a store rooted at `root`. No I/O happens until first use.
    ///
    /// # Errors
    /// Returns `Error::Config` if `root` is empty.
    pub fn at(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if root.as_os_str().is_empty() {
            return Err(Error::config("store root must not be empty"));
        }
        Ok(Self { root })
    }

    /// Open a store at the environment-resolved location.
    ///
    /// See [`crate::paths`] for the resolution order.
    ///
    /// # Errors
    /// Returns `Error::Config` if resolution produces an empty path.
    pub fn from_env() -> Result<Self> {
        Self::at(resolve_store_root())
    }

    /// The store's root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store `payload` under `key`, replacing any previous entry.
    ///
    /// # Errors
    /// Returns `Error::Config` if `key` is empty, or an IO error if a write
    /// fails.
    pub fn put(&self, key: &str, payload: &Payload, metadata: Option<Value>) -> Result<EntrySummary> {
        validate_key(key)?;

        let bytes = payload.as_bytes();
        let integrity = Integrity::from_bytes(bytes);

        let content = self.content_path(integrity.hex());
        if let Some(parent) = content.parent() {
            fs::create_dir_all(parent)?;
        }
        // Content files are immutable once written: same hash, same bytes.
        if !content.exists() {
            atomic_write(&content, bytes)?;
        }

        let time_ms = now_ms();
        let record = IndexRecord {
            key: key.to_string(),
            integrity: integrity.to_string(),
            kind: payload.kind(),
            size: bytes.len() as u64,
            time_ms,
            metadata,
        };

        let index = self.index_path(key);
        if let Some(parent) = index.parent() {
            fs::create_dir_all(parent)?;
        }
        atomic_write(&index, &serde_json::to_vec(&record)?)?;

        debug!(key, integrity = %integrity, size = record.size, "stored entry");

        Ok(EntrySummary {
            key: record.key,
            integrity,
            size: record.size,
            time_ms,
        })
    }

    /// Load the entry for `key`, verifying content against its recorded
    /// integrity.
    ///
    /// # Errors
    /// Returns `Error::NotFound` if no entry exists, `Error::Corrupt` if the
    /// content is missing or fails verification.
    pub fn get(&self, key: &str) -> Result<Entry> {
        validate_key(key)?;

        let record = self.read_record(key)?;

        let integrity: Integrity = record.integrity.parse().map_err(|_| {
            Error::corrupt(key, format!("unparseable integrity {:?}", record.integrity))
        })?;

        let content = self.content_path(integrity.hex());
        let bytes = match fs::read(&content) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::corrupt(key, "content blob missing"));
            }
            Err(e) => return Err(e.into()),
        };

        if !integrity.verify(&bytes) {
            let actual = sha256_bytes(&bytes);
            return Err(Error::corrupt(
                key,
                format!(
                    "integrity mismatch: expected {}, got sha256-{actual}",
                    record.integrity
                ),
            ));
        }

        let payload = match record.kind {
            PayloadKind::Bytes => Payload::Bytes(bytes),
            PayloadKind::Text => Payload::Text(
                String::from_utf8(bytes)
                    .map_err(|_| Error::corrupt(key, "text entry is not valid UTF-8"))?,
            ),
        };

        Ok(Entry {
            key: record.key,
            integrity,
            payload,
            time_ms: record.time_ms,
            metadata: record.metadata,
        })
    }

    /// Like [`ContentStore::get`] but a missing entry is `Ok(None)`.
    ///
    /// Only the miss is absorbed; corruption and IO failures still surface.
    ///
    /// # Errors
    /// Returns any error other than `Error::NotFound`.
    pub fn safe_get(&self, key: &str) -> Result<Option<Entry>> {
        match self.get(key) {
            Ok(entry) => Ok(Some(entry)),
            Err(Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Remove the entry for `key`. Removing a missing key is not an error.
    ///
    /// Only the index record is deleted; content blobs may back other keys
    /// and are reclaimed by [`ContentStore::clear`].
    ///
    /// # Errors
    /// Returns `Error::Config` if `key` is empty, or an IO error if the
    /// removal fails.
    pub fn remove(&self, key: &str) -> Result<()> {
        validate_key(key)?;

        match fs::remove_file(self.index_path(key)) {
            Ok(()) => {
                debug!(key, "removed entry");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove every entry and all stored content.
    ///
    /// # Errors
    /// Returns an error if a directory removal fails.
    pub fn clear(&self) -> Result<()> {
        for dir in [self.root.join("index"), self.root.join("content")] {
            match fs::remove_dir_all(&dir) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        debug!(root = %self.root.display(), "cleared store");
        Ok(())
    }

    /// List every index record in the store.
    ///
    /// Records that fail to parse are skipped with a warning so one damaged
    /// file cannot block enumeration.
    ///
    /// # Errors
    /// Returns an error if the index directory cannot be walked.
    pub fn entries(&self) -> Result<Vec<IndexRecord>> {
        let index_root = self.root.join("index");
        if !index_root.exists() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for entry in WalkDir::new(&index_root) {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = fs::read(path)?;
            match serde_json::from_slice::<IndexRecord>(&bytes) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable index record");
                }
            }
        }
        Ok(records)
    }

    /// Run `f` with a scratch directory under the store's `tmp/` area.
    ///
    /// The directory is deleted when `f` returns, on success and on error.
    ///
    /// # Errors
    /// Returns an error if the scratch directory cannot be created, or
    /// whatever `f` returns.
    pub fn with_tmp<T>(&self, f: impl FnOnce(&Path) -> Result<T>) -> Result<T> {
        let tmp_root = self.root.join("tmp");
        fs::create_dir_all(&tmp_root)?;

        let dir = tempfile::TempDir::new_in(&tmp_root)?;
        let result = f(dir.path());

        if let Err(e) = dir.close() {
            warn!(error = %e, "failed to remove scratch directory");
        }
        result
    }

    fn content_path(&self, hex: &str) -> PathBuf {
        self.root
            .join("content")
            .join("sha256")
            .join(&hex[..2])
            .join(hex)
    }

    fn index_path(&self, key: &str) -> PathBuf {
        let hashed = sha256_bytes(key.as_bytes());
        self.root
            .join("index")
            .join(&hashed[..2])
            .join(format!("{hashed}.json"))
    }

    fn read_record(&self, key: &str) -> Result<IndexRecord> {
        let bytes = match fs::read(self.index_path(key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::not_found(key));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::config("store key must not be empty"));
    }
    Ok(())
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}
