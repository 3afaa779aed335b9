//! Content hashing and integrity strings.
//!
//! Entries in the persistent store are addressed by a SHA-256 digest of
//! their payload, carried around as an `sha256-<hex>` integrity string.

use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::str::FromStr;

/// Compute the SHA-256 hash of a byte slice, returning the hex-encoded digest.
#[must_use]
pub fn sha256_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Compute the SHA-256 hash of a file, returning the hex-encoded digest.
///
/// Streams the file content to minimize memory usage.
///
/// # Errors
/// Returns an error if the file cannot be opened or read.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// An `sha256-<hex>` integrity string for a stored payload.
///
/// The prefix names the digest algorithm so the on-disk format can grow
/// new algorithms without ambiguity; only `sha256` is produced today.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Integrity {
    hex: String,
}

impl Integrity {
    /// Algorithm prefix for all integrity strings this library produces.
    pub const ALGORITHM: &'static str = "sha256";

    /// Compute the integrity of a byte slice.
    #[must_use]
    pub fn from_bytes(data: &[u8]) -> Self {
        Self {
            hex: sha256_bytes(data),
        }
    }

    /// Compute the integrity of a file's content (streaming).
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or read.
    pub fn from_file(path: &Path) -> io::Result<Self> {
        Ok(Self {
            hex: sha256_file(path)?,
        })
    }

    /// The hex digest without the algorithm prefix.
    #[must_use]
    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Check whether `data` hashes to this integrity value.
    #[must_use]
    pub fn verify(&self, data: &[u8]) -> bool {
        sha256_bytes(data) == self.hex
    }
}

impl fmt::Display for Integrity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", Self::ALGORITHM, self.hex)
    }
}

/// Error returned when an integrity string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIntegrityError {
    input: String,
}

impl fmt::Display for ParseIntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid integrity string: {:?}", self.input)
    }
}

impl std::error::Error for ParseIntegrityError {}

impl FromStr for Integrity {
    type Err = ParseIntegrityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseIntegrityError {
            input: s.to_string(),
        };

        let (algo, digest) = s.split_once('-').ok_or_else(err)?;
        if algo != Self::ALGORITHM {
            return Err(err());
        }
        // SHA-256 digests are 32 bytes, 64 hex characters.
        if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(err());
        }

        Ok(Self {
            hex: digest.to_ascii_lowercase(),
        })
    }
}
