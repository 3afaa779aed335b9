#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]

//! Content-addressed persistent store.
//!
//! Entries are keyed by arbitrary strings. Payload bytes are stored once per
//! content hash under `content/`, per-key records live under `index/`, and
//! every write is atomic at the whole-entry level (temp file + rename).
//! Reads verify content against the recorded integrity hash.

pub mod error;
pub mod paths;
mod store;

pub use error::{Error, Result};
pub use store::{ContentStore, Entry, EntrySummary, IndexRecord, Payload, PayloadKind};
