#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_panics_doc)]

//! TTL caching over the persistent content store.
//!
//! [`TtlCache`] stores JSON values with an expiry timestamp and serves them
//! through two tiers:
//! - an in-process memo map for repeated reads within the same process
//! - the persistent [`berth_store::ContentStore`] shared across processes
//!
//! Expired entries are treated as absent on read. Keys are namespaced with a
//! configurable prefix so independent caches can share one store.

pub mod clock;
pub mod error;
mod ttl;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{BoxError, Error, Result};
pub use ttl::{CacheStats, TtlCache, DEFAULT_PREFIX, DEFAULT_TTL};
