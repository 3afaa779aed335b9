#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_panics_doc)]

//! GitHub ref resolution with caching.
//!
//! Resolves a git ref (tag, branch, or commit SHA) to its commit SHA via the
//! GitHub API, trying strategies in order:
//! 1. lightweight or annotated tag (annotated tags are dereferenced to the
//!    underlying commit)
//! 2. branch head
//! 3. literal commit SHA
//!
//! Results land in an in-memory [`RefCache`] (tag and commit resolutions
//! never expire; branch resolutions carry a TTL) and, when configured, in a
//! persistent [`berth_cache::TtlCache`] shared across processes.

pub mod client;
pub mod error;
pub mod ref_cache;

pub use client::{
    GitHubClient, ResolveOptions, API_ENV, DEFAULT_API_URL, DEFAULT_BRANCH_TTL, DISABLE_CACHE_ENV,
};
pub use error::{Error, Result};
pub use ref_cache::{RefCache, RefEntry, RefKey};
