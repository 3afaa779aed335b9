#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Shared utilities for berth.
//!
//! This crate provides pure helper functions with no logging/tracing
//! dependencies. Logging is the caller's concern; these helpers stay
//! lightweight so every other crate in the workspace can depend on them.

pub mod fs;
pub mod hash;

pub use hash::{sha256_bytes, sha256_file, Integrity};
