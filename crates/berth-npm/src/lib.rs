#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! package.json utilities shared by registry tooling.
//!
//! Covers manifest loading, normalization, and editing, merged dependency
//! extraction, package spec parsing, and `bin` field resolution.
//! Installation, packing, and publishing live elsewhere.

pub mod bins;
pub mod deps;
pub mod error;
pub mod manifest;
pub mod spec;

pub use bins::{bin_dir, bin_entries, BinEntries, BinIssue};
pub use deps::{merged_deps, read_deps, DepIssue, DepsOptions, PackageDeps};
pub use error::{Error, Result};
pub use manifest::{DepSection, DroppedDep, DroppedSection, Manifest, NormalizeReport};
pub use spec::PackageSpec;
