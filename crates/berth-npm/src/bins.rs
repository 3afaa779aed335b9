//! `bin` field resolution.

use crate::error::json_type_name;
use crate::manifest::Manifest;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Normalized `bin` entries for a package.
#[derive(Debug, Clone, Default)]
pub struct BinEntries {
    /// Executable name to package-relative path, sorted by name.
    pub entries: Vec<(String, String)>,
    /// Entries skipped because of a malformed value.
    pub issues: Vec<BinIssue>,
}

/// A `bin` entry that could not be normalized.
#[derive(Debug, Clone)]
pub struct BinIssue {
    /// Entry or field name.
    pub name: String,
    /// What was wrong with it.
    pub detail: String,
}

/// Normalize a manifest's `bin` field.
///
/// The string shorthand becomes a single entry named after the package's
/// unscoped name. Object entries map executable names to paths; non-string
/// targets are reported, not fatal.
#[must_use]
pub fn bin_entries(manifest: &Manifest) -> BinEntries {
    let mut out = BinEntries::default();
    let Some(bin) = manifest.get("bin") else {
        return out;
    };

    match bin {
        Value::String(path) => match manifest.name() {
            Some(name) => out.entries.push((unscoped(name).to_string(), path.clone())),
            None => out.issues.push(BinIssue {
                name: "bin".to_string(),
                detail: "string 'bin' requires a package name".to_string(),
            }),
        },
        Value::Object(map) => {
            for (name, target) in map {
                if let Some(path) = target.as_str() {
                    out.entries.push((name.clone(), path.to_string()));
                } else {
                    out.issues.push(BinIssue {
                        name: name.clone(),
                        detail: format!("expected string path, got {}", json_type_name(target)),
                    });
                }
            }
        }
        other => out.issues.push(BinIssue {
            name: "bin".to_string(),
            detail: format!("expected string or object, got {}", json_type_name(other)),
        }),
    }

    out
}

/// Where a project's executables get linked.
#[must_use]
pub fn bin_dir(pkg_root: &Path) -> PathBuf {
    pkg_root.join("node_modules").join(".bin")
}

fn unscoped(name: &str) -> &str {
    name.split_once('/').map_or(name, |(_, bare)| bare)
}
