//! Merged dependency extraction from package.json.

use crate::error::{json_type_name, Result};
use crate::manifest::{DepSection, Manifest};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Which sections to include beyond `dependencies`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DepsOptions {
    /// Include `devDependencies`.
    pub include_dev: bool,
    /// Include `optionalDependencies`.
    pub include_optional: bool,
}

/// A dependency entry that could not be extracted.
#[derive(Debug, Clone)]
pub struct DepIssue {
    /// Dependency or section name.
    pub name: String,
    /// What was wrong with it.
    pub detail: String,
}

/// Merged dependency view of a manifest.
#[derive(Debug, Clone, Default)]
pub struct PackageDeps {
    /// Valid `(name, range)` pairs, sorted by name.
    pub deps: Vec<(String, String)>,
    /// Entries and sections skipped during extraction.
    pub issues: Vec<DepIssue>,
}

/// Read a package.json and extract its merged dependencies.
///
/// # Errors
/// Returns manifest loading errors; malformed entries inside the sections
/// are reported in the result instead.
pub fn read_deps(path: &Path, options: DepsOptions) -> Result<PackageDeps> {
    let manifest = Manifest::load(path)?;
    Ok(merged_deps(&manifest, options))
}

/// Extract merged dependencies from an already-loaded manifest.
///
/// When a name appears in several sections, `dependencies` wins over
/// `devDependencies`, which wins over `optionalDependencies`.
#[must_use]
pub fn merged_deps(manifest: &Manifest, options: DepsOptions) -> PackageDeps {
    let mut merged = BTreeMap::new();
    let mut issues = Vec::new();

    // Lowest precedence first, so later sections overwrite
    if options.include_optional {
        extract_section(
            manifest.root(),
            DepSection::OptionalDependencies,
            &mut merged,
            &mut issues,
        );
    }
    if options.include_dev {
        extract_section(
            manifest.root(),
            DepSection::DevDependencies,
            &mut merged,
            &mut issues,
        );
    }
    extract_section(
        manifest.root(),
        DepSection::Dependencies,
        &mut merged,
        &mut issues,
    );

    PackageDeps {
        deps: merged.into_iter().collect(),
        issues,
    }
}

fn extract_section(
    root: &Map<String, Value>,
    section: DepSection,
    merged: &mut BTreeMap<String, String>,
    issues: &mut Vec<DepIssue>,
) {
    let Some(value) = root.get(section.key()) else {
        return;
    };
    let Some(entries) = value.as_object() else {
        issues.push(DepIssue {
            name: section.key().to_string(),
            detail: format!(
                "'{}' must be an object, got {}",
                section.key(),
                json_type_name(value)
            ),
        });
        return;
    };

    for (name, range) in entries {
        if let Some(range) = range.as_str() {
            merged.insert(name.clone(), range.to_string());
        } else {
            issues.push(DepIssue {
                name: name.clone(),
                detail: format!("expected string range, got {}", json_type_name(range)),
            });
        }
    }
}
