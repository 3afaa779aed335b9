//! package.json loading, normalization, and editing.

use crate::error::{json_type_name, Error, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The three dependency sections a manifest may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepSection {
    Dependencies,
    DevDependencies,
    OptionalDependencies,
}

impl DepSection {
    /// All sections, in precedence order (highest first).
    pub const ALL: [Self; 3] = [
        Self::Dependencies,
        Self::DevDependencies,
        Self::OptionalDependencies,
    ];

    /// The package.json key for this section.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Dependencies => "dependencies",
            Self::DevDependencies => "devDependencies",
            Self::OptionalDependencies => "optionalDependencies",
        }
    }
}

/// A dependency entry removed by [`Manifest::normalize`].
#[derive(Debug, Clone)]
pub struct DroppedDep {
    /// Section the entry lived in.
    pub section: &'static str,
    /// Dependency name.
    pub name: String,
    /// JSON type found where a string range was expected.
    pub found: &'static str,
}

/// A whole section removed by [`Manifest::normalize`].
#[derive(Debug, Clone)]
pub struct DroppedSection {
    /// Section key.
    pub section: &'static str,
    /// JSON type found where an object was expected.
    pub found: &'static str,
}

/// What [`Manifest::normalize`] changed.
#[derive(Debug, Clone, Default)]
pub struct NormalizeReport {
    /// Entries dropped because the range was not a string.
    pub dropped: Vec<DroppedDep>,
    /// Sections dropped because they were not objects.
    pub dropped_sections: Vec<DroppedSection>,
}

impl NormalizeReport {
    /// True when normalization changed nothing.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.dropped.is_empty() && self.dropped_sections.is_empty()
    }
}

/// A parsed package.json.
///
/// The JSON object representation keeps keys ordered, so loading and saving
/// a manifest normalizes key order throughout, dependency sections included.
#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
    root: Map<String, Value>,
}

impl Manifest {
    /// Load a manifest from disk.
    ///
    /// # Errors
    /// Returns [`Error::ManifestNotFound`] when the file does not exist,
    /// [`Error::ManifestInvalid`] when it is not a JSON object, and IO
    /// errors from reading.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Err(Error::not_found(&path));
        }
        let content = fs::read_to_string(&path)?;
        let manifest = Self::parse(path, &content)?;
        debug!(path = %manifest.path.display(), "loaded package manifest");
        Ok(manifest)
    }

    /// Parse manifest content that was read elsewhere.
    ///
    /// # Errors
    /// Returns [`Error::ManifestInvalid`] when the content is not valid
    /// JSON or the root is not an object.
    pub fn parse(path: impl Into<PathBuf>, content: &str) -> Result<Self> {
        let path = path.into();
        let value: Value = serde_json::from_str(content)
            .map_err(|e| Error::invalid(&path, format!("invalid JSON: {e}")))?;
        let Value::Object(root) = value else {
            return Err(Error::invalid(&path, "root must be a JSON object"));
        };
        Ok(Self { path, root })
    }

    /// Path this manifest was loaded from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The `name` field, when present and a string.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.root.get("name").and_then(Value::as_str)
    }

    /// The `version` field, when present and a string.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.root.get("version").and_then(Value::as_str)
    }

    /// A top-level field by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.root.get(key)
    }

    pub(crate) fn root(&self) -> &Map<String, Value> {
        &self.root
    }

    /// Validate and repair the manifest in place.
    ///
    /// Verifies that `version`, when present, parses as semver. Dependency
    /// entries whose range is not a string are dropped and reported, as are
    /// sections that are not objects. A missing `version` is left alone.
    ///
    /// # Errors
    /// Returns [`Error::VersionInvalid`] when `version` is not valid semver
    /// and [`Error::ManifestInvalid`] when it is not a string.
    pub fn normalize(&mut self) -> Result<NormalizeReport> {
        let mut report = NormalizeReport::default();

        if let Some(version) = self.root.get("version") {
            match version.as_str() {
                Some(raw) => {
                    semver::Version::parse(raw).map_err(|source| Error::VersionInvalid {
                        version: raw.to_string(),
                        source,
                    })?;
                }
                None => {
                    return Err(Error::invalid(
                        &self.path,
                        format!("'version' must be a string, got {}", json_type_name(version)),
                    ));
                }
            }
        }

        for section in DepSection::ALL {
            let Some(value) = self.root.get(section.key()) else {
                continue;
            };
            if !value.is_object() {
                report.dropped_sections.push(DroppedSection {
                    section: section.key(),
                    found: json_type_name(value),
                });
                self.root.remove(section.key());
                continue;
            }

            if let Some(Value::Object(deps)) = self.root.get_mut(section.key()) {
                let bad: Vec<String> = deps
                    .iter()
                    .filter(|(_, range)| !range.is_string())
                    .map(|(name, _)| name.clone())
                    .collect();
                for name in bad {
                    if let Some(range) = deps.remove(&name) {
                        report.dropped.push(DroppedDep {
                            section: section.key(),
                            name,
                            found: json_type_name(&range),
                        });
                    }
                }
            }
        }

        Ok(report)
    }

    /// Set `name` to `range` in the given section, creating the section when
    /// missing. Returns the range it replaced, if any.
    ///
    /// Sections stay sorted by name; a malformed (non-object) section is
    /// replaced by a fresh one.
    pub fn set_dep(&mut self, section: DepSection, name: &str, range: &str) -> Option<String> {
        let slot = self
            .root
            .entry(section.key())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(deps) = slot else {
            return None;
        };
        deps.insert(name.to_string(), Value::String(range.to_string()))
            .and_then(|previous| previous.as_str().map(ToString::to_string))
    }

    /// Remove `name` from every dependency section it appears in.
    ///
    /// Returns true when at least one entry was removed. Emptied sections
    /// are kept.
    pub fn remove_dep(&mut self, name: &str) -> bool {
        let mut removed = false;
        for section in DepSection::ALL {
            if let Some(Value::Object(deps)) = self.root.get_mut(section.key()) {
                removed |= deps.remove(name).is_some();
            }
        }
        removed
    }

    /// Write the manifest back to its path atomically.
    ///
    /// # Errors
    /// Returns IO errors from the write.
    pub fn save(&self) -> Result<()> {
        let mut text = serde_json::to_string_pretty(&self.root)
            .map_err(|e| Error::invalid(&self.path, e.to_string()))?;
        text.push('\n');
        berth_util::fs::atomic_write(&self.path, text.as_bytes())?;
        debug!(path = %self.path.display(), "saved package manifest");
        Ok(())
    }
}
