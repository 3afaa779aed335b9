//! Package spec parsing.
//!
//! A spec names a package and optionally a version range:
//! `react`, `react@^18.0.0`, `@types/node`, `@types/node@^20`.

use crate::error::{Error, Result};

/// A parsed package specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    /// Full package name, scope included.
    pub name: String,
    /// Scope without the leading `@`, for scoped packages.
    pub scope: Option<String>,
    /// Version range or dist-tag; `None` means latest.
    pub range: Option<String>,
}

impl PackageSpec {
    /// Parse a spec string.
    ///
    /// # Errors
    /// Returns [`Error::SpecInvalid`] for empty specs, malformed scoped
    /// names, empty ranges, and names with characters outside
    /// alphanumerics, `-`, `_`, and `.`.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::spec("empty package spec"));
        }

        // The range delimiter is the first '@' past position 0; a leading
        // '@' belongs to the scope.
        let start = usize::from(input.starts_with('@'));
        let (name, range) = match input[start..].find('@') {
            Some(offset) => {
                let at = start + offset;
                let range = &input[at + 1..];
                if range.is_empty() {
                    return Err(Error::spec(format!("empty version range in '{input}'")));
                }
                (&input[..at], Some(range.to_string()))
            }
            None => (input, None),
        };

        let scope = match name.strip_prefix('@') {
            Some(rest) => {
                let Some((scope, bare)) = rest.split_once('/') else {
                    return Err(Error::spec(format!("missing '/' in scoped name '{name}'")));
                };
                validate_name_part(scope, name)?;
                validate_name_part(bare, name)?;
                Some(scope.to_string())
            }
            None => {
                validate_name_part(name, name)?;
                None
            }
        };

        Ok(Self {
            name: name.to_string(),
            scope,
            range,
        })
    }

    /// Whether the package is scoped.
    #[must_use]
    pub fn is_scoped(&self) -> bool {
        self.scope.is_some()
    }

    /// The name without its scope: `node` for `@types/node`.
    #[must_use]
    pub fn unscoped_name(&self) -> &str {
        match self.name.split_once('/') {
            Some((_, bare)) => bare,
            None => &self.name,
        }
    }

    /// The name as it appears in registry URLs, with `/` encoded as `%2F`.
    #[must_use]
    pub fn url_encoded_name(&self) -> String {
        self.name.replace('/', "%2F")
    }
}

fn validate_name_part(part: &str, full: &str) -> Result<()> {
    if part.is_empty() {
        return Err(Error::spec(format!("empty name component in '{full}'")));
    }
    for c in part.chars() {
        if !c.is_alphanumeric() && !matches!(c, '-' | '_' | '.') {
            return Err(Error::spec(format!(
                "invalid character '{c}' in package name '{full}'"
            )));
        }
    }
    Ok(())
}
