//! Classification of package import entries.

use crate::error::ConfigError;

/// One parsed import entry of a package.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ImportSpec {
    /// A path import (`./x`, `../x`) resolved against the importing package's root.
    Local {
        /// The path as written.
        path: String,
    },
    /// A versioned dependency resolved through the lock file and cache.
    Remote {
        /// Dependency name.
        name: String,
        /// Constraint text, if any. Absent means latest.
        constraint: Option<String>,
    },
}

impl ImportSpec {
    /// Parses an entry of the form `"<path> [constraint]"`.
    ///
    /// The constraint is everything after the first token, so `"lib >= 1.0.0"`
    /// has constraint `">= 1.0.0"`. The constraint itself is not validated
    /// here; the auditor classifies unparsable constraints.
    pub fn parse(package: &str, entry: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidImport {
            package: package.to_string(),
            entry: entry.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = entry.trim();
        let (path, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((path, rest)) => (path, rest.trim()),
            None => (trimmed, ""),
        };
        if path.is_empty() {
            return Err(invalid("empty entry"));
        }

        if path.starts_with("./") || path.starts_with("../") {
            if !rest.is_empty() {
                return Err(invalid("local imports cannot carry a version constraint"));
            }
            return Ok(ImportSpec::Local {
                path: path.to_string(),
            });
        }

        Ok(ImportSpec::Remote {
            name: path.to_string(),
            constraint: (!rest.is_empty()).then(|| rest.to_string()),
        })
    }

    /// Returns `true` for local path imports.
    pub fn is_local(&self) -> bool {
        matches!(self, ImportSpec::Local { .. })
    }
}
