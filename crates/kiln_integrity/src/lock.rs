//! The lock file (`kiln.lock`).
//!
//! The lock file pins each remote dependency version to the content hash of
//! its cache directory. It lives at the workspace root and is only written by
//! the update workflow; the auditor reads it.
//!
//! # Format
//!
//! ```json
//! {
//!   "schema": "kiln.lock/v1",
//!   "packages": {
//!     "modA": {
//!       "1.2.3": "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
//!     }
//!   }
//! }
//! ```

use crate::digest::hash_bytes;
use crate::error::IntegrityError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

/// Lock file name at the workspace root.
pub const LOCK_FILE: &str = "kiln.lock";

/// Schema tag written into every lock file.
pub const LOCK_SCHEMA: &str = "kiln.lock/v1";

/// Package name to version to content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockFile {
    /// Schema tag.
    pub schema: String,
    /// Locked versions keyed by package name, then version.
    #[serde(default)]
    pub packages: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for LockFile {
    fn default() -> Self {
        Self::new()
    }
}

impl LockFile {
    /// Creates an empty lock file.
    pub fn new() -> Self {
        Self {
            schema: LOCK_SCHEMA.to_string(),
            packages: BTreeMap::new(),
        }
    }

    /// Loads a lock file.
    ///
    /// Returns `Ok(None)` if the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>, IntegrityError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(IntegrityError::io(path, e)),
        };
        let lock: LockFile =
            serde_json::from_str(&content).map_err(|e| IntegrityError::LockParse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        if lock.schema != LOCK_SCHEMA {
            return Err(IntegrityError::LockParse {
                path: path.to_path_buf(),
                reason: format!("unsupported schema '{}', expected {LOCK_SCHEMA}", lock.schema),
            });
        }
        Ok(Some(lock))
    }

    /// Writes the lock file as pretty-printed JSON with a trailing newline.
    pub fn save(&self, path: &Path) -> Result<(), IntegrityError> {
        let mut content =
            serde_json::to_string_pretty(self).map_err(|e| IntegrityError::Serialization {
                reason: e.to_string(),
            })?;
        content.push('\n');
        fs::write(path, content).map_err(|e| IntegrityError::io(path, e))
    }

    /// Records the hash of `name@version`.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        version: impl Into<String>,
        hash: impl Into<String>,
    ) {
        self.packages
            .entry(name.into())
            .or_default()
            .insert(version.into(), hash.into());
    }

    /// The locked versions of a package.
    pub fn versions(&self, name: &str) -> Option<&BTreeMap<String, String>> {
        self.packages.get(name).filter(|versions| !versions.is_empty())
    }

    /// The locked hash of `name@version`.
    pub fn hash(&self, name: &str, version: &str) -> Option<&str> {
        self.packages.get(name)?.get(version).map(String::as_str)
    }

    /// The dependency fingerprint: SHA-256 over `name@version=hash` lines in
    /// sorted order.
    pub fn fingerprint(&self) -> String {
        let mut canonical = String::new();
        for (name, versions) in &self.packages {
            for (version, hash) in versions {
                canonical.push_str(&format!("{name}@{version}={}\n", hash.to_ascii_lowercase()));
            }
        }
        hash_bytes(canonical.as_bytes())
    }
}

/// The fingerprint of an optional lock file; an absent lock has none.
pub fn fingerprint_of(lock: Option<&LockFile>) -> Option<String> {
    lock.map(LockFile::fingerprint)
}
