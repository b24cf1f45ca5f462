//! Read-only access to the content-addressed package cache.

use crate::digest::hash_directory;
use crate::error::IntegrityError;
use std::path::{Path, PathBuf};

/// Environment variable overriding the cache root.
pub const CACHE_ENV: &str = "KILN_PACKAGE_CACHE";

/// The on-disk package cache, one directory per `name/version`.
///
/// The fetch workflow populates it; this type only locates and hashes
/// entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageCache {
    root: PathBuf,
}

impl PackageCache {
    /// Opens a cache at an explicit root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Opens the cache at `$KILN_PACKAGE_CACHE`, or `~/.kiln/pkg` when unset.
    pub fn from_env() -> Result<Self, IntegrityError> {
        if let Some(root) = std::env::var_os(CACHE_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::new(root));
        }
        let home = dirs::home_dir().ok_or(IntegrityError::NoCacheRoot)?;
        Ok(Self::new(home.join(".kiln").join("pkg")))
    }

    /// The cache root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The directory of `name@version`.
    pub fn entry_dir(&self, name: &str, version: &str) -> PathBuf {
        self.root.join(name).join(version)
    }

    /// Returns `true` if `name@version` is present.
    pub fn contains(&self, name: &str, version: &str) -> bool {
        self.entry_dir(name, version).is_dir()
    }

    /// Recomputes the digest of `name@version`, `None` if it is not cached.
    pub fn digest(&self, name: &str, version: &str) -> Result<Option<String>, IntegrityError> {
        let dir = self.entry_dir(name, version);
        if !dir.is_dir() {
            return Ok(None);
        }
        tracing::debug!(package = name, version, dir = %dir.display(), "hashing cache entry");
        hash_directory(&dir).map(Some)
    }
}
