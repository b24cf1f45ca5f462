//! Rendering of workspace-relative, `/`-separated paths.
//!
//! Every path that leaves the driver in a document (plan, index, manifest,
//! diagnostics) goes through [`relative_to`], so serialized paths are never
//! absolute and never depend on the host separator.

use std::path::{Component, Path, PathBuf};

/// Error returned when a path cannot be expressed relative to a base.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("path {path} is outside of {base}")]
pub struct RelPathError {
    /// The path that was being rendered.
    pub path: PathBuf,
    /// The base it should have been under.
    pub base: PathBuf,
}

/// Renders `path` relative to `base` using `/` separators.
///
/// Relative inputs are taken to already be relative to `base`. Absolute
/// inputs must live under `base`.
pub fn relative_to(base: &Path, path: &Path) -> Result<String, RelPathError> {
    let rel = if path.is_absolute() {
        path.strip_prefix(base).map_err(|_| RelPathError {
            path: path.to_path_buf(),
            base: base.to_path_buf(),
        })?
    } else {
        path
    };

    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => {
                return Err(RelPathError {
                    path: path.to_path_buf(),
                    base: base.to_path_buf(),
                })
            }
        }
    }
    if parts.is_empty() {
        return Ok(".".to_string());
    }
    Ok(parts.join("/"))
}

/// Renders a path that is already workspace-relative with `/` separators.
///
/// Paths that are absolute or climb out with `..` are rendered as written,
/// with separators converted; the workspace loader rejects such roots.
pub fn slash(path: &Path) -> String {
    match relative_to(Path::new(""), path) {
        Ok(rel) => rel,
        Err(_) => path.to_string_lossy().replace('\\', "/"),
    }
}

/// Lexically resolves `.` and `..` components without touching the filesystem.
///
/// Used for paths that may not exist, where `canonicalize` is unavailable.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
