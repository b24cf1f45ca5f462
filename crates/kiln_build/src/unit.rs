//! Source unit discovery.

use crate::error::BuildError;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File extension of kiln source units.
pub const SOURCE_EXTENSION: &str = "kiln";

/// One compilation unit: a source file under a package root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceUnit {
    /// Root-relative path with `/` separators, e.g. `net/http.kiln`.
    pub name: String,
    /// Workspace-relative path of the source file.
    pub source: PathBuf,
}

impl SourceUnit {
    /// The unit name without its extension, used to name artifacts.
    pub fn stem(&self) -> &str {
        self.name
            .strip_suffix(SOURCE_EXTENSION)
            .and_then(|s| s.strip_suffix('.'))
            .unwrap_or(&self.name)
    }
}

/// Finds every `*.kiln` file under `workspace/root`, sorted by unit name.
///
/// `root` is the package root as declared, relative to `workspace`.
pub fn discover_units(workspace: &Path, root: &Path) -> Result<Vec<SourceUnit>, BuildError> {
    let abs_root = workspace.join(root);
    let mut units = Vec::new();
    for entry in WalkDir::new(&abs_root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let at = e.path().unwrap_or(&abs_root).to_path_buf();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
            BuildError::read(at, source)
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(SOURCE_EXTENSION) {
            continue;
        }
        let Ok(rel) = path.strip_prefix(&abs_root) else {
            continue;
        };
        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        units.push(SourceUnit {
            name,
            source: kiln_common::normalize(&root.join(rel)),
        });
    }
    units.sort();
    Ok(units)
}
