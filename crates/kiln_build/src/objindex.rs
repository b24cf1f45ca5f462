//! Per-package, per-target object indices.

use crate::error::{write_artifact, BuildError};
use kiln_common::ContentHash;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Schema tag of object indices.
pub const INDEX_SCHEMA: &str = "kiln.objindex/v1";

/// The `kiln.objindex/v1` document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectIndex {
    /// Always [`INDEX_SCHEMA`].
    pub schema: String,
    /// Package name.
    pub package: String,
    /// `os/arch`, absent for the default build.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    /// Backend driver the objects were built with.
    pub backend: String,
    /// Units sorted by name.
    pub units: Vec<UnitEntry>,
}

/// One compiled unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitEntry {
    /// Unit name.
    pub unit: String,
    /// Workspace-relative source file.
    pub source: String,
    /// Workspace-relative IR file.
    pub ir: String,
    /// Hash of the source the IR was produced from.
    pub source_hash: ContentHash,
    /// Hash of the front-end and of the sources of the local import closure.
    pub depends_hash: ContentHash,
    /// Workspace-relative object file, absent in IR-only builds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    /// Hash of the object file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_hash: Option<ContentHash>,
    /// Object size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl ObjectIndex {
    /// Creates an index, sorting `units` by name.
    pub fn new(
        package: impl Into<String>,
        env: Option<String>,
        backend: impl Into<String>,
        mut units: Vec<UnitEntry>,
    ) -> Self {
        units.sort_by(|a, b| a.unit.cmp(&b.unit));
        Self {
            schema: INDEX_SCHEMA.to_string(),
            package: package.into(),
            env,
            backend: backend.into(),
            units,
        }
    }

    /// Reads the index at `workspace/rel`.
    ///
    /// A missing, unreadable or foreign index is `None`; it only disables
    /// reuse for one build.
    pub fn load(workspace: &Path, rel: &Path) -> Option<Self> {
        let path = workspace.join(rel);
        let content = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<ObjectIndex>(&content) {
            Ok(index) if index.schema == INDEX_SCHEMA => Some(index),
            Ok(index) => {
                tracing::warn!(path = %path.display(), schema = %index.schema,
                    "ignoring object index with unknown schema");
                None
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt object index");
                None
            }
        }
    }

    /// Writes the index to `workspace/rel`.
    pub fn save(&self, workspace: &Path, rel: &Path) -> Result<(), BuildError> {
        let mut json = serde_json::to_string_pretty(self).map_err(|e| {
            BuildError::Serialization {
                reason: e.to_string(),
            }
        })?;
        json.push('\n');
        write_artifact(workspace, rel, json)
    }

    /// Looks up a unit.
    pub fn unit(&self, name: &str) -> Option<&UnitEntry> {
        self.units
            .binary_search_by(|u| u.unit.as_str().cmp(name))
            .ok()
            .map(|i| &self.units[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn entry(unit: &str) -> UnitEntry {
        UnitEntry {
            unit: unit.into(),
            source: format!("src/{unit}"),
            ir: format!("build/ir/app/{unit}.ir"),
            source_hash: ContentHash::from_bytes(unit.as_bytes()),
            depends_hash: ContentHash::from_bytes(b"kilnc"),
            object: None,
            object_hash: None,
            size: None,
        }
    }

    #[test]
    fn units_are_sorted_and_searchable() {
        let index = ObjectIndex::new("app", None, "clang", vec![entry("b.kiln"), entry("a.kiln")]);
        assert_eq!(index.units[0].unit, "a.kiln");
        assert!(index.unit("b.kiln").is_some());
        assert!(index.unit("c.kiln").is_none());
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let rel = PathBuf::from("build/obj/app/index.json");
        let index = ObjectIndex::new("app", Some("linux/amd64".into()), "clang", vec![entry("m")]);
        index.save(dir.path(), &rel).unwrap();

        let text = std::fs::read_to_string(dir.path().join(&rel)).unwrap();
        assert!(text.contains("\"sourceHash\""));
        assert!(text.contains("\"dependsHash\""));
        assert!(!text.contains("objectHash"));
        assert_eq!(ObjectIndex::load(dir.path(), &rel), Some(index));
    }

    #[test]
    fn corrupt_index_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let rel = PathBuf::from("index.json");
        std::fs::write(dir.path().join(&rel), "{not json").unwrap();
        assert!(ObjectIndex::load(dir.path(), &rel).is_none());
        assert!(ObjectIndex::load(dir.path(), Path::new("absent.json")).is_none());
    }
}
