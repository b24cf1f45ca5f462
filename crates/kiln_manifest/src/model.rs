//! The `kiln.manifest/v1` document.

use crate::error::ManifestError;
use kiln_diagnostics::data::HashMismatch;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Schema tag of the manifest.
pub const MANIFEST_SCHEMA: &str = "kiln.manifest/v1";

/// File name of the manifest inside the target directory.
pub const MANIFEST_FILE: &str = "kiln.manifest";

/// Workspace-relative path of the manifest for a target directory.
pub fn manifest_path(target_dir: &Path) -> PathBuf {
    target_dir.join(MANIFEST_FILE)
}

/// The durable record of a build.
///
/// Every list is sorted and every path is workspace-relative with `/`
/// separators, so manifests of identical builds are byte-identical and can
/// be diffed across machines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Always [`MANIFEST_SCHEMA`].
    pub schema: String,
    /// The project that was built.
    pub project: Project,
    /// Fingerprint of the lock file the build was verified against.
    pub dependency_fingerprint: Option<String>,
    /// IR files, objects and binaries found in the build tree.
    pub artifacts: Vec<Artifact>,
    /// Binaries of the default build.
    pub binaries: Vec<String>,
    /// Binaries per declared environment.
    pub binaries_by_env: BTreeMap<String, Vec<String>>,
    /// Object indices of the default build.
    pub obj_index: Vec<String>,
    /// Object indices per declared environment.
    pub obj_index_by_env: BTreeMap<String, Vec<String>>,
    /// Dependency integrity evidence.
    pub integrity: Integrity,
    /// Debug artifacts, present for verbose builds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugRefs>,
}

/// Name and version of the built project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Project name.
    pub name: String,
    /// Project version.
    pub version: String,
}

/// Kinds of recorded artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Intermediate representation.
    Ir,
    /// Object file.
    Object,
    /// Linked binary.
    Binary,
}

/// One file in the build tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Artifact {
    /// Kind.
    pub kind: ArtifactKind,
    /// Workspace-relative path.
    pub path: String,
    /// `os/arch` for artifacts of a declared environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// SHA-256 hex digest.
    pub sha256: String,
}

/// What the dependency audit verified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integrity {
    /// `name@version` keys whose cache content matched the lock.
    pub verified: Vec<String>,
    /// Requirements that could not be resolved or found.
    pub missing: Vec<String>,
    /// Cache entries whose content differed from the lock.
    pub mismatched: Vec<HashMismatch>,
}

/// Cross-references to verbose debug artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugRefs {
    /// Plan snapshot.
    pub plan: Option<String>,
    /// Activity log.
    pub log: Option<String>,
    /// Syntax tree dumps.
    pub ast: Vec<String>,
    /// IR dumps.
    pub ir: Vec<String>,
    /// Assembly listings.
    pub asm: Vec<String>,
}

impl Manifest {
    /// Serializes the manifest as pretty JSON with a trailing newline.
    pub fn to_json(&self) -> Result<String, ManifestError> {
        let mut json =
            serde_json::to_string_pretty(self).map_err(|e| ManifestError::Serialization {
                reason: e.to_string(),
            })?;
        json.push('\n');
        Ok(json)
    }

    /// Writes the manifest to `workspace/rel`, creating parent directories.
    pub fn save(&self, workspace: &Path, rel: &Path) -> Result<(), ManifestError> {
        let path = workspace.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ManifestError::io(parent, e))?;
        }
        std::fs::write(&path, self.to_json()?).map_err(|e| ManifestError::io(&path, e))
    }

    /// Reads a manifest.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|e| ManifestError::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| ManifestError::Serialization {
            reason: e.to_string(),
        })
    }
}
