//! Discovery of the artifacts in a build tree.

use crate::error::ManifestError;
use crate::model::{Artifact, ArtifactKind};
use kiln_build::BuildPlan;
use kiln_common::{slash, Target};
use std::path::Path;
use walkdir::WalkDir;

/// Records one file.
pub fn artifact(
    workspace: &Path,
    rel: &Path,
    kind: ArtifactKind,
    target: &Target,
) -> Result<Artifact, ManifestError> {
    let path = workspace.join(rel);
    let size = std::fs::metadata(&path)
        .map_err(|e| ManifestError::io(&path, e))?
        .len();
    Ok(Artifact {
        kind,
        path: slash(rel),
        env: target.declared_env().map(|e| e.to_string()),
        size,
        sha256: kiln_integrity::hash_file(&path)?,
    })
}

/// Finds every IR file and object under the plan's target directory,
/// skipping the debug tree. Results are sorted by path.
///
/// Binaries are not discovered: only the linker knows which of the files
/// in a target root it produced in this build.
pub fn collect_artifacts(
    workspace: &Path,
    plan: &BuildPlan,
) -> Result<Vec<Artifact>, ManifestError> {
    let root = workspace.join(&plan.target_dir);
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    let debug = workspace.join(plan.debug_dir());

    let mut artifacts = Vec::new();
    let walker = WalkDir::new(&root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.path() != debug);
    for entry in walker {
        let entry = entry.map_err(|e| {
            let at = e.path().unwrap_or(&root).to_path_buf();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
            ManifestError::io(at, source)
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let kind = match entry.path().extension().and_then(|e| e.to_str()) {
            Some("ir") => ArtifactKind::Ir,
            Some("o") => ArtifactKind::Object,
            _ => continue,
        };
        let Ok(in_target) = entry.path().strip_prefix(&root) else {
            continue;
        };
        let target = plan
            .targets
            .iter()
            .find(|t| !t.is_default() && in_target.starts_with(t.subdir()))
            .or_else(|| plan.targets.iter().find(|t| t.is_default()));
        let Some(target) = target else {
            continue;
        };
        let rel = plan.target_dir.join(in_target);
        artifacts.push(artifact(workspace, &rel, kind, target)?);
    }
    artifacts.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(artifacts)
}
