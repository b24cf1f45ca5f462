//! Assembling and writing the manifest of a finished build.

use crate::collect::{artifact, collect_artifacts};
use crate::error::ManifestError;
use crate::model::{
    manifest_path, ArtifactKind, DebugRefs, Integrity, Manifest, Project, MANIFEST_SCHEMA,
};
use kiln_build::{BuildPlan, DebugKind, Execution};
use kiln_common::{slash, Target};
use kiln_integrity::AuditReport;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Everything a manifest is made from.
pub struct ManifestInput<'a> {
    /// Workspace directory.
    pub workspace: &'a Path,
    /// The executed plan.
    pub plan: &'a BuildPlan,
    /// Name and version of the project.
    pub project: Project,
    /// Fingerprint of the current lock file.
    pub fingerprint: Option<String>,
    /// The audit the build passed.
    pub audit: &'a AuditReport,
    /// The compile results.
    pub execution: &'a Execution,
    /// Binaries linked in this build, workspace-relative.
    pub binaries: &'a [(Target, PathBuf)],
}

/// Builds the manifest from the build tree as it is on disk.
///
/// Binaries are recorded only when they were linked in this build and the
/// file exists, so targets skipped by `--no-link` or a disable list never
/// appear in `binaries` or `binariesByEnv`.
pub fn build_manifest(input: &ManifestInput<'_>) -> Result<Manifest, ManifestError> {
    let workspace = input.workspace;
    let mut artifacts = collect_artifacts(workspace, input.plan)?;

    let mut binaries = Vec::new();
    let mut binaries_by_env: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (target, binary) in input.binaries {
        if !workspace.join(binary).is_file() {
            tracing::warn!(binary = %binary.display(), "linked binary is missing");
            continue;
        }
        artifacts.push(artifact(workspace, binary, ArtifactKind::Binary, target)?);
        match target.declared_env() {
            None => binaries.push(slash(binary)),
            Some(env) => binaries_by_env
                .entry(env.to_string())
                .or_default()
                .push(slash(binary)),
        }
    }
    artifacts.sort_by(|a, b| a.path.cmp(&b.path));
    binaries.sort();
    binaries_by_env.values_mut().for_each(|v| v.sort());

    let mut obj_index = Vec::new();
    let mut obj_index_by_env: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (target, indices) in &input.execution.indices {
        let mut paths: Vec<String> = indices.iter().map(|p| slash(p)).collect();
        paths.sort();
        match target.declared_env() {
            None => obj_index.extend(paths),
            Some(env) => obj_index_by_env.entry(env.to_string()).or_default().extend(paths),
        }
    }

    let audit = input.audit;
    let mut missing: Vec<String> = audit
        .missing_in_sum
        .iter()
        .chain(&audit.unsatisfied)
        .chain(&audit.missing_in_cache)
        .cloned()
        .collect();
    missing.sort();
    missing.dedup();

    let debug = input.plan.options.verbose.then(|| {
        let list = |kind: DebugKind| -> Vec<String> {
            input
                .execution
                .debug_artifacts(kind)
                .iter()
                .map(|p| slash(p))
                .collect()
        };
        let exists = |p: PathBuf| workspace.join(&p).is_file().then(|| slash(&p));
        DebugRefs {
            plan: exists(input.plan.snapshot_path()),
            log: exists(input.plan.activity_log_path()),
            ast: list(DebugKind::Ast),
            ir: list(DebugKind::Ir),
            asm: list(DebugKind::Asm),
        }
    });

    Ok(Manifest {
        schema: MANIFEST_SCHEMA.to_string(),
        project: input.project.clone(),
        dependency_fingerprint: input.fingerprint.clone(),
        artifacts,
        binaries,
        binaries_by_env,
        obj_index,
        obj_index_by_env,
        integrity: Integrity {
            verified: audit.verified.clone(),
            missing,
            mismatched: audit.mismatched.clone(),
        },
        debug,
    })
}

/// Builds the manifest and writes it to `<target_dir>/kiln.manifest`.
/// Returns the workspace-relative path written and the manifest.
pub fn write_manifest(input: &ManifestInput<'_>) -> Result<(PathBuf, Manifest), ManifestError> {
    let manifest = build_manifest(input)?;
    let rel = manifest_path(&input.plan.target_dir);
    manifest.save(input.workspace, &rel)?;
    tracing::info!(path = %rel.display(), artifacts = manifest.artifacts.len(), "wrote manifest");
    Ok((rel, manifest))
}
