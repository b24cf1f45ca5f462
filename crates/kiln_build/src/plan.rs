//! The compilation plan: packages, units and targets in a fixed order.
//!
//! A [`BuildPlan`] is derived from the workspace alone. Packages are sorted
//! by name and units by their root-relative name, so planning the same
//! workspace twice yields identical plans regardless of how the filesystem
//! enumerates directories. The plan also owns the artifact layout: every
//! path it hands out is relative to the workspace directory.

use crate::error::{write_artifact, BuildError};
use crate::unit::{discover_units, SourceUnit};
use kiln_common::{slash, Target};
use kiln_config::{ResolvedToolchain, WorkspaceConfig};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Schema tag of the plan snapshot.
pub const PLAN_SCHEMA: &str = "kiln.plan/v1";

/// Name of the object index file in each object directory.
pub const INDEX_FILE: &str = "index.json";

/// Kinds of verbose-only debug artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DebugKind {
    /// Syntax tree dumps.
    Ast,
    /// IR dumps.
    Ir,
    /// Generated assembly.
    Asm,
}

impl DebugKind {
    fn dir(self) -> &'static str {
        match self {
            DebugKind::Ast => "ast",
            DebugKind::Ir => "ir",
            DebugKind::Asm => "asm",
        }
    }

    fn extension(self) -> &'static str {
        match self {
            DebugKind::Ast => "ast.json",
            DebugKind::Ir => "ir",
            DebugKind::Asm => "s",
        }
    }
}

/// Switches that shape a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanOptions {
    /// Persist IR but skip object compilation and linking.
    pub emit_ir_only: bool,
    /// Skip linking.
    pub no_link: bool,
    /// Write debug artifacts and always recompile.
    pub verbose: bool,
}

/// One package of the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagePlan {
    /// Package name.
    pub name: String,
    /// Declared version.
    pub version: String,
    /// Workspace-relative package root.
    pub root: PathBuf,
    /// Packages reached through local imports, sorted.
    pub depends_on: Vec<String>,
    /// Source units, sorted by name.
    pub units: Vec<SourceUnit>,
}

/// One (package, unit, target) triple of the plan.
#[derive(Debug, Clone, Copy)]
pub struct CompileJob<'a> {
    /// The package.
    pub package: &'a PackagePlan,
    /// The unit.
    pub unit: &'a SourceUnit,
    /// The target.
    pub target: &'a Target,
}

/// The resolved, ordered schedule of a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    /// Workspace-relative target directory.
    pub target_dir: PathBuf,
    /// The build matrix: the default build first, then declared envs.
    pub targets: Vec<Target>,
    /// Name of the linked binary.
    pub binary: String,
    /// Backend driver.
    pub backend: String,
    /// Switches the plan was made with.
    pub options: PlanOptions,
    /// Packages, sorted by name.
    pub packages: Vec<PackagePlan>,
}

impl BuildPlan {
    /// Every compile job ordered by package, then unit, then target.
    pub fn jobs(&self) -> Vec<CompileJob<'_>> {
        let mut jobs = Vec::new();
        for package in &self.packages {
            for unit in &package.units {
                for target in &self.targets {
                    jobs.push(CompileJob {
                        package,
                        unit,
                        target,
                    });
                }
            }
        }
        jobs
    }

    /// The tree of one target: the target directory itself for the default
    /// build, `<target_dir>/<os>/<arch>` otherwise.
    pub fn target_root(&self, target: &Target) -> PathBuf {
        self.target_dir.join(target.subdir())
    }

    /// IR file of a unit.
    pub fn ir_path(&self, target: &Target, package: &str, unit: &SourceUnit) -> PathBuf {
        self.target_root(target)
            .join("ir")
            .join(package)
            .join(format!("{}.ir", unit.stem()))
    }

    /// Object directory of a package.
    pub fn object_dir(&self, target: &Target, package: &str) -> PathBuf {
        self.target_root(target).join("obj").join(package)
    }

    /// Object file of a unit.
    pub fn object_path(&self, target: &Target, package: &str, unit: &SourceUnit) -> PathBuf {
        self.object_dir(target, package)
            .join(format!("{}.o", unit.stem()))
    }

    /// Object index of a package.
    pub fn index_path(&self, target: &Target, package: &str) -> PathBuf {
        self.object_dir(target, package).join(INDEX_FILE)
    }

    /// Linked binary of a target.
    pub fn binary_path(&self, target: &Target) -> PathBuf {
        self.target_root(target).join(&self.binary)
    }

    /// Root of the debug tree.
    pub fn debug_dir(&self) -> PathBuf {
        self.target_dir.join("debug")
    }

    /// A debug artifact of a unit.
    pub fn debug_path(
        &self,
        kind: DebugKind,
        target: &Target,
        package: &str,
        unit: &SourceUnit,
    ) -> PathBuf {
        self.debug_dir()
            .join(kind.dir())
            .join(target.subdir())
            .join(package)
            .join(format!("{}.{}", unit.stem(), kind.extension()))
    }

    /// The plan snapshot.
    pub fn snapshot_path(&self) -> PathBuf {
        self.debug_dir().join("build.plan.json")
    }

    /// The verbose activity log.
    pub fn activity_log_path(&self) -> PathBuf {
        self.debug_dir().join("activity.log")
    }

    /// Objects of every package for one target, in plan order.
    pub fn objects_for(&self, target: &Target) -> Vec<PathBuf> {
        self.packages
            .iter()
            .flat_map(|p| p.units.iter().map(|u| self.object_path(target, &p.name, u)))
            .collect()
    }

    /// The serializable snapshot of this plan.
    pub fn snapshot(&self) -> PlanSnapshot {
        let units = |target: &Target, package: &PackagePlan| -> Vec<UnitSnapshot> {
            package
                .units
                .iter()
                .map(|unit| UnitSnapshot {
                    name: unit.name.clone(),
                    source: slash(&unit.source),
                    ir: slash(&self.ir_path(target, &package.name, unit)),
                    object: (!self.options.emit_ir_only)
                        .then(|| slash(&self.object_path(target, &package.name, unit))),
                })
                .collect()
        };

        let packages = self
            .packages
            .iter()
            .map(|package| {
                let default = self.targets.iter().find(|t| t.is_default());
                let envs = self
                    .targets
                    .iter()
                    .filter_map(|t| t.declared_env().map(|e| (t, e)))
                    .map(|(target, env)| EnvSnapshot {
                        env: env.to_string(),
                        units: units(target, package),
                        obj_index: slash(&self.index_path(target, &package.name)),
                    })
                    .collect();
                PackageSnapshot {
                    name: package.name.clone(),
                    version: package.version.clone(),
                    root: slash(&package.root),
                    depends_on: package.depends_on.clone(),
                    units: default.map(|t| units(t, package)).unwrap_or_default(),
                    obj_index: default.map(|t| slash(&self.index_path(t, &package.name))),
                    envs,
                }
            })
            .collect();

        PlanSnapshot {
            schema: PLAN_SCHEMA,
            target_dir: slash(&self.target_dir),
            envs: self.targets.iter().map(|t| t.env().to_string()).collect(),
            emit_ir_only: self.options.emit_ir_only,
            no_link: self.options.no_link,
            binary: self.binary.clone(),
            backend: self.backend.clone(),
            packages,
        }
    }

    /// Writes the snapshot under the debug tree and returns its path.
    pub fn write_snapshot(&self, workspace: &Path) -> Result<PathBuf, BuildError> {
        let mut json = serde_json::to_string_pretty(&self.snapshot()).map_err(|e| {
            BuildError::Serialization {
                reason: e.to_string(),
            }
        })?;
        json.push('\n');
        let path = self.snapshot_path();
        write_artifact(workspace, &path, json)?;
        Ok(path)
    }
}

/// The `kiln.plan/v1` document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSnapshot {
    /// Always [`PLAN_SCHEMA`].
    pub schema: &'static str,
    /// Target directory.
    pub target_dir: String,
    /// Environment of every target, default first.
    pub envs: Vec<String>,
    /// Whether object compilation is skipped.
    pub emit_ir_only: bool,
    /// Whether linking is skipped.
    pub no_link: bool,
    /// Binary name.
    pub binary: String,
    /// Backend driver.
    pub backend: String,
    /// Packages in plan order.
    pub packages: Vec<PackageSnapshot>,
}

/// A package in the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageSnapshot {
    /// Package name.
    pub name: String,
    /// Declared version.
    pub version: String,
    /// Package root.
    pub root: String,
    /// Local import closure.
    pub depends_on: Vec<String>,
    /// Units of the default build.
    pub units: Vec<UnitSnapshot>,
    /// Object index of the default build.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obj_index: Option<String>,
    /// Per-environment units and indices.
    pub envs: Vec<EnvSnapshot>,
}

/// A unit in the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitSnapshot {
    /// Unit name.
    pub name: String,
    /// Source file.
    pub source: String,
    /// IR file.
    pub ir: String,
    /// Object file, absent in IR-only builds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
}

/// The per-environment part of a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvSnapshot {
    /// `os/arch`.
    pub env: String,
    /// Units.
    pub units: Vec<UnitSnapshot>,
    /// Object index.
    pub obj_index: String,
}

/// Builds the plan for a workspace.
///
/// `depends_on` maps package names to their local import closure, as
/// computed by the auditor. Packages it does not mention depend on nothing.
pub fn plan(
    workspace: &Path,
    config: &WorkspaceConfig,
    toolchain: &ResolvedToolchain,
    options: PlanOptions,
    depends_on: &BTreeMap<String, Vec<String>>,
) -> Result<BuildPlan, BuildError> {
    let mut decls: Vec<_> = config.packages.iter().collect();
    decls.sort_by(|a, b| a.name.cmp(&b.name));

    let mut packages = Vec::with_capacity(decls.len());
    for decl in decls {
        let root = kiln_common::normalize(Path::new(&decl.root));
        let units = discover_units(workspace, &root)?;
        tracing::debug!(package = %decl.name, units = units.len(), "planned package");
        packages.push(PackagePlan {
            name: decl.name.clone(),
            version: decl.version.clone(),
            root,
            depends_on: depends_on.get(&decl.name).cloned().unwrap_or_default(),
            units,
        });
    }

    Ok(BuildPlan {
        target_dir: toolchain.target_dir.clone(),
        targets: toolchain.targets(),
        binary: config.binary_name().to_string(),
        backend: toolchain.backend.clone(),
        options,
        packages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::Env;
    use std::fs;

    const WORKSPACE: &str = r#"
[workspace]
version = "1.0.0"

[[packages]]
name = "b"
version = "0.1.0"
root = "./b"

[[packages]]
key = "main"
name = "a"
version = "0.2.0"
root = "./a"

[toolchain.compiler]
target = "out"
env = ["linux/amd64"]
"#;

    fn fixture() -> (tempfile::TempDir, BuildPlan) {
        let dir = tempfile::tempdir().unwrap();
        for pkg in ["b", "a"] {
            fs::create_dir_all(dir.path().join(pkg)).unwrap();
            fs::write(dir.path().join(pkg).join("main.kiln"), "").unwrap();
        }
        fs::write(dir.path().join("a/util.kiln"), "").unwrap();
        let config = kiln_config::load_workspace_from_str(WORKSPACE).unwrap();
        let toolchain = kiln_config::resolve_toolchain(&config).unwrap();
        let deps = BTreeMap::from([("a".to_string(), vec!["b".to_string()])]);
        let plan = plan(dir.path(), &config, &toolchain, PlanOptions::default(), &deps).unwrap();
        (dir, plan)
    }

    #[test]
    fn packages_and_jobs_are_ordered() {
        let (_dir, plan) = fixture();
        let names: Vec<&str> = plan.packages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(plan.binary, "a");
        assert_eq!(plan.packages[0].depends_on, vec!["b"]);

        let jobs: Vec<String> = plan
            .jobs()
            .iter()
            .map(|j| format!("{}:{}:{}", j.package.name, j.unit.name, j.target))
            .collect();
        assert_eq!(
            jobs,
            vec![
                "a:main.kiln:default",
                "a:main.kiln:linux/amd64",
                "a:util.kiln:default",
                "a:util.kiln:linux/amd64",
                "b:main.kiln:default",
                "b:main.kiln:linux/amd64",
            ]
        );
    }

    #[test]
    fn layout() {
        let (_dir, plan) = fixture();
        let unit = &plan.packages[0].units[0];
        let default = Target::host();
        let linux = Target::Env(Env::new("linux", "amd64"));
        assert_eq!(plan.ir_path(&default, "a", unit), PathBuf::from("out/ir/a/main.ir"));
        assert_eq!(
            plan.object_path(&linux, "a", unit),
            PathBuf::from("out/linux/amd64/obj/a/main.o")
        );
        assert_eq!(
            plan.index_path(&linux, "a"),
            PathBuf::from("out/linux/amd64/obj/a/index.json")
        );
        assert_eq!(plan.binary_path(&default), PathBuf::from("out/a"));
        assert_eq!(
            plan.debug_path(DebugKind::Asm, &linux, "a", unit),
            PathBuf::from("out/debug/asm/linux/amd64/a/main.s")
        );
        assert_eq!(
            plan.debug_path(DebugKind::Ast, &default, "a", unit),
            PathBuf::from("out/debug/ast/a/main.ast.json")
        );
    }

    #[test]
    fn objects_of_a_precede_b() {
        let (_dir, plan) = fixture();
        let objects: Vec<String> = plan
            .objects_for(&Target::host())
            .iter()
            .map(|p| slash(p))
            .collect();
        assert_eq!(objects, vec!["out/obj/a/main.o", "out/obj/a/util.o", "out/obj/b/main.o"]);
    }

    #[test]
    fn snapshot_is_stable_and_timestamp_free() {
        let (dir, first) = fixture();
        let path = first.write_snapshot(dir.path()).unwrap();
        let a = fs::read_to_string(dir.path().join(&path)).unwrap();
        first.write_snapshot(dir.path()).unwrap();
        let b = fs::read_to_string(dir.path().join(&path)).unwrap();
        assert_eq!(a, b);

        let value: serde_json::Value = serde_json::from_str(&a).unwrap();
        assert_eq!(value["schema"], PLAN_SCHEMA);
        assert_eq!(value["packages"][0]["name"], "a");
        assert_eq!(value["packages"][0]["objIndex"], "out/obj/a/index.json");
        assert_eq!(value["packages"][0]["envs"][0]["env"], "linux/amd64");
        assert!(!a.contains("timestamp"));
    }

    #[test]
    fn ir_only_snapshot_has_no_objects() {
        let (_dir, mut plan) = fixture();
        plan.options.emit_ir_only = true;
        let snapshot = plan.snapshot();
        assert!(snapshot.packages[0].units.iter().all(|u| u.object.is_none()));
    }
}
