//! End-to-end tests of the build and audit commands on on-disk workspaces.
//!
//! The front-end and the backend are replaced by in-process fakes: the
//! front-end echoes sources as IR and the backend concatenates its inputs
//! into its `-o` output, so every artifact is a deterministic function of
//! the sources.

use kiln_build::{CompileOutput, CompileRequest, FrontEnd, OperationUse, Trust, UnitIr};
use kiln_diagnostics::data::LinkSkipped;
use kiln_diagnostics::{Diagnostic, DiagnosticData, DiagnosticRecord, DiagnosticStream};
use kiln_diagnostics::ExitCategory;
use kiln_driver::{BuildContext, BuildOptions, BuildOutcome, Ports};
use kiln_integrity::{hash_directory, LockFile, PackageCache, LOCK_FILE};
use kiln_toolchain::{ToolError, ToolInvoker, ToolOutput};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Echoes each source as IR. Sources containing `syntax error` fail and
/// sources containing `io.` use `io.Write`.
struct EchoFrontEnd;

impl FrontEnd for EchoFrontEnd {
    fn compile(&self, request: &CompileRequest<'_>) -> CompileOutput {
        let text = fs::read_to_string(request.workspace.join(&request.unit.source)).unwrap();
        if text.contains("syntax error") {
            return CompileOutput {
                ir: None,
                diagnostics: vec![Diagnostic::error("E601".parse().unwrap(), "syntax error")
                    .with_package(request.package)],
            };
        }
        let operations = if text.contains("io.") {
            vec![OperationUse {
                name: "io.Write".into(),
                pos: None,
            }]
        } else {
            Vec::new()
        };
        CompileOutput {
            ir: Some(UnitIr {
                ir: format!("; {} {}\n{text}", request.env, request.unit.name),
                ast: None,
                trust: Trust::Trusted,
                capabilities: Vec::new(),
                operations,
            }),
            diagnostics: Vec::new(),
        }
    }
}

/// Writes the concatenation of its inputs to the `-o` path. Links whose
/// output contains `fail_link_on` fail.
#[derive(Default)]
struct ConcatBackend {
    calls: Mutex<Vec<Vec<String>>>,
    fail_link_on: Option<&'static str>,
}

impl ConcatBackend {
    fn compiles(&self) -> usize {
        self.calls.lock().unwrap().iter().filter(|a| a[0] == "-c").count()
    }

    fn links(&self) -> usize {
        self.calls.lock().unwrap().iter().filter(|a| a[0] == "-target").count()
    }
}

impl ToolInvoker for ConcatBackend {
    fn invoke(&self, _: &str, args: &[String], cwd: &Path) -> Result<ToolOutput, ToolError> {
        self.calls.lock().unwrap().push(args.to_vec());
        let at = args.iter().position(|a| a == "-o").unwrap();
        let output = &args[at + 1];
        let linking = args[0] == "-target";
        if linking && self.fail_link_on.is_some_and(|f| output.contains(f)) {
            return Ok(ToolOutput {
                status: Some(1),
                stdout: String::new(),
                stderr: "ld: undefined symbol: main\n".into(),
            });
        }
        let inputs = if linking { &args[2..at] } else { &args[3..4] };
        let mut bytes = Vec::new();
        for input in inputs {
            bytes.extend(fs::read(cwd.join(input)).unwrap());
        }
        fs::write(cwd.join(output), bytes).unwrap();
        Ok(ToolOutput {
            status: Some(0),
            ..Default::default()
        })
    }
}

// ---------------------------------------------------------------------------
// Helper: an on-disk workspace with its own package cache
// ---------------------------------------------------------------------------

const WORKSPACE: &str = r#"
[workspace]
version = "1.0.0"

[[packages]]
name = "b"
version = "0.2.0"
root = "./b"

[[packages]]
key = "main"
name = "a"
version = "0.1.0"
root = "./a"
import = ["../b"]

[toolchain.compiler]
env = ["linux/amd64", "windows/amd64"]

[toolchain.linker]
disable = ["windows/amd64"]
"#;

struct Workspace {
    dir: TempDir,
    cache: TempDir,
}

struct Run {
    exit: ExitCategory,
    records: Vec<DiagnosticRecord>,
    outcome: BuildOutcome,
}

impl Run {
    fn codes(&self) -> Vec<String> {
        self.records.iter().map(|r| r.code.to_string()).collect()
    }

    fn has(&self, code: &str) -> bool {
        self.codes().iter().any(|c| c == code)
    }
}

impl Workspace {
    fn new(toml: &str) -> Self {
        let ws = Self {
            dir: tempfile::tempdir().unwrap(),
            cache: tempfile::tempdir().unwrap(),
        };
        ws.write("kiln.toml", toml);
        ws
    }

    /// The default two-package workspace with one unit per package.
    fn standard() -> Self {
        let ws = Self::new(WORKSPACE);
        ws.write("a/main.kiln", "fn main() { b.greet() }");
        ws.write("b/greet.kiln", "fn greet() {}");
        ws
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn write(&self, rel: &str, content: &str) {
        let path = self.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn read(&self, rel: &str) -> Vec<u8> {
        fs::read(self.path().join(rel)).unwrap()
    }

    fn json(&self, rel: &str) -> serde_json::Value {
        serde_json::from_slice(&self.read(rel)).unwrap()
    }

    fn ports(&self, backend: Arc<ConcatBackend>) -> Ports {
        Ports::with_invoker(backend)
            .frontend(Arc::new(EchoFrontEnd))
            .cache(PackageCache::new(self.cache.path()))
    }

    fn build_with(&self, options: &BuildOptions, backend: Arc<ConcatBackend>) -> Run {
        let (stream, _) = DiagnosticStream::capture();
        let mut ctx = BuildContext::new(self.path(), stream);
        let outcome = kiln_driver::build(&mut ctx, options, &self.ports(backend));
        let records = ctx.stream().records();
        let exit = ctx.finish().unwrap();
        Run {
            exit,
            records,
            outcome,
        }
    }

    fn build(&self) -> Run {
        self.build_with(&BuildOptions::default(), Arc::default())
    }

    fn audit(&self) -> (Run, Option<kiln_integrity::AuditReport>) {
        let (stream, _) = DiagnosticStream::capture();
        let ctx = BuildContext::new(self.path(), stream);
        let report = kiln_driver::audit(&ctx, &self.ports(Arc::default()));
        let records = ctx.stream().records();
        let exit = ctx.finish().unwrap();
        let run = Run {
            exit,
            records,
            outcome: BuildOutcome::default(),
        };
        (run, report)
    }

    /// Caches `name@version` and returns its digest.
    fn cached(&self, name: &str, version: &str) -> String {
        let dir = self.cache.path().join(name).join(version);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("lib.kiln"), format!("// {name} {version}")).unwrap();
        hash_directory(&dir).unwrap()
    }

    fn lock(&self, entries: &[(&str, &str, &str)]) {
        let mut lock = LockFile::new();
        for (name, version, hash) in entries {
            lock.insert(*name, *version, *hash);
        }
        lock.save(&self.path().join(LOCK_FILE)).unwrap();
    }
}

// ===========================================================================
// Successful builds
// ===========================================================================

#[test]
fn build_succeeds_with_summary() {
    let ws = Workspace::standard();
    let run = ws.build();

    assert_eq!(run.exit, ExitCategory::Ok, "{:?}", run.codes());
    assert_eq!(run.codes().last().map(String::as_str), Some("I901"));
    let summary = run.outcome.summary.unwrap();
    assert_eq!(summary.targets, vec!["default", "linux/amd64", "windows/amd64"]);
    assert_eq!(summary.manifest, "build/kiln.manifest");
    assert_eq!(summary.binaries, vec!["build/a"]);
    assert_eq!(summary.binaries_by_env["linux/amd64"], vec!["build/linux/amd64/a"]);
    assert_eq!(summary.obj_index, vec!["build/obj/a/index.json", "build/obj/b/index.json"]);

    // Objects are linked in plan order: a's units before b's.
    let binary = String::from_utf8(ws.read("build/a")).unwrap();
    let a = binary.find("main.kiln").unwrap();
    let b = binary.find("greet.kiln").unwrap();
    assert!(a < b);
}

#[test]
fn repeated_builds_are_byte_identical() {
    let ws = Workspace::standard();
    assert_eq!(ws.build().exit, ExitCategory::Ok);
    let manifest = ws.read("build/kiln.manifest");
    let index = ws.read("build/linux/amd64/obj/a/index.json");

    let backend = Arc::new(ConcatBackend::default());
    let run = ws.build_with(&BuildOptions::default(), Arc::clone(&backend));
    assert_eq!(run.exit, ExitCategory::Ok);
    assert_eq!(backend.compiles(), 0, "unchanged units are reused");
    assert_eq!(ws.read("build/kiln.manifest"), manifest);
    assert_eq!(ws.read("build/linux/amd64/obj/a/index.json"), index);
}

#[test]
fn editing_an_imported_package_recompiles_its_importers() {
    let ws = Workspace::standard();
    assert_eq!(ws.build().exit, ExitCategory::Ok);
    let before = ws.json("build/linux/amd64/obj/a/index.json");

    ws.write("b/greet.kiln", "fn greet(name) {}");
    let backend = Arc::new(ConcatBackend::default());
    let run = ws.build_with(&BuildOptions::default(), Arc::clone(&backend));
    assert_eq!(run.exit, ExitCategory::Ok, "{:?}", run.codes());
    // a imports b: both packages are rebuilt for all three targets.
    assert_eq!(backend.compiles(), 6);

    let after = ws.json("build/linux/amd64/obj/a/index.json");
    let unit = |index: &serde_json::Value, key: &str| index["units"][0][key].clone();
    assert_eq!(unit(&before, "sourceHash"), unit(&after, "sourceHash"));
    assert_ne!(unit(&before, "dependsHash"), unit(&after, "dependsHash"));
}

#[test]
fn manifest_paths_are_relative_and_sorted() {
    let ws = Workspace::standard();
    assert_eq!(ws.build().exit, ExitCategory::Ok);

    let manifest = ws.json("build/kiln.manifest");
    assert_eq!(manifest["schema"], "kiln.manifest/v1");
    assert_eq!(manifest["project"]["name"], "a");
    assert_eq!(manifest["project"]["version"], "0.1.0");
    assert!(manifest["dependencyFingerprint"].is_null());
    let paths: Vec<&str> = manifest["artifacts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["path"].as_str().unwrap())
        .collect();
    let mut sorted = paths.clone();
    sorted.sort();
    assert_eq!(paths, sorted);
    assert!(paths.iter().all(|p| p.starts_with("build/")));
    assert!(manifest.get("debug").is_none());
}

// ===========================================================================
// Linking
// ===========================================================================

#[test]
fn disabled_env_is_not_linked() {
    let ws = Workspace::standard();
    let run = ws.build();
    assert_eq!(run.exit, ExitCategory::Ok);

    let manifest = ws.json("build/kiln.manifest");
    let by_env = manifest["binariesByEnv"].as_object().unwrap();
    assert!(by_env.contains_key("linux/amd64"));
    assert!(!by_env.contains_key("windows/amd64"));
    assert!(!ws.path().join("build/windows/amd64/a").exists());
    // Objects of the disabled environment are still compiled.
    assert!(ws.path().join("build/windows/amd64/obj/a/main.o").is_file());

    let skipped: Vec<&LinkSkipped> = run
        .records
        .iter()
        .filter_map(|r| match &r.data {
            Some(DiagnosticData::LinkSkipped(s)) => Some(s),
            _ => None,
        })
        .collect();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].target, "windows/amd64");
}

#[test]
fn no_link_records_no_binaries() {
    let ws = Workspace::standard();
    let backend = Arc::new(ConcatBackend::default());
    let options = BuildOptions {
        no_link: true,
        ..Default::default()
    };
    let run = ws.build_with(&options, Arc::clone(&backend));

    assert_eq!(run.exit, ExitCategory::Ok);
    assert_eq!(backend.links(), 0);
    assert_eq!(run.codes().iter().filter(|c| *c == "I902").count(), 3);
    let manifest = ws.json("build/kiln.manifest");
    assert!(manifest["binaries"].as_array().unwrap().is_empty());
    assert!(manifest["binariesByEnv"].as_object().unwrap().is_empty());
}

#[test]
fn link_failure_keeps_other_targets() {
    let ws = Workspace::standard();
    let backend = Arc::new(ConcatBackend {
        fail_link_on: Some("linux"),
        ..Default::default()
    });
    let run = ws.build_with(&BuildOptions::default(), backend);

    assert_eq!(run.exit, ExitCategory::Io);
    assert!(!run.has("I901"));
    let failure = run
        .records
        .iter()
        .find_map(|r| match &r.data {
            Some(DiagnosticData::LinkFailure(f)) => Some(f),
            _ => None,
        })
        .unwrap();
    assert_eq!(failure.stderr, "ld: undefined symbol: main\n");
    assert_eq!(failure.env.as_deref(), Some("linux/amd64"));

    let manifest = ws.json("build/kiln.manifest");
    assert_eq!(manifest["binaries"][0], "build/a");
    assert!(manifest["binariesByEnv"].as_object().unwrap().is_empty());
}

#[test]
fn ir_only_build_persists_ir_without_objects() {
    let ws = Workspace::standard();
    let backend = Arc::new(ConcatBackend::default());
    let options = BuildOptions {
        emit_ir_only: true,
        ..Default::default()
    };
    let run = ws.build_with(&options, Arc::clone(&backend));

    assert_eq!(run.exit, ExitCategory::Ok);
    assert_eq!(backend.calls.lock().unwrap().len(), 0);
    assert!(ws.path().join("build/ir/a/main.ir").is_file());
    assert!(!ws.path().join("build/obj/a/main.o").exists());
    assert!(ws.path().join("build/obj/a/index.json").is_file());
}

// ===========================================================================
// Gates
// ===========================================================================

#[test]
fn missing_workspace_file_is_io() {
    let ws = Workspace {
        dir: tempfile::tempdir().unwrap(),
        cache: tempfile::tempdir().unwrap(),
    };
    let run = ws.build();
    assert_eq!(run.codes(), vec!["E202"]);
    assert_eq!(run.exit, ExitCategory::Io);
}

#[test]
fn malformed_workspace_is_user_error() {
    let ws = Workspace::new("[[packages]]\nname = \"a\"\n");
    let run = ws.build();
    assert_eq!(run.codes(), vec!["E101"]);
    assert_eq!(run.exit, ExitCategory::User);
}

#[test]
fn missing_package_root_stops_build() {
    let ws = Workspace::new(WORKSPACE);
    ws.write("a/main.kiln", "fn main() {}");
    let run = ws.build();

    assert_eq!(run.codes(), vec!["E201"]);
    assert_eq!(run.records[0].package.as_deref(), Some("b"));
    assert_eq!(run.exit, ExitCategory::Io);
    assert!(!ws.path().join("build").exists());
}

#[test]
fn empty_cache_fails_integrity() {
    let ws = Workspace::new(
        r#"
[[packages]]
key = "main"
name = "app"
version = "0.1.0"
root = "./src"
import = ["lib 1.0.0"]
"#,
    );
    ws.write("src/main.kiln", "fn main() {}");
    let unknown = "0".repeat(64);
    ws.lock(&[("lib", "1.0.0", unknown.as_str())]);

    let backend = Arc::new(ConcatBackend::default());
    let run = ws.build_with(&BuildOptions::default(), Arc::clone(&backend));

    assert_eq!(run.exit, ExitCategory::Integrity);
    assert!(run.has("E304"));
    assert!(run.has("E307"));
    assert_eq!(backend.calls.lock().unwrap().len(), 0);
    assert!(!ws.path().join("build").exists());
}

#[test]
fn verified_dependency_is_recorded() {
    let ws = Workspace::new(
        r#"
[[packages]]
key = "main"
name = "app"
version = "0.1.0"
root = "./src"
import = ["lib >= 1.0.0"]
"#,
    );
    ws.write("src/main.kiln", "fn main() {}");
    let hash = ws.cached("lib", "1.2.0");
    let stale = "0".repeat(64);
    ws.lock(&[("lib", "1.0.0", stale.as_str()), ("lib", "1.2.0", hash.as_str())]);

    let run = ws.build();
    assert_eq!(run.exit, ExitCategory::Ok, "{:?}", run.codes());
    let manifest = ws.json("build/kiln.manifest");
    assert_eq!(manifest["integrity"]["verified"][0], "lib@1.2.0");
    assert!(manifest["dependencyFingerprint"].is_string());
}

#[test]
fn local_import_faults_are_distinguished() {
    let ws = Workspace::new(
        r#"
[[packages]]
key = "main"
name = "app"
version = "0.1.0"
root = "./app"
import = ["../absent"]

[[packages]]
name = "tool"
version = "0.1.0"
root = "./tool"
import = ["../stray"]
"#,
    );
    ws.write("app/main.kiln", "fn main() {}");
    ws.write("tool/main.kiln", "fn main() {}");
    ws.write("stray/x.kiln", "");

    let run = ws.build();
    assert_eq!(run.exit, ExitCategory::User);
    let codes = run.codes();
    assert!(codes.contains(&"E401".to_string()), "{codes:?}");
    assert!(codes.contains(&"E402".to_string()), "{codes:?}");
    let missing = run.records.iter().find(|r| r.code.to_string() == "E401").unwrap();
    assert_eq!(missing.package.as_deref(), Some("app"));
    assert!(!ws.path().join("build").exists());
}

#[test]
fn manifest_mismatch_refuses_before_writing() {
    let ws = Workspace::standard();
    assert_eq!(ws.build().exit, ExitCategory::Ok);
    let manifest = ws.read("build/kiln.manifest");
    let ir = ws.read("build/ir/a/main.ir");

    // A lock file appears; the prior manifest was verified without one.
    let hash = "a".repeat(64);
    ws.lock(&[("zlib", "1.0.0", hash.as_str())]);
    ws.write("a/main.kiln", "fn main() { changed() }");

    let backend = Arc::new(ConcatBackend::default());
    let run = ws.build_with(&BuildOptions::default(), Arc::clone(&backend));
    assert_eq!(run.codes(), vec!["E308"]);
    assert_eq!(run.exit, ExitCategory::Integrity);
    assert_eq!(run.records[0].file.as_deref(), Some("build/kiln.manifest"));
    assert_eq!(backend.calls.lock().unwrap().len(), 0);
    assert_eq!(ws.read("build/kiln.manifest"), manifest);
    assert_eq!(ws.read("build/ir/a/main.ir"), ir);
}

#[test]
fn tampered_lock_signature_is_rejected() {
    let ws = Workspace::standard();
    ws.lock(&[]);
    ws.write("kiln.lock.sig", &"f".repeat(64));

    let run = ws.build();
    assert_eq!(run.codes(), vec!["E309"]);
    assert_eq!(run.exit, ExitCategory::Integrity);
    match &run.records[0].data {
        Some(DiagnosticData::SignatureMismatch(m)) => {
            assert_eq!(m.signed, "kiln.lock");
            assert_eq!(m.got, "f".repeat(64));
        }
        other => panic!("expected signature payload, got {other:?}"),
    }
}

// ===========================================================================
// Compilation faults
// ===========================================================================

#[test]
fn capability_violation_is_user_error() {
    let ws = Workspace::standard();
    ws.write("b/greet.kiln", "fn greet() { io.Write() }");

    let run = ws.build();
    assert_eq!(run.exit, ExitCategory::User);
    // One violation per target; nothing is linked.
    assert_eq!(run.codes().iter().filter(|c| *c == "E501").count(), 3);
    assert!(!run.has("I901"));
    assert!(!ws.path().join("build/a").exists());
    assert!(!ws.path().join("build/ir/b/greet.ir").exists());
}

#[test]
fn frontend_errors_do_not_stop_siblings() {
    let ws = Workspace::standard();
    ws.write("a/main.kiln", "syntax error");

    let run = ws.build();
    assert_eq!(run.exit, ExitCategory::User);
    assert_eq!(run.codes().iter().filter(|c| *c == "E601").count(), 3);
    // b still compiled for every target.
    assert!(ws.path().join("build/obj/b/greet.o").is_file());
    assert!(ws.path().join("build/linux/amd64/obj/b/greet.o").is_file());
    assert!(run.outcome.manifest.is_none());
}

// ===========================================================================
// Verbose builds
// ===========================================================================

#[test]
fn verbose_build_writes_plan_and_activity_log() {
    let ws = Workspace::standard();
    let options = BuildOptions {
        verbose: true,
        ..Default::default()
    };
    let run = ws.build_with(&options, Arc::default());
    assert_eq!(run.exit, ExitCategory::Ok, "{:?}", run.codes());

    let plan = ws.json("build/debug/build.plan.json");
    assert_eq!(plan["schema"], "kiln.plan/v1");
    let packages = plan["packages"].as_array().unwrap();
    assert_eq!(packages[0]["name"], "a");
    assert_eq!(packages[1]["name"], "b");
    assert_eq!(packages[0]["dependsOn"][0], "b");

    assert!(ws.path().join("build/debug/activity.log").is_file());
    let manifest = ws.json("build/kiln.manifest");
    assert_eq!(manifest["debug"]["plan"], "build/debug/build.plan.json");
    assert_eq!(manifest["debug"]["log"], "build/debug/activity.log");
    assert!(!manifest["debug"]["ir"].as_array().unwrap().is_empty());
}

// ===========================================================================
// Audit
// ===========================================================================

#[test]
fn clean_audit_confirms() {
    let ws = Workspace::standard();
    let (run, report) = ws.audit();
    assert_eq!(run.codes(), vec!["I903"]);
    assert_eq!(run.exit, ExitCategory::Ok);
    assert!(report.unwrap().is_clean());
    assert!(!ws.path().join("build").exists());
}

#[test]
fn audit_reports_missing_lock() {
    let ws = Workspace::new(
        r#"
[[packages]]
key = "main"
name = "app"
version = "0.1.0"
root = "./src"
import = ["lib"]
"#,
    );
    ws.write("src/main.kiln", "");
    let (run, report) = ws.audit();
    assert!(run.has("E301"));
    assert_eq!(run.exit, ExitCategory::Integrity);
    assert!(report.unwrap().lock_missing());
}

#[test]
fn corrupt_lock_is_unreadable() {
    let ws = Workspace::standard();
    ws.write(LOCK_FILE, "{ not json");
    let (run, report) = ws.audit();
    assert_eq!(run.codes(), vec!["E310"]);
    assert!(run.records[0].message.contains("lock file unreadable"));
    assert_eq!(run.exit, ExitCategory::Integrity);
    assert!(report.is_none());
}
