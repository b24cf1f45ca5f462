//! The `build` command.
//!
//! A build passes through fixed gates: workspace, roots, manifest and
//! signature guards, dependency audit, planning, compilation, linking and
//! finally the manifest. A gate that fails stops the build before the next
//! one starts, so a refused build never touches the build tree.

use crate::context::BuildContext;
use crate::gate::{self, Gate, Halt};
use crate::ports::Ports;
use kiln_build::{
    BuildError, BuildPlan, Execution, Executor, ExternalFrontEnd, FrontEnd, PlanOptions,
};
use kiln_common::{slash, Env, Target};
use kiln_config::{ResolvedToolchain, WorkspaceConfig};
use kiln_diagnostics::data::{BuildSummary, LinkSkipped, ManifestMismatch, SignatureMismatch};
use kiln_diagnostics::{codes, Diagnostic, DiagnosticData};
use kiln_integrity::{check_detached, fingerprint_of, AuditReport, LOCK_FILE};
use kiln_manifest::{manifest_path, write_manifest, ManifestInput, Project};
use kiln_toolchain::{Backend, LinkJob, LinkOutcome, Linker, ToolError};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Command-line switches of a build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Write debug artifacts and the activity log; always recompile.
    pub verbose: bool,
    /// Compile objects but link nothing.
    pub no_link: bool,
    /// Persist IR only.
    pub emit_ir_only: bool,
    /// Overrides the configured backend driver.
    pub backend: Option<String>,
    /// Overrides the configured worker bound.
    pub jobs: Option<usize>,
    /// Environments to leave unlinked in addition to the configured ones.
    pub no_link_envs: Vec<Env>,
}

/// What a finished build left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOutcome {
    /// Workspace-relative manifest path, when one was written.
    pub manifest: Option<PathBuf>,
    /// The success summary, when the build succeeded.
    pub summary: Option<BuildSummary>,
}

/// Runs a build of the context's workspace.
///
/// Every fault is reported on the context's stream; the exit category is
/// read from the stream once the build returns.
pub fn build(ctx: &mut BuildContext, options: &BuildOptions, ports: &Ports) -> BuildOutcome {
    run(ctx, options, ports).unwrap_or_default()
}

fn run(ctx: &mut BuildContext, options: &BuildOptions, ports: &Ports) -> Gate<BuildOutcome> {
    let (config, mut toolchain) = gate::load_workspace(ctx)?;
    apply_overrides(&mut toolchain, options);
    gate::check_roots(ctx, &config)?;

    let lock = gate::load_lock(ctx)?;
    let fingerprint = fingerprint_of(lock.as_ref());
    check_manifest(ctx, &toolchain.target_dir, fingerprint.as_deref())?;
    check_signatures(ctx, &toolchain.target_dir)?;

    let cache = gate::open_cache(ctx, ports)?;
    let report = gate::audit(ctx, &config, lock.as_ref(), &cache)?;
    if !report.is_clean() {
        return Err(Halt);
    }

    let plan_options = PlanOptions {
        emit_ir_only: options.emit_ir_only,
        no_link: options.no_link,
        verbose: options.verbose,
    };
    let plan = kiln_build::plan(
        ctx.workspace(),
        &config,
        &toolchain,
        plan_options,
        &report.depends_on,
    )
    .map_err(|e| build_error(ctx, e))?;

    if options.verbose {
        if let Err(err) = ctx.open_activity_log(&plan.activity_log_path()) {
            ctx.emit(Diagnostic::error(codes::ARTIFACT_WRITE, err.to_string()));
            return Err(Halt);
        }
    }

    let ctx = &*ctx;
    ctx.scoped(|| -> Gate<BuildOutcome> {
        tracing::info!(
            binary = %plan.binary,
            packages = plan.packages.len(),
            targets = plan.targets.len(),
            "build planned"
        );
        if plan.options.verbose {
            plan.write_snapshot(ctx.workspace())
                .map_err(|e| build_error(ctx, e))?;
        }
        let execution = compile(ctx, &plan, &toolchain, ports)?;
        let binaries = link(ctx, &plan, &toolchain, ports);
        finish(ctx, &config, &plan, fingerprint, &report, &execution, &binaries)
    })
}

fn apply_overrides(toolchain: &mut ResolvedToolchain, options: &BuildOptions) {
    if let Some(backend) = options.backend.as_deref().filter(|b| !b.trim().is_empty()) {
        toolchain.backend = backend.trim().to_string();
    }
    if let Some(jobs) = options.jobs.filter(|n| *n > 0) {
        toolchain.concurrency = Some(jobs);
    }
    toolchain.link_disabled.extend(options.no_link_envs.iter().cloned());
}

/// The prior manifest must have been built against the current lock.
fn check_manifest(ctx: &BuildContext, target_dir: &Path, current: Option<&str>) -> Gate<()> {
    let file = slash(&manifest_path(target_dir));
    match kiln_manifest::check_fingerprint(ctx.workspace(), target_dir, current) {
        Ok(None) => Ok(()),
        Ok(Some(mismatch)) => {
            ctx.emit(
                Diagnostic::error(codes::MANIFEST_MISMATCH, mismatch_message(&mismatch))
                    .with_file(file)
                    .with_data(mismatch),
            );
            Err(Halt)
        }
        Err(err) => {
            ctx.emit(Diagnostic::error(codes::FILESYSTEM_ACCESS, err.to_string()).with_file(file));
            Err(Halt)
        }
    }
}

fn mismatch_message(mismatch: &ManifestMismatch) -> String {
    let show = |f: &Option<String>| f.clone().unwrap_or_else(|| "none".to_string());
    format!(
        "prior manifest was built against dependency fingerprint {}, but {LOCK_FILE} is now {}",
        show(&mismatch.recorded),
        show(&mismatch.current)
    )
}

/// Detached signatures of the lock file and the prior manifest must match.
fn check_signatures(ctx: &BuildContext, target_dir: &Path) -> Gate<()> {
    let mut failed = false;
    for rel in [PathBuf::from(LOCK_FILE), manifest_path(target_dir)] {
        let path = ctx.workspace().join(&rel);
        if !path.is_file() {
            continue;
        }
        match check_detached(&path) {
            Ok(None) => {}
            Ok(Some(check)) => {
                failed = true;
                ctx.emit(
                    Diagnostic::error(
                        codes::SIGNATURE_MISMATCH,
                        format!("signature of {} does not match its content", slash(&rel)),
                    )
                    .with_file(slash(&rel))
                    .with_data(SignatureMismatch {
                        signed: slash(&rel),
                        expected: check.expected,
                        got: check.got,
                    }),
                );
            }
            Err(err) => {
                failed = true;
                ctx.emit(
                    Diagnostic::error(codes::FILESYSTEM_ACCESS, err.to_string())
                        .with_file(slash(&rel)),
                );
            }
        }
    }
    if failed {
        Err(Halt)
    } else {
        Ok(())
    }
}

fn compile(
    ctx: &BuildContext,
    plan: &BuildPlan,
    toolchain: &ResolvedToolchain,
    ports: &Ports,
) -> Gate<Execution> {
    let external;
    let frontend: &dyn FrontEnd = match &ports.frontend {
        Some(frontend) => frontend.as_ref(),
        None => {
            let invoker = Arc::clone(&ports.invoker);
            external = ExternalFrontEnd::new(toolchain.frontend.clone(), invoker);
            &external
        }
    };

    let execution = Executor::new(ctx.workspace(), plan, frontend, ports.invoker.as_ref())
        .with_jobs(toolchain.concurrency)
        .with_dispatch(ctx.dispatch())
        .execute()
        .map_err(|e| build_error(ctx, e))?;
    tracing::info!(
        jobs = execution.reports.len(),
        reused = execution.reused(),
        "compilation finished"
    );

    ctx.stream().emit_all(execution.diagnostics().cloned());
    if execution.has_errors() {
        return Err(Halt);
    }
    Ok(execution)
}

/// Links every target; returns the binaries that were produced.
fn link(
    ctx: &BuildContext,
    plan: &BuildPlan,
    toolchain: &ResolvedToolchain,
    ports: &Ports,
) -> Vec<(Target, PathBuf)> {
    if plan.options.emit_ir_only {
        for target in &plan.targets {
            ctx.emit(skipped(target, "linking skipped for IR-only builds"));
        }
        return Vec::new();
    }

    let jobs: Vec<LinkJob> = plan
        .targets
        .iter()
        .map(|target| LinkJob {
            target: target.clone(),
            objects: plan.objects_for(target),
            output: plan.binary_path(target),
        })
        .collect();
    let linker = Linker::new(
        ports.invoker.as_ref(),
        Backend::new(toolchain.backend.clone()),
        ctx.workspace(),
    )
    .with_options(toolchain.link_options.clone())
    .with_disabled(toolchain.link_disabled.clone())
    .with_no_link(plan.options.no_link)
    .with_jobs(toolchain.concurrency)
    .with_dispatch(ctx.dispatch());

    let mut binaries = Vec::new();
    for (job, outcome) in jobs.iter().zip(linker.link_all(&jobs)) {
        match outcome {
            Ok(LinkOutcome::Linked { binary }) => binaries.push((job.target.clone(), binary)),
            Ok(LinkOutcome::Skipped { reason }) => ctx.emit(skipped(&job.target, &reason)),
            Ok(LinkOutcome::Failed(failure)) => ctx.emit(
                Diagnostic::error(
                    codes::LINK_FAILED,
                    format!("linking {} for {} failed", plan.binary, job.target),
                )
                .with_file(slash(&job.output))
                .with_data(DiagnosticData::LinkFailure(failure)),
            ),
            Err(err @ ToolError::Pool(_)) => {
                ctx.emit(Diagnostic::error(codes::FILESYSTEM_ACCESS, err.to_string()))
            }
            Err(err) => ctx.emit(Diagnostic::error(codes::ARTIFACT_WRITE, err.to_string())),
        }
    }
    binaries
}

fn skipped(target: &Target, reason: &str) -> Diagnostic {
    Diagnostic::info(codes::LINK_SKIPPED, format!("{target}: {reason}")).with_data(LinkSkipped {
        target: target.to_string(),
        reason: reason.to_string(),
    })
}

/// Writes the manifest and, when nothing failed, the success summary.
fn finish(
    ctx: &BuildContext,
    config: &WorkspaceConfig,
    plan: &BuildPlan,
    fingerprint: Option<String>,
    report: &AuditReport,
    execution: &Execution,
    binaries: &[(Target, PathBuf)],
) -> Gate<BuildOutcome> {
    let input = ManifestInput {
        workspace: ctx.workspace(),
        plan,
        project: project(config, plan),
        fingerprint,
        audit: report,
        execution,
        binaries,
    };
    let (rel, manifest) = write_manifest(&input).map_err(|err| {
        ctx.emit(Diagnostic::error(
            codes::ARTIFACT_WRITE,
            format!("failed to write manifest: {err}"),
        ));
        Halt
    })?;

    let mut outcome = BuildOutcome {
        manifest: Some(rel.clone()),
        summary: None,
    };
    if ctx.stream().has_errors() {
        return Ok(outcome);
    }

    let summary = BuildSummary {
        targets: plan.targets.iter().map(ToString::to_string).collect(),
        target_dir: slash(&plan.target_dir),
        manifest: slash(&rel),
        binaries: manifest.binaries,
        binaries_by_env: manifest.binaries_by_env,
        obj_index: manifest.obj_index,
        obj_index_by_env: manifest.obj_index_by_env,
    };
    ctx.emit(
        Diagnostic::info(
            codes::BUILD_OK,
            format!("built {} for {} target(s)", plan.binary, plan.targets.len()),
        )
        .with_data(summary.clone()),
    );
    outcome.summary = Some(summary);
    Ok(outcome)
}

fn project(config: &WorkspaceConfig, plan: &BuildPlan) -> Project {
    let version = config
        .package(&plan.binary)
        .map(|p| p.version.as_str())
        .or(Some(config.workspace.version.as_str()))
        .filter(|v| !v.is_empty())
        .unwrap_or("0.0.0");
    Project {
        name: plan.binary.clone(),
        version: version.to_string(),
    }
}

fn build_error(ctx: &BuildContext, err: BuildError) -> Halt {
    let code = if err.is_write() {
        codes::ARTIFACT_WRITE
    } else {
        codes::FILESYSTEM_ACCESS
    };
    ctx.emit(Diagnostic::error(code, err.to_string()));
    Halt
}
