//! Plan execution on a bounded worker pool.
//!
//! Every (package, unit, target) job runs independently and writes only
//! below its own package and target directories, so workers share nothing
//! but the read-only plan. Results come back in plan order whatever order
//! the workers finish in.

use crate::capability::check_capabilities;
use crate::error::{write_artifact, BuildError};
use crate::frontend::{confine_code, CompileRequest, FrontEnd, UnitIr};
use crate::objindex::{ObjectIndex, UnitEntry};
use crate::plan::{BuildPlan, CompileJob, DebugKind, PackagePlan};
use kiln_common::{slash, ContentHash, Target};
use kiln_diagnostics::data::ToolFailure;
use kiln_diagnostics::{codes, Diagnostic, DiagnosticData};
use kiln_toolchain::{Backend, ToolInvoker};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::Dispatch;

/// What one job produced.
#[derive(Debug, Clone)]
pub struct JobReport {
    /// Package name.
    pub package: String,
    /// Unit name.
    pub unit: String,
    /// Target.
    pub target: Target,
    /// Front-end, capability and tool diagnostics, in the order found.
    pub diagnostics: Vec<Diagnostic>,
    /// Index entry, present when the unit's IR was persisted.
    pub entry: Option<UnitEntry>,
    /// `true` when the previous build's artifacts were reused.
    pub reused: bool,
    /// Debug artifacts written, workspace-relative.
    pub debug: Vec<(DebugKind, PathBuf)>,
}

impl JobReport {
    fn new(job: &CompileJob<'_>) -> Self {
        Self {
            package: job.package.name.clone(),
            unit: job.unit.name.clone(),
            target: job.target.clone(),
            diagnostics: Vec::new(),
            entry: None,
            reused: false,
            debug: Vec::new(),
        }
    }

    fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity.is_error())
    }
}

/// The outcome of executing a plan.
#[derive(Debug, Clone, Default)]
pub struct Execution {
    /// One report per job, in plan order.
    pub reports: Vec<JobReport>,
    /// Object indices written, per target, workspace-relative.
    pub indices: BTreeMap<Target, Vec<PathBuf>>,
}

impl Execution {
    /// Every diagnostic, in plan order.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.reports.iter().flat_map(|r| r.diagnostics.iter())
    }

    /// Returns `true` if any job reported an error.
    pub fn has_errors(&self) -> bool {
        self.reports.iter().any(JobReport::has_errors)
    }

    /// Number of jobs that reused previous artifacts.
    pub fn reused(&self) -> usize {
        self.reports.iter().filter(|r| r.reused).count()
    }

    /// Every debug artifact of a kind, sorted.
    pub fn debug_artifacts(&self, kind: DebugKind) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .reports
            .iter()
            .flat_map(|r| r.debug.iter())
            .filter(|(k, _)| *k == kind)
            .map(|(_, p)| p.clone())
            .collect();
        paths.sort();
        paths
    }
}

/// Runs a plan's compile jobs.
pub struct Executor<'a> {
    workspace: &'a Path,
    plan: &'a BuildPlan,
    frontend: &'a dyn FrontEnd,
    invoker: &'a dyn ToolInvoker,
    backend: Backend,
    jobs: Option<usize>,
    dispatch: Option<Dispatch>,
}

type PriorIndices = BTreeMap<(Target, String), ObjectIndex>;

/// One line per unit, `<package>/<unit> <source hash>`, keyed by package.
type SourceListing<'p> = BTreeMap<&'p str, String>;

impl<'a> Executor<'a> {
    /// Creates an executor for `plan` in `workspace`.
    pub fn new(
        workspace: &'a Path,
        plan: &'a BuildPlan,
        frontend: &'a dyn FrontEnd,
        invoker: &'a dyn ToolInvoker,
    ) -> Self {
        Self {
            workspace,
            plan,
            frontend,
            invoker,
            backend: Backend::new(plan.backend.clone()),
            jobs: None,
            dispatch: None,
        }
    }

    /// Bounds the worker pool; `None` uses one worker per CPU.
    pub fn with_jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs;
        self
    }

    /// Logs through `dispatch` inside worker threads.
    pub fn with_dispatch(mut self, dispatch: Option<Dispatch>) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Runs every job, then rewrites the object index of every package and
    /// target.
    ///
    /// Diagnostics never stop sibling jobs. Only failures reading sources or
    /// writing artifacts are errors.
    pub fn execute(&self) -> Result<Execution, BuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs.unwrap_or(0))
            .build()
            .map_err(|e| BuildError::Pool(e.to_string()))?;

        let prior = self.prior_indices();
        let listing = self.source_listing()?;
        let jobs = self.plan.jobs();
        tracing::info!(jobs = jobs.len(), workers = pool.current_num_threads(), "compiling");

        let results: Vec<Result<JobReport, BuildError>> = pool.install(|| {
            jobs.par_iter()
                .map(|job| match &self.dispatch {
                    Some(dispatch) => {
                        tracing::dispatcher::with_default(dispatch, || {
                            self.run(job, &prior, &listing)
                        })
                    }
                    None => self.run(job, &prior, &listing),
                })
                .collect()
        });
        let reports = results.into_iter().collect::<Result<Vec<_>, _>>()?;

        let mut execution = Execution {
            reports,
            indices: BTreeMap::new(),
        };
        self.write_indices(&mut execution)?;
        Ok(execution)
    }

    fn prior_indices(&self) -> PriorIndices {
        let mut prior = PriorIndices::new();
        if self.plan.options.verbose {
            return prior;
        }
        for target in &self.plan.targets {
            for package in &self.plan.packages {
                let rel = self.plan.index_path(target, &package.name);
                if let Some(index) = ObjectIndex::load(self.workspace, &rel) {
                    prior.insert((target.clone(), package.name.clone()), index);
                }
            }
        }
        prior
    }

    fn source_listing(&self) -> Result<SourceListing<'a>, BuildError> {
        let plan = self.plan;
        let mut listing = SourceListing::new();
        for package in &plan.packages {
            let mut lines = String::new();
            for unit in &package.units {
                let path = self.workspace.join(&unit.source);
                let bytes = std::fs::read(&path).map_err(|e| BuildError::read(&path, e))?;
                let hash = ContentHash::from_bytes(&bytes);
                lines.push_str(&format!("{}/{} {hash}\n", package.name, unit.name));
            }
            listing.insert(package.name.as_str(), lines);
        }
        Ok(listing)
    }

    /// Hash of everything a package's units are compiled against besides
    /// their own source: the front-end and the units of every package in the
    /// local import closure.
    fn depends_hash(&self, package: &PackagePlan, listing: &SourceListing<'_>) -> ContentHash {
        let mut input = format!("frontend {}\n", self.frontend.identity());
        for dep in &package.depends_on {
            if let Some(lines) = listing.get(dep.as_str()) {
                input.push_str(lines);
            }
        }
        ContentHash::from_bytes(input.as_bytes())
    }

    fn run(
        &self,
        job: &CompileJob<'_>,
        prior: &PriorIndices,
        listing: &SourceListing<'_>,
    ) -> Result<JobReport, BuildError> {
        let mut report = JobReport::new(job);
        let package = job.package.name.as_str();
        let source = self.workspace.join(&job.unit.source);
        let bytes = std::fs::read(&source).map_err(|e| BuildError::read(&source, e))?;
        let source_hash = ContentHash::from_bytes(&bytes);
        let depends_hash = self.depends_hash(job.package, listing);

        let ir_rel = self.plan.ir_path(job.target, package, job.unit);
        let obj_rel = self.plan.object_path(job.target, package, job.unit);

        let previous = prior
            .get(&(job.target.clone(), package.to_string()))
            .filter(|index| index.backend == self.plan.backend)
            .and_then(|index| index.unit(&job.unit.name));
        let reused = previous.and_then(|e| self.reusable(e, source_hash, depends_hash, &ir_rel));
        if let Some(entry) = reused {
            tracing::debug!(package, unit = %job.unit.name, build = %job.target, "up to date");
            report.entry = Some(entry);
            report.reused = true;
            return Ok(report);
        }

        let env = job.target.env();
        let output = self.frontend.compile(&CompileRequest {
            workspace: self.workspace,
            package,
            unit: job.unit,
            env,
        });
        report.diagnostics = output.diagnostics.into_iter().map(confine_code).collect();
        let Some(ir) = output.ir else {
            if !report.has_errors() {
                tracing::warn!(package, unit = %job.unit.name, "front-end returned no IR");
                report.diagnostics.push(
                    Diagnostic::error(
                        codes::FRONTEND_TOOL_FAILED,
                        format!("front-end produced no IR for {} ({})", job.unit.name, job.target),
                    )
                    .with_package(package)
                    .with_file(slash(&job.unit.source)),
                );
            }
            return Ok(report);
        };
        if report.has_errors() {
            return Ok(report);
        }

        let file = slash(&job.unit.source);
        report
            .diagnostics
            .extend(check_capabilities(package, &job.unit.name, &file, &ir));
        if report.has_errors() {
            return Ok(report);
        }

        write_artifact(self.workspace, &ir_rel, &ir.ir)?;
        if self.plan.options.verbose {
            self.write_debug(job, &ir, &ir_rel, &mut report)?;
        }

        let mut entry = UnitEntry {
            unit: job.unit.name.clone(),
            source: file,
            ir: slash(&ir_rel),
            source_hash,
            depends_hash,
            object: None,
            object_hash: None,
            size: None,
        };

        if !self.plan.options.emit_ir_only {
            let Some((hash, size)) = self.compile_object(job, &ir_rel, &obj_rel, &mut report)?
            else {
                return Ok(report);
            };
            entry.object = Some(slash(&obj_rel));
            entry.object_hash = Some(hash);
            entry.size = Some(size);
        }

        tracing::debug!(package, unit = %job.unit.name, build = %job.target, "compiled");
        report.entry = Some(entry);
        Ok(report)
    }

    /// The previous entry, if the unit's artifacts are still current.
    fn reusable(
        &self,
        entry: &UnitEntry,
        source_hash: ContentHash,
        depends_hash: ContentHash,
        ir: &Path,
    ) -> Option<UnitEntry> {
        if entry.source_hash != source_hash || entry.depends_hash != depends_hash {
            return None;
        }
        if entry.ir != slash(ir) {
            return None;
        }
        if !self.workspace.join(ir).is_file() {
            return None;
        }
        let mut entry = entry.clone();
        if self.plan.options.emit_ir_only {
            entry.object = None;
            entry.object_hash = None;
            entry.size = None;
            return Some(entry);
        }
        let object = entry.object.as_deref()?;
        let bytes = std::fs::read(self.workspace.join(object)).ok()?;
        (Some(ContentHash::from_bytes(&bytes)) == entry.object_hash).then_some(entry)
    }

    /// Compiles IR into an object. Returns `None` after recording an `E702`
    /// diagnostic when the backend fails.
    fn compile_object(
        &self,
        job: &CompileJob<'_>,
        ir_rel: &Path,
        obj_rel: &Path,
        report: &mut JobReport,
    ) -> Result<Option<(ContentHash, u64)>, BuildError> {
        let obj_abs = self.workspace.join(obj_rel);
        if let Some(parent) = obj_abs.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BuildError::write(parent, e))?;
        }

        let env = job.target.env();
        let args = self.backend.object_args(ir_rel, obj_rel, env);
        let failed = match self.invoker.invoke(self.backend.driver(), &args, self.workspace) {
            Ok(out) if out.success() => None,
            Ok(out) => Some((out.status, out.stderr)),
            Err(e) => Some((None, e.to_string())),
        };
        if let Some((status, stderr)) = failed {
            tracing::warn!(unit = %job.unit.name, build = %job.target, "object compile failed");
            report.diagnostics.push(
                Diagnostic::error(
                    codes::OBJECT_COMPILE_FAILED,
                    format!("failed to compile {} for {}", job.unit.name, job.target),
                )
                .with_package(job.package.name.as_str())
                .with_file(slash(&job.unit.source))
                .with_data(DiagnosticData::ToolFailure(ToolFailure {
                    tool: self.backend.driver().to_string(),
                    args,
                    env: job.target.declared_env().map(|e| e.to_string()),
                    output: Some(slash(obj_rel)),
                    status,
                    stderr,
                })),
            );
            return Ok(None);
        }

        let bytes = std::fs::read(&obj_abs).map_err(|e| BuildError::read(&obj_abs, e))?;
        Ok(Some((ContentHash::from_bytes(&bytes), bytes.len() as u64)))
    }

    fn write_debug(
        &self,
        job: &CompileJob<'_>,
        ir: &UnitIr,
        ir_rel: &Path,
        report: &mut JobReport,
    ) -> Result<(), BuildError> {
        let package = job.package.name.as_str();
        let path = |kind| self.plan.debug_path(kind, job.target, package, job.unit);

        if let Some(ast) = &ir.ast {
            let mut json = serde_json::to_string_pretty(ast).map_err(|e| {
                BuildError::Serialization {
                    reason: e.to_string(),
                }
            })?;
            json.push('\n');
            let rel = path(DebugKind::Ast);
            write_artifact(self.workspace, &rel, json)?;
            report.debug.push((DebugKind::Ast, rel));
        }

        let rel = path(DebugKind::Ir);
        write_artifact(self.workspace, &rel, &ir.ir)?;
        report.debug.push((DebugKind::Ir, rel));

        let asm = path(DebugKind::Asm);
        let asm_abs = self.workspace.join(&asm);
        if let Some(parent) = asm_abs.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BuildError::write(parent, e))?;
        }
        let args = self.backend.assembly_args(ir_rel, &asm, job.target.env());
        match self.invoker.invoke(self.backend.driver(), &args, self.workspace) {
            Ok(out) if out.success() => report.debug.push((DebugKind::Asm, asm)),
            Ok(out) => {
                tracing::warn!(unit = %job.unit.name, status = ?out.status, stderr = %out.stderr,
                    "assembly listing failed");
            }
            Err(e) => tracing::warn!(unit = %job.unit.name, error = %e, "assembly listing failed"),
        }
        Ok(())
    }

    fn write_indices(&self, execution: &mut Execution) -> Result<(), BuildError> {
        for target in &self.plan.targets {
            for package in &self.plan.packages {
                let entries = execution
                    .reports
                    .iter()
                    .filter(|r| &r.target == target && r.package == package.name)
                    .filter_map(|r| r.entry.clone())
                    .collect();
                let index = ObjectIndex::new(
                    package.name.clone(),
                    target.declared_env().map(|e| e.to_string()),
                    self.plan.backend.clone(),
                    entries,
                );
                let rel = self.plan.index_path(target, &package.name);
                index.save(self.workspace, &rel)?;
                execution.indices.entry(target.clone()).or_default().push(rel);
            }
        }
        Ok(())
    }
}
