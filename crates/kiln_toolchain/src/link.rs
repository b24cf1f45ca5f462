//! The linker orchestrator.
//!
//! One [`LinkJob`] per build target. Jobs are independent: a failing target
//! is reported with the backend's complete stderr and does not stop the
//! others.

use crate::backend::Backend;
use crate::error::ToolError;
use crate::tool::ToolInvoker;
use kiln_common::{Env, Target};
use kiln_diagnostics::data::ToolFailure;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::Dispatch;

/// The objects of one target and the binary to produce from them.
///
/// Paths are relative to the workspace directory, which is also the
/// backend's working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkJob {
    /// The build target.
    pub target: Target,
    /// Objects of every package, in plan order.
    pub objects: Vec<PathBuf>,
    /// The binary to write.
    pub output: PathBuf,
}

/// What happened to one link job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The binary was written.
    Linked {
        /// Workspace-relative binary path.
        binary: PathBuf,
    },
    /// Linking was not attempted.
    Skipped {
        /// Why.
        reason: String,
    },
    /// The backend failed.
    Failed(ToolFailure),
}

impl LinkOutcome {
    /// Returns `true` if linking was attempted.
    pub fn attempted(&self) -> bool {
        !matches!(self, LinkOutcome::Skipped { .. })
    }
}

/// Runs link jobs through the backend.
pub struct Linker<'a> {
    invoker: &'a dyn ToolInvoker,
    backend: Backend,
    workspace: PathBuf,
    options: Vec<String>,
    disabled: BTreeSet<Env>,
    no_link: bool,
    jobs: Option<usize>,
    dispatch: Option<Dispatch>,
}

impl<'a> Linker<'a> {
    /// Creates a linker running `backend` in `workspace`.
    pub fn new(invoker: &'a dyn ToolInvoker, backend: Backend, workspace: &Path) -> Self {
        Self {
            invoker,
            backend,
            workspace: workspace.to_path_buf(),
            options: Vec::new(),
            disabled: BTreeSet::new(),
            no_link: false,
            jobs: None,
            dispatch: None,
        }
    }

    /// Sets the workspace link options.
    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = options;
        self
    }

    /// Sets the environments excluded from linking.
    pub fn with_disabled(mut self, disabled: BTreeSet<Env>) -> Self {
        self.disabled = disabled;
        self
    }

    /// Skips every job.
    pub fn with_no_link(mut self, no_link: bool) -> Self {
        self.no_link = no_link;
        self
    }

    /// Bounds concurrent backend invocations; `None` uses one per core.
    pub fn with_jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs;
        self
    }

    /// Logs through `dispatch` inside worker threads.
    pub fn with_dispatch(mut self, dispatch: Option<Dispatch>) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Links one target.
    ///
    /// Only failing to create the output directory is an error; backend
    /// failures are returned as [`LinkOutcome::Failed`].
    pub fn link(&self, job: &LinkJob) -> Result<LinkOutcome, ToolError> {
        if self.no_link {
            return Ok(LinkOutcome::Skipped {
                reason: "linking disabled by --no-link".to_string(),
            });
        }
        if let Some(env) = job.target.declared_env().filter(|e| self.disabled.contains(*e)) {
            return Ok(LinkOutcome::Skipped {
                reason: format!("linking disabled for {env}"),
            });
        }
        if job.objects.is_empty() {
            return Ok(LinkOutcome::Skipped {
                reason: "no objects to link".to_string(),
            });
        }

        if let Some(parent) = job.output.parent() {
            let dir = self.workspace.join(parent);
            std::fs::create_dir_all(&dir).map_err(|source| ToolError::Io { path: dir, source })?;
        }

        let env = job.target.env();
        let args = self
            .backend
            .link_args(&job.objects, &job.output, env, &self.options);
        tracing::info!(build = %job.target, objects = job.objects.len(), "linking");

        let failure = |status: Option<i32>, stderr: String| {
            LinkOutcome::Failed(ToolFailure {
                tool: self.backend.driver().to_string(),
                args: args.clone(),
                env: job.target.declared_env().map(|e| e.to_string()),
                output: Some(job.output.to_string_lossy().into_owned()),
                status,
                stderr,
            })
        };

        match self.invoker.invoke(self.backend.driver(), &args, &self.workspace) {
            Ok(out) if out.success() => Ok(LinkOutcome::Linked {
                binary: job.output.clone(),
            }),
            Ok(out) => {
                tracing::warn!(build = %job.target, status = ?out.status, "link failed");
                Ok(failure(out.status, out.stderr))
            }
            Err(e) => {
                tracing::warn!(build = %job.target, error = %e, "backend could not be started");
                Ok(failure(None, e.to_string()))
            }
        }
    }

    /// Links every job on a pool of at most `jobs` workers. Results are in job order.
    pub fn link_all(&self, jobs: &[LinkJob]) -> Vec<Result<LinkOutcome, ToolError>> {
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs.unwrap_or(0))
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                let reason = e.to_string();
                return jobs.iter().map(|_| Err(ToolError::Pool(reason.clone()))).collect();
            }
        };
        pool.install(|| {
            jobs.par_iter()
                .map(|job| match &self.dispatch {
                    Some(dispatch) => {
                        tracing::dispatcher::with_default(dispatch, || self.link(job))
                    }
                    None => self.link(job),
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ToolOutput;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records invocations; fails any link whose output mentions `fail_on`.
    #[derive(Default)]
    struct FakeInvoker {
        calls: Mutex<Vec<Vec<String>>>,
        fail_on: Option<String>,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ToolInvoker for FakeInvoker {
        fn invoke(
            &self,
            _program: &str,
            args: &[String],
            cwd: &Path,
        ) -> Result<ToolOutput, ToolError> {
            self.calls.lock().unwrap().push(args.to_vec());
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
            self.active.fetch_sub(1, Ordering::SeqCst);
            let output = args.iter().skip_while(|a| *a != "-o").nth(1).unwrap();
            if self.fail_on.as_deref().is_some_and(|f| output.contains(f)) {
                return Ok(ToolOutput {
                    status: Some(1),
                    stdout: String::new(),
                    stderr: "ld: symbol(s) not found\n".repeat(200),
                });
            }
            std::fs::write(cwd.join(output), b"bin").unwrap();
            Ok(ToolOutput {
                status: Some(0),
                ..Default::default()
            })
        }
    }

    fn job(target: Target, output: &str) -> LinkJob {
        LinkJob {
            target,
            objects: vec![PathBuf::from("build/obj/app/main.o")],
            output: PathBuf::from(output),
        }
    }

    #[test]
    fn links_and_creates_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let invoker = FakeInvoker::default();
        let linker = Linker::new(&invoker, Backend::new("clang"), dir.path());
        let env = Env::new("linux", "amd64");
        let outcome = linker
            .link(&job(Target::Env(env), "build/linux/amd64/app"))
            .unwrap();
        assert_eq!(
            outcome,
            LinkOutcome::Linked {
                binary: PathBuf::from("build/linux/amd64/app")
            }
        );
        assert!(dir.path().join("build/linux/amd64/app").exists());
    }

    #[test]
    fn disabled_and_no_link_skip() {
        let dir = tempfile::tempdir().unwrap();
        let invoker = FakeInvoker::default();
        let env = Env::new("windows", "amd64");
        let linker = Linker::new(&invoker, Backend::new("clang"), dir.path())
            .with_disabled([env.clone()].into_iter().collect());
        let outcome = linker.link(&job(Target::Env(env), "build/windows/amd64/app")).unwrap();
        assert!(!outcome.attempted());

        let linker = Linker::new(&invoker, Backend::new("clang"), dir.path()).with_no_link(true);
        assert!(!linker.link(&job(Target::host(), "build/app")).unwrap().attempted());
        assert!(invoker.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn failure_keeps_full_stderr_and_others_proceed() {
        let dir = tempfile::tempdir().unwrap();
        let invoker = FakeInvoker {
            fail_on: Some("darwin".into()),
            ..Default::default()
        };
        let linker = Linker::new(&invoker, Backend::new("clang"), dir.path())
            .with_options(vec!["PIE".into()]);
        let jobs = vec![
            job(Target::Env(Env::new("darwin", "arm64")), "build/darwin/arm64/app"),
            job(Target::Env(Env::new("linux", "amd64")), "build/linux/amd64/app"),
        ];
        let results = linker.link_all(&jobs);
        match results[0].as_ref().unwrap() {
            LinkOutcome::Failed(failure) => {
                assert_eq!(failure.stderr, "ld: symbol(s) not found\n".repeat(200));
                assert_eq!(failure.status, Some(1));
                assert_eq!(failure.env.as_deref(), Some("darwin/arm64"));
                assert!(failure.args.contains(&"-Wl,-pie".to_string()));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(matches!(results[1], Ok(LinkOutcome::Linked { .. })));
    }

    #[test]
    fn no_objects_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let invoker = FakeInvoker::default();
        let linker = Linker::new(&invoker, Backend::new("clang"), dir.path());
        let mut empty = job(Target::host(), "build/app");
        empty.objects.clear();
        assert!(matches!(
            linker.link(&empty).unwrap(),
            LinkOutcome::Skipped { .. }
        ));
    }

    #[test]
    fn jobs_bound_concurrent_links() {
        let dir = tempfile::tempdir().unwrap();
        let invoker = FakeInvoker::default();
        let linker = Linker::new(&invoker, Backend::new("clang"), dir.path()).with_jobs(Some(1));
        let jobs: Vec<LinkJob> = ["linux", "darwin", "windows", "freebsd"]
            .into_iter()
            .map(|os| {
                let env = Env::new(os, "amd64");
                job(Target::Env(env), &format!("build/{os}/amd64/app"))
            })
            .collect();
        let results = linker.link_all(&jobs);
        assert_eq!(results.len(), 4);
        for (job, result) in jobs.iter().zip(&results) {
            assert_eq!(
                result.as_ref().unwrap(),
                &LinkOutcome::Linked {
                    binary: job.output.clone()
                }
            );
        }
        assert_eq!(invoker.peak.load(Ordering::SeqCst), 1);
    }
}
