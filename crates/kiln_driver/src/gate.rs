//! Checks shared by the driver commands.
//!
//! Each gate reports its own failures on the stream and returns [`Halt`]
//! when the command must stop.

use crate::context::BuildContext;
use crate::ports::Ports;
use kiln_config::{ResolvedToolchain, WorkspaceConfig, WORKSPACE_FILE};
use kiln_diagnostics::data::MissingRoot;
use kiln_diagnostics::{codes, Diagnostic};
use kiln_integrity::{AuditReport, IntegrityError, LockFile, PackageCache, LOCK_FILE};

/// The command stopped; the reason is already on the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Halt;

pub(crate) type Gate<T> = Result<T, Halt>;

/// Loads `kiln.toml` and resolves its toolchain.
pub(crate) fn load_workspace(ctx: &BuildContext) -> Gate<(WorkspaceConfig, ResolvedToolchain)> {
    let reject = |err: kiln_config::ConfigError| {
        let code = if err.is_io() {
            codes::FILESYSTEM_ACCESS
        } else {
            codes::WORKSPACE_SCHEMA
        };
        ctx.emit(Diagnostic::error(code, err.to_string()).with_file(WORKSPACE_FILE));
        Halt
    };
    let config = kiln_config::load_workspace(ctx.workspace()).map_err(reject)?;
    let toolchain = kiln_config::resolve_toolchain(&config).map_err(reject)?;
    tracing::debug!(
        packages = config.packages.len(),
        targets = toolchain.targets().len(),
        "loaded workspace"
    );
    Ok((config, toolchain))
}

/// Every declared package root must be an existing directory.
pub(crate) fn check_roots(ctx: &BuildContext, config: &WorkspaceConfig) -> Gate<()> {
    let mut missing = false;
    for decl in &config.packages {
        let root = kiln_common::normalize(std::path::Path::new(&decl.root));
        if ctx.workspace().join(&root).is_dir() {
            continue;
        }
        missing = true;
        ctx.emit(
            Diagnostic::error(
                codes::MISSING_PACKAGE_ROOT,
                format!("root '{}' of package '{}' does not exist", decl.root, decl.name),
            )
            .with_package(decl.name.as_str())
            .with_file(WORKSPACE_FILE)
            .with_data(MissingRoot {
                package: decl.name.clone(),
                root: decl.root.clone(),
            }),
        );
    }
    if missing {
        Err(Halt)
    } else {
        Ok(())
    }
}

/// Reads `kiln.lock`; `None` when there is none.
pub(crate) fn load_lock(ctx: &BuildContext) -> Gate<Option<LockFile>> {
    LockFile::load(&ctx.workspace().join(LOCK_FILE)).map_err(|err| {
        let code = match err {
            IntegrityError::LockParse { .. } => codes::LOCK_UNREADABLE,
            _ => codes::FILESYSTEM_ACCESS,
        };
        ctx.emit(
            Diagnostic::error(code, format!("lock file unreadable: {err}")).with_file(LOCK_FILE),
        );
        Halt
    })
}

/// The package cache the ports name, or the environment's.
pub(crate) fn open_cache(ctx: &BuildContext, ports: &Ports) -> Gate<PackageCache> {
    if let Some(cache) = &ports.cache {
        return Ok(cache.clone());
    }
    PackageCache::from_env().map_err(|err| {
        ctx.emit(Diagnostic::error(codes::FILESYSTEM_ACCESS, err.to_string()));
        Halt
    })
}

/// Audits dependencies and local imports, emitting every finding.
pub(crate) fn audit(
    ctx: &BuildContext,
    config: &WorkspaceConfig,
    lock: Option<&LockFile>,
    cache: &PackageCache,
) -> Gate<AuditReport> {
    let report = kiln_integrity::audit_with_lock(ctx.workspace(), config, lock, cache)
        .map_err(|err| {
            ctx.emit(Diagnostic::error(codes::FILESYSTEM_ACCESS, err.to_string()));
            Halt
        })?;
    tracing::info!(
        requirements = report.requirements.len(),
        verified = report.verified.len(),
        clean = report.is_clean(),
        "audited dependencies"
    );
    ctx.stream().emit_all(report.diagnostics());
    Ok(report)
}
