//! The `audit` command: the dependency gate of a build, on its own.

use crate::context::BuildContext;
use crate::gate::{self, Gate};
use crate::ports::Ports;
use kiln_diagnostics::{codes, Diagnostic};
use kiln_integrity::AuditReport;

/// Audits the context's workspace without building it.
///
/// Returns the report when the audit could run at all. A clean audit is
/// confirmed with an `I903` record carrying the integrity sets.
pub fn audit(ctx: &BuildContext, ports: &Ports) -> Option<AuditReport> {
    run(ctx, ports).ok()
}

fn run(ctx: &BuildContext, ports: &Ports) -> Gate<AuditReport> {
    let (config, _) = gate::load_workspace(ctx)?;
    let lock = gate::load_lock(ctx)?;
    let cache = gate::open_cache(ctx, ports)?;
    let report = gate::audit(ctx, &config, lock.as_ref(), &cache)?;
    if report.is_clean() {
        ctx.emit(
            Diagnostic::info(
                codes::AUDIT_CLEAN,
                format!(
                    "{} requirement(s) verified against the lock file",
                    report.verified.len()
                ),
            )
            .with_data(report.summary()),
        );
    }
    Ok(report)
}
