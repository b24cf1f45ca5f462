//! `kiln audit`.

use kiln_driver::{BuildContext, Ports};

use crate::workspace::resolve_workspace;
use crate::GlobalArgs;

/// Audits the workspace and returns the process exit code.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let workspace = resolve_workspace(global.workspace.as_deref())?;
    let ctx = BuildContext::new(&workspace, global.stream());
    let report = kiln_driver::audit(&ctx, &Ports::process());
    let exit = ctx.finish()?;

    if let Some(report) = report.filter(|_| global.prints_summary()) {
        println!(
            "{} requirement(s): {} verified, {} missing, {} mismatched",
            report.requirements.len(),
            report.verified.len(),
            report.missing_in_sum.len()
                + report.unsatisfied.len()
                + report.missing_in_cache.len(),
            report.mismatched.len()
        );
    }
    Ok(exit.code())
}
