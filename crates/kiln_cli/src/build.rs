//! `kiln build`.

use kiln_driver::{BuildContext, BuildOptions, Ports};

use crate::workspace::resolve_workspace;
use crate::{BuildArgs, GlobalArgs};

/// Runs a build and returns the process exit code.
pub fn run(args: &BuildArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let workspace = resolve_workspace(global.workspace.as_deref())?;
    let options = BuildOptions {
        verbose: global.verbose,
        no_link: args.no_link,
        emit_ir_only: args.emit_ir_only,
        backend: args.backend.clone(),
        jobs: args.jobs,
        no_link_envs: args.no_link_env.clone(),
    };

    let mut ctx = BuildContext::new(&workspace, global.stream());
    let outcome = kiln_driver::build(&mut ctx, &options, &Ports::process());
    let exit = ctx.finish()?;

    if global.prints_summary() {
        if let Some(summary) = outcome.summary {
            let binaries = summary.binaries.len()
                + summary.binaries_by_env.values().map(Vec::len).sum::<usize>();
            println!(
                "built {} target(s), {binaries} binary(ies); manifest at {}",
                summary.targets.len(),
                summary.manifest
            );
        }
    }
    Ok(exit.code())
}
