//! Preflight checks.
//!
//! Verifies every collaborator the pipeline shells out to is installed and
//! the working space is usable, before any stage runs.

mod environment;
mod host_tools;
mod types;

use anyhow::{bail, Result};

use crate::context::BuildContext;

pub use types::{CheckResult, CheckStatus, PreflightReport};

/// Run all preflight checks.
pub fn run_preflight(ctx: &BuildContext) -> PreflightReport {
    let loop_mount = !ctx.workspace.is_host_root();
    let needs_sudo = !ctx.invoker.is_root();

    tracing::info!("Running preflight checks...");
    let mut checks = host_tools::check_host_tools(&ctx.tools, loop_mount, needs_sudo);
    checks.extend(environment::check_build_environment(ctx, loop_mount));

    PreflightReport { checks }
}

/// Execute the preflight command.
pub fn cmd_preflight(ctx: &BuildContext, strict: bool) -> Result<()> {
    let report = run_preflight(ctx);
    report.print();

    if !report.all_passed() {
        if strict {
            bail!(
                "Preflight failed: {} check(s) failed. Fix the issues above before building.",
                report.fail_count()
            );
        }
        println!("Some checks failed. Use --strict to fail on them.");
    }
    Ok(())
}
