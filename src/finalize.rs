//! Hybrid MBR patching, output relocation and workspace pruning.
//!
//! The authored image only boots through El Torito. `isohybrid --uefi`
//! writes an MBR (and an EFI system partition entry) so the same file also
//! boots when written raw to a USB stick or disk.

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::info;

use crate::clean::remove_tree;
use crate::context::BuildContext;
use crate::error::{PipelineError, Result};
use crate::process::Cmd;
use crate::timing::Timer;

/// Patch `output_image` in place and report the build's elapsed time.
pub fn finalize(ctx: &BuildContext, output_image: &Path, started: Instant) -> Result<Duration> {
    info!("Patching hybrid MBR into {}", output_image.display());
    Cmd::new(&ctx.tools.isohybrid)
        .arg("--uefi")
        .arg_path(output_image)
        .error_msg("isohybrid failed")
        .run()
        .map_err(|e| PipelineError::FinalizationFailed(format!("{:#}", e)))?;

    Ok(Timer::since("Build", started).finish())
}

/// Move the finished image to its final location.
pub fn relocate(output_image: &Path, destination: &Path) -> Result<()> {
    fs::rename(output_image, destination).map_err(|e| {
        PipelineError::FinalizationFailed(format!(
            "could not move {} to {}: {}",
            output_image.display(),
            destination.display(),
            e
        ))
    })?;
    info!("Image available at {}", destination.display());
    Ok(())
}

/// Delete the working tree and the scratch area to bound disk usage.
///
/// With direct extraction the scratch area is a full unpacked copy of the
/// ISO; with a loop mount it is an empty mount point once released.
pub fn prune(ctx: &BuildContext) -> Result<()> {
    let ws = &ctx.workspace;
    let scratch = ws.scratch_dir();
    let failed = |path: &Path, e: anyhow::Error| {
        PipelineError::FinalizationFailed(format!(
            "could not remove {}: {:#}\n\
             The image is already at {}. Run 'ove-builder clean work' to \
             reclaim the space.",
            path.display(),
            e,
            ws.final_image().display()
        ))
    };

    ctx.strategy
        .release(ctx, &scratch)
        .map_err(|e| failed(&scratch, e))?;

    for dir in [ws.tree_dir(), scratch] {
        info!("Removing {}", dir.display());
        remove_tree(ctx, &dir).map_err(|e| failed(&dir, e))?;
    }
    Ok(())
}
