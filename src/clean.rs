//! Working space cleanup.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::context::BuildContext;
use crate::process::Cmd;
use crate::workspace::partial_path;

/// What to remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanTarget {
    /// Scratch area and working tree (forces re-extraction).
    Work,
    /// Assembled and relocated images (forces re-assembly).
    Output,
    /// Everything, including the cached base image.
    All,
}

/// Remove a directory tree that may contain read-only or root-owned entries.
///
/// Tries a plain removal first, then makes the tree writable, then falls back
/// to a privileged `rm -rf`.
pub fn remove_tree(ctx: &BuildContext, path: &Path) -> Result<()> {
    if fs::symlink_metadata(path).is_err() {
        return Ok(());
    }

    match fs::remove_dir_all(path) {
        Ok(()) => return Ok(()),
        Err(e) => debug!("remove_dir_all({}) failed: {}", path.display(), e),
    }

    // Directories extracted from an ISO are read-only.
    Cmd::new(&ctx.tools.chmod)
        .args(["-R", "u+w"])
        .arg_path(path)
        .allow_fail()
        .run()?;
    if fs::remove_dir_all(path).is_ok() {
        return Ok(());
    }

    let cmd = Cmd::new(&ctx.tools.rm)
        .arg("-rf")
        .arg_path(path)
        .error_msg(format!("Failed to remove {}", path.display()));
    ctx.privileged.elevate(cmd).run()?;
    Ok(())
}

fn remove_file(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    info!("Removing {}...", path.display());
    fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    Ok(true)
}

fn remove_dir(ctx: &BuildContext, path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    info!("Removing {}...", path.display());
    remove_tree(ctx, path)?;
    Ok(true)
}

/// Clean the working space.
pub fn cmd_clean(ctx: &BuildContext, target: CleanTarget) -> Result<()> {
    let ws = &ctx.workspace;
    let mut cleaned = false;

    if matches!(target, CleanTarget::Work | CleanTarget::All) {
        let scratch = ws.scratch_dir();
        ctx.strategy
            .release(ctx, &scratch)
            .context("Scratch area is still in use")?;
        cleaned |= remove_dir(ctx, &scratch)?;
        cleaned |= remove_dir(ctx, &ws.tree_dir())?;
    }

    if matches!(target, CleanTarget::Output | CleanTarget::All) {
        cleaned |= remove_dir(ctx, &ws.output_dir())?;
        cleaned |= remove_file(&ws.final_image())?;
    }

    if target == CleanTarget::All {
        cleaned |= remove_dir(ctx, &ws.ove_dir())?;
        cleaned |= remove_file(&ws.base_image())?;
        cleaned |= remove_file(&partial_path(&ws.base_image()))?;
    }

    if cleaned {
        info!("Clean complete.");
    } else {
        info!("Nothing to clean.");
    }
    Ok(())
}
