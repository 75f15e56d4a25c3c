//! Base image extraction.
//!
//! Two idempotent steps turn the base ISO into a writable tree:
//!
//! 1. **Scratch staging** - expose the ISO contents at `ove/isomnt`, either
//!    by loop-mounting it or by extracting it with `osirrox`.
//! 2. **Tree materialization** - copy the scratch contents into `ove/work`,
//!    hand ownership to the invoking user and make it writable.
//!
//! Each step is skipped when its directory is already populated, and a
//! populated tree skips staging altogether, so a resumed build never mounts
//! the ISO again. The volume
//! label is read from the ISO's table of contents on every run; the
//! assembler needs it verbatim.

use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::clean::remove_tree;
use crate::context::BuildContext;
use crate::download::ImageSource;
use crate::error::{PipelineError, Result};
use crate::process::Cmd;
use crate::workspace::{StageState, WorkingSpace};

/// The immutable source image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseImage {
    pub path: PathBuf,
    /// ISO-9660 volume id, reused for the authored image.
    pub volume_label: String,
}

/// Writable copy of the base image's filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedTree {
    pub path: PathBuf,
}

/// Result of a successful extraction.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub base: BaseImage,
    pub tree: ExtractedTree,
}

/// How the ISO contents are exposed in the scratch directory.
pub trait ExtractionStrategy {
    /// Name for logs.
    fn name(&self) -> &'static str;

    /// Populate `scratch` (an existing, empty directory) from `iso`.
    fn populate(&self, ctx: &BuildContext, iso: &Path, scratch: &Path) -> anyhow::Result<()>;

    /// Undo whatever `populate` holds open. Must be safe to call repeatedly.
    fn release(&self, ctx: &BuildContext, scratch: &Path) -> anyhow::Result<()>;
}

/// Loop-mount the ISO read-only on the scratch directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoopMount;

impl LoopMount {
    fn is_mounted(ctx: &BuildContext, scratch: &Path) -> bool {
        Cmd::new(&ctx.tools.mountpoint)
            .arg("-q")
            .arg_path(scratch)
            .allow_fail()
            .run()
            .map(|r| r.success())
            .unwrap_or(false)
    }
}

impl ExtractionStrategy for LoopMount {
    fn name(&self) -> &'static str {
        "loop mount"
    }

    fn populate(&self, ctx: &BuildContext, iso: &Path, scratch: &Path) -> anyhow::Result<()> {
        let cmd = Cmd::new(&ctx.tools.mount)
            .args(["-o", "loop,ro"])
            .arg_path(iso)
            .arg_path(scratch)
            .error_msg("Loop-mounting the base image failed");
        ctx.privileged.elevate(cmd).run()?;
        Ok(())
    }

    fn release(&self, ctx: &BuildContext, scratch: &Path) -> anyhow::Result<()> {
        if !Self::is_mounted(ctx, scratch) {
            return Ok(());
        }
        info!("Unmounting {}", scratch.display());
        let cmd = Cmd::new(&ctx.tools.umount)
            .arg_path(scratch)
            .error_msg("Unmounting the base image failed");
        ctx.privileged.elevate(cmd).run()?;
        Ok(())
    }
}

/// Read the ISO's file tree directly, without kernel mount privileges.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectExtract;

impl ExtractionStrategy for DirectExtract {
    fn name(&self) -> &'static str {
        "direct extraction (osirrox)"
    }

    fn populate(&self, ctx: &BuildContext, iso: &Path, scratch: &Path) -> anyhow::Result<()> {
        Cmd::new(&ctx.tools.osirrox)
            .arg("-indev")
            .arg_path(iso)
            .args(["-extract", "/"])
            .arg_path(scratch)
            .error_msg("Extracting the base image with osirrox failed")
            .run()?;
        Ok(())
    }

    fn release(&self, _ctx: &BuildContext, _scratch: &Path) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Direct extraction when the working space is `/`, loop mount otherwise.
pub fn select_strategy(workspace: &WorkingSpace) -> Box<dyn ExtractionStrategy> {
    if workspace.is_host_root() {
        Box::new(DirectExtract)
    } else {
        Box::new(LoopMount)
    }
}

/// Produce the writable tree and discover the base image's volume label.
pub fn extract(ctx: &BuildContext, source: &ImageSource) -> Result<Extraction> {
    let ws = &ctx.workspace;
    let iso = ws.base_image();
    let scratch = ws.scratch_dir();
    let tree = ws.tree_dir();

    if StageState::of_dir(&tree).is_complete() {
        // The scratch area only feeds the tree; nothing to stage or mount.
        info!("Working tree already exists at {}", tree.display());
    } else {
        stage_scratch(ctx, source, &iso, &scratch)?;

        info!("Copying {} to {}", scratch.display(), tree.display());
        if let Err(e) = materialize_tree(ctx, &scratch, &tree) {
            if let Err(cleanup) = remove_tree(ctx, &tree) {
                warn!("Could not remove partial tree {}: {:#}", tree.display(), cleanup);
            }
            return Err(PipelineError::ExtractionFailed {
                step: "copying the working tree",
                reason: format!("{:#}", e),
            });
        }
    }

    // Also catches a mount left behind by an interrupted run.
    ctx.strategy
        .release(ctx, &scratch)
        .map_err(|e| PipelineError::ExtractionFailed {
            step: "releasing the scratch area",
            reason: format!("{:#}", e),
        })?;

    let volume_label = read_volume_label(ctx, &iso)?;
    info!("Base image volume label: {}", volume_label);

    Ok(Extraction {
        base: BaseImage {
            path: iso,
            volume_label,
        },
        tree: ExtractedTree { path: tree },
    })
}

/// Step 1: expose the ISO contents in the scratch area unless already there.
fn stage_scratch(ctx: &BuildContext, source: &ImageSource, iso: &Path, scratch: &Path) -> Result<()> {
    if StageState::of_dir(scratch).is_complete() {
        info!("Scratch area already populated at {}", scratch.display());
        return Ok(());
    }

    fs::create_dir_all(scratch)?;
    source.ensure(iso)?;

    info!(
        "Staging {} into {} ({})",
        iso.display(),
        scratch.display(),
        ctx.strategy.name()
    );
    if let Err(e) = ctx.strategy.populate(ctx, iso, scratch) {
        discard_scratch(ctx, scratch);
        return Err(PipelineError::ExtractionFailed {
            step: "staging the scratch area",
            reason: format!("{:#}", e),
        });
    }
    Ok(())
}

fn materialize_tree(ctx: &BuildContext, scratch: &Path, tree: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(tree).with_context(|| format!("Failed to create {}", tree.display()))?;

    // `<scratch>/.` copies the contents, including dotfiles, not the directory.
    let cmd = Cmd::new(&ctx.tools.cp)
        .arg("-a")
        .arg(format!("{}/.", scratch.display()))
        .arg_path(tree)
        .error_msg("Copying the base image tree failed");
    ctx.privileged.elevate(cmd).run()?;

    let cmd = Cmd::new(&ctx.tools.chown)
        .arg("-R")
        .arg(ctx.invoker.owner_spec())
        .arg_path(tree)
        .error_msg("Normalizing ownership of the working tree failed");
    ctx.privileged.elevate(cmd).run()?;

    // ISO contents are read-only; injection needs to write into the tree.
    Cmd::new(&ctx.tools.chmod)
        .args(["-R", "u+w"])
        .arg_path(tree)
        .error_msg("Making the working tree writable failed")
        .run()?;

    Ok(())
}

/// Best-effort removal of a scratch area whose population failed.
fn discard_scratch(ctx: &BuildContext, scratch: &Path) {
    if let Err(e) = ctx.strategy.release(ctx, scratch) {
        warn!("Could not release {}: {:#}", scratch.display(), e);
        return;
    }
    if let Err(e) = remove_tree(ctx, scratch) {
        warn!("Could not remove {}: {:#}", scratch.display(), e);
    }
}

/// Query the ISO's session table of contents for its volume id.
pub fn read_volume_label(ctx: &BuildContext, iso: &Path) -> Result<String> {
    let missing = |reason: String| PipelineError::VolumeLabelMissing {
        path: iso.to_path_buf(),
        reason,
    };

    let result = Cmd::new(&ctx.tools.xorriso)
        .arg("-indev")
        .arg_path(iso)
        .arg("-toc")
        .error_msg("Reading the table of contents failed")
        .run()
        .map_err(|e| missing(format!("{:#}", e)))?;

    // xorriso prints result lines on stdout and notes on stderr; accept either.
    parse_volume_label(&result.stdout)
        .or_else(|| parse_volume_label(&result.stderr))
        .ok_or_else(|| missing("no 'Volume id' in the table of contents".to_string()))
}

/// Parse the volume id out of `xorriso -toc` output.
///
/// ```text
/// Volume id    : 'rhcos-418.94.202501221327-0'
/// ```
pub fn parse_volume_label(toc: &str) -> Option<String> {
    toc.lines()
        .filter_map(|line| line.trim().strip_prefix("Volume id"))
        .filter_map(|rest| rest.split_once(':').map(|(_, value)| value.trim()))
        .map(|value| {
            value
                .strip_prefix('\'')
                .and_then(|v| v.strip_suffix('\''))
                .unwrap_or(value)
                .to_string()
        })
        .find(|label| !label.is_empty())
}
