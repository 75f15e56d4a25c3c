//! ISO authoring.
//!
//! Re-authors the modified tree as an ISO-9660 image with two El Torito
//! entries: the isolinux BIOS entry and an alternative entry for the UEFI
//! boot image. The volume id is copied from the base image because the
//! bootloaders locate their root by label.

use std::fs;
use std::path::Path;
use tracing::info;

use crate::context::BuildContext;
use crate::error::{PipelineError, Result};
use crate::extract::ExtractedTree;
use crate::process::Cmd;
use crate::workspace::{discard_partial, partial_path};

/// BIOS boot image, relative to the tree.
pub const BIOS_BOOT_IMAGE: &str = "isolinux/isolinux.bin";
/// Boot catalog written by the authoring tool, relative to the tree.
pub const BOOT_CATALOG: &str = "isolinux/boot.cat";
/// UEFI boot image (FAT filesystem), relative to the tree.
pub const UEFI_BOOT_IMAGE: &str = "images/efiboot.img";
/// isolinux loads 4 virtual sectors regardless of the file's size.
pub const BIOS_BOOT_LOAD_SIZE: u64 = 4;
/// El Torito load sizes for the UEFI entry are counted in 2048-byte sectors.
pub const SECTOR_SIZE: u64 = 2048;

/// Boot-loader values derived from the current tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootMetadata {
    /// Size of the UEFI boot image in bytes.
    pub efi_image_size: u64,
    /// Sectors needed to load the whole UEFI boot image.
    pub sector_count: u64,
}

impl BootMetadata {
    pub fn from_size(efi_image_size: u64) -> Self {
        Self {
            efi_image_size,
            sector_count: sector_count(efi_image_size),
        }
    }

    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        Ok(Self::from_size(fs::metadata(path)?.len()))
    }
}

/// Number of 2048-byte sectors covering `size` bytes.
pub fn sector_count(size: u64) -> u64 {
    size.div_ceil(SECTOR_SIZE)
}

/// Arguments for `xorriso` to author `tree` into `output`.
pub fn authoring_args(
    output: &Path,
    volume_label: &str,
    boot: &BootMetadata,
    tree: &Path,
) -> Vec<String> {
    let mut args: Vec<String> = ["-as", "mkisofs", "-o"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    args.push(output.to_string_lossy().into_owned());
    args.extend(
        [
            // Joliet + Rock Ridge
            "-J",
            "-R",
            "-V",
            volume_label,
            // BIOS entry
            "-b",
            BIOS_BOOT_IMAGE,
            "-c",
            BOOT_CATALOG,
            "-no-emul-boot",
            "-boot-load-size",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args.push(BIOS_BOOT_LOAD_SIZE.to_string());
    args.extend(
        [
            "-boot-info-table",
            // UEFI entry
            "-eltorito-alt-boot",
            "-e",
            UEFI_BOOT_IMAGE,
            "-no-emul-boot",
            "-boot-load-size",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args.push(boot.sector_count.to_string());
    args.push(tree.to_string_lossy().into_owned());
    args
}

/// Author `output` from `tree` unless it already exists.
pub fn assemble(
    ctx: &BuildContext,
    tree: &ExtractedTree,
    output: &Path,
    volume_label: &str,
) -> Result<()> {
    if output.exists() {
        info!("Image already assembled at {}", output.display());
        return Ok(());
    }

    let efi_image = tree.path.join(UEFI_BOOT_IMAGE);
    if !efi_image.is_file() {
        return Err(PipelineError::MissingBootImage {
            path: efi_image,
            workspace: ctx.workspace.ove_dir(),
        });
    }

    let boot = BootMetadata::from_file(&efi_image)?;
    info!(
        "UEFI boot image: {} bytes ({} sectors)",
        boot.efi_image_size, boot.sector_count
    );

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    let partial = partial_path(output);
    discard_partial(&partial)?;

    info!("Authoring {} (volume id '{}')", output.display(), volume_label);
    let result = Cmd::new(&ctx.tools.xorriso)
        .args(authoring_args(&partial, volume_label, &boot, &tree.path))
        .error_msg("xorriso failed")
        .run();

    if let Err(e) = result {
        let _ = fs::remove_file(&partial);
        return Err(PipelineError::AssemblyFailed(format!("{:#}", e)));
    }
    if !partial.is_file() {
        return Err(PipelineError::AssemblyFailed(format!(
            "xorriso reported success but wrote no image at {}",
            partial.display()
        )));
    }

    fs::rename(&partial, output).map_err(|e| {
        let _ = fs::remove_file(&partial);
        PipelineError::AssemblyFailed(format!(
            "could not move image into place at {}: {}",
            output.display(),
            e
        ))
    })?;

    Ok(())
}
