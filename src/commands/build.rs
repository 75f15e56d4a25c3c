//! Build command - runs the pipeline.

use crate::config::Config;
use crate::context::BuildContext;
use crate::error::Result;
use crate::pipeline::{self, BuildReport};
use crate::timing::format_duration;

/// Execute the build command.
pub fn cmd_build(ctx: &BuildContext, config: &Config) -> Result<BuildReport> {
    let report = pipeline::run(ctx, &config.source, &config.artifact)?;

    if report.already_built {
        println!("{} is up to date.", report.image.display());
    } else {
        println!();
        println!("=== Build Complete ===");
        println!("  Image:     {}", report.image.display());
        if let Some(label) = &report.volume_label {
            println!("  Volume id: {}", label);
        }
        println!("  Artifact:  {}", config.artifact);
        println!("  Time:      {}", format_duration(report.elapsed));
        println!();
        println!("Write it to a USB stick or boot it as a CD/DVD (BIOS or UEFI).");
    }
    Ok(report)
}
