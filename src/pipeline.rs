//! The build pipeline.
//!
//! Stages run in a fixed order and the first failure aborts the build:
//!
//! ```text
//! acquire -> extract -> inject -> assemble -> finalize
//! ```
//!
//! Every stage checks its own marker before doing work, so re-running after
//! a failure resumes where the previous run stopped. Nothing is retried.

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;

use crate::context::BuildContext;
use crate::download::ImageSource;
use crate::error::Result;
use crate::extract::extract;
use crate::finalize::{finalize, prune, relocate};
use crate::inject::{inject_artifact, ArtifactRef};
use crate::iso::assemble;
use crate::timing::Timer;
use crate::workspace::StageState;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Acquire,
    Extract,
    Inject,
    Assemble,
    Finalize,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Acquire,
        Stage::Extract,
        Stage::Inject,
        Stage::Assemble,
        Stage::Finalize,
    ];

    fn number(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).unwrap_or(0) + 1
    }

    fn announce(self) {
        info!("");
        info!("[{}/{}] {}", self.number(), Self::ALL.len(), self);
    }

    fn begin(self) -> Timer {
        self.announce();
        Timer::start(&self.to_string())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Acquire => "Acquire base image",
            Stage::Extract => "Extract base image",
            Stage::Inject => "Inject artifact",
            Stage::Assemble => "Assemble ISO",
            Stage::Finalize => "Finalize",
        };
        f.write_str(name)
    }
}

/// What a pipeline run produced.
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// Final image path.
    pub image: PathBuf,
    /// Volume id of the base image (None when the build was already done).
    pub volume_label: Option<String>,
    pub elapsed: Duration,
    /// True when the final image already existed and nothing ran.
    pub already_built: bool,
}

/// Run the whole pipeline against `ctx.workspace`.
pub fn run(ctx: &BuildContext, source: &ImageSource, artifact: &ArtifactRef) -> Result<BuildReport> {
    let started = Instant::now();
    let ws = &ctx.workspace;
    let final_image = ws.final_image();

    if StageState::of_file(&final_image).is_complete() {
        info!(
            "{} already exists; nothing to do. Run 'ove-builder clean output' to rebuild.",
            final_image.display()
        );
        return Ok(BuildReport {
            image: final_image,
            volume_label: None,
            elapsed: started.elapsed(),
            already_built: true,
        });
    }

    ws.create()?;
    ctx.log_environment();

    let t = Stage::Acquire.begin();
    source.ensure(&ws.base_image())?;
    t.finish();

    let t = Stage::Extract.begin();
    let extraction = extract(ctx, source)?;
    t.finish();

    let t = Stage::Inject.begin();
    inject_artifact(ctx, &extraction.tree, artifact)?;
    t.finish();

    let t = Stage::Assemble.begin();
    let output = ws.output_image();
    assemble(
        ctx,
        &extraction.tree,
        &output,
        &extraction.base.volume_label,
    )?;
    t.finish();

    // finalize() reports the whole build's duration itself.
    Stage::Finalize.announce();
    let elapsed = finalize(ctx, &output, started)?;
    relocate(&output, &final_image)?;
    prune(ctx)?;

    Ok(BuildReport {
        image: final_image,
        volume_label: Some(extraction.base.volume_label),
        elapsed,
        already_built: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert_eq!(Stage::Acquire.number(), 1);
        assert_eq!(Stage::Finalize.number(), 5);
        assert_eq!(Stage::Assemble.to_string(), "Assemble ISO");
    }
}
