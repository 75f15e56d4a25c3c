//! Show command - displays configuration and build status.

use anyhow::Result;
use serde::Serialize;

use crate::config::Config;
use crate::context::BuildContext;
use crate::workspace::dir_size;

#[derive(Debug, Serialize)]
pub struct StageStatus {
    pub marker: &'static str,
    pub state: &'static str,
}

/// Machine-readable form of `ove-builder show --json`.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub build_dir: String,
    pub base_image_url: Option<String>,
    pub artifact: String,
    pub artifact_name: String,
    pub strategy: &'static str,
    pub privileged: &'static str,
    pub tree_bytes: u64,
    pub stages: Vec<StageStatus>,
}

impl StatusReport {
    pub fn collect(ctx: &BuildContext, config: &Config) -> Self {
        let ws = &ctx.workspace;
        let archive = config.artifact.archive_path(&ws.tree_dir());
        Self {
            build_dir: ws.root().display().to_string(),
            base_image_url: config.source.url.clone(),
            artifact: config.artifact.to_string(),
            artifact_name: config.artifact.name.clone(),
            strategy: ctx.strategy.name(),
            privileged: ctx.privileged.describe(),
            tree_bytes: dir_size(&ws.tree_dir()),
            stages: ws
                .status(&archive)
                .into_iter()
                .map(|(marker, state)| StageStatus {
                    marker,
                    state: state.label(),
                })
                .collect(),
        }
    }
}

/// Execute the show command.
pub fn cmd_show(ctx: &BuildContext, config: &Config, json: bool) -> Result<()> {
    let report = StatusReport::collect(ctx, config);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    config.print();
    println!();
    println!("Environment:");
    println!("  Extraction: {}", report.strategy);
    println!("  Privileged: {}", report.privileged);
    println!();
    println!("Build status:");
    for stage in &report.stages {
        let icon = if stage.state == "complete" { "✓" } else { "·" };
        println!("  {} {:<16} {}", icon, stage.marker, stage.state);
    }
    if report.tree_bytes > 0 {
        println!();
        println!(
            "Working tree: {:.1} MB",
            report.tree_bytes as f64 / 1_000_000.0
        );
    }
    Ok(())
}
