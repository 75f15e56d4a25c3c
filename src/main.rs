//! ove-builder - builds a hybrid BIOS/UEFI installer ISO.

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use ove_builder::clean::{cmd_clean, CleanTarget};
use ove_builder::commands::{cmd_build, cmd_show};
use ove_builder::preflight::cmd_preflight;
use ove_builder::{BuildContext, Config, Overrides, PipelineError};

#[derive(Parser)]
#[command(name = "ove-builder")]
#[command(version, about = "Builds a hybrid BIOS/UEFI installer ISO from a base image")]
#[command(
    after_help = "QUICK START:\n  ove-builder preflight            Check host tools\n  ove-builder --iso-url <URL>      Build <dir>/agent.iso\n  ove-builder show                 Show configuration and build status\n  ove-builder clean                Remove the working tree"
)]
struct Cli {
    /// Base image URL (overrides BASE_ISO_URL)
    #[arg(long, global = true, value_name = "URL")]
    iso_url: Option<String>,

    /// Working space directory (overrides BUILD_DIR; default /tmp/iso_builder)
    #[arg(long, global = true, value_name = "PATH")]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline (default)
    Build,

    /// Run preflight checks (verify host tools before build)
    Preflight {
        /// Fail if any checks fail (exit code 1)
        #[arg(long)]
        strict: bool,
    },

    /// Clean the working space (default: working tree only)
    Clean {
        #[command(subcommand)]
        what: Option<CleanWhat>,
    },

    /// Show configuration and per-stage status
    Show {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum CleanWhat {
    /// Scratch area and working tree
    Work,
    /// Assembled and final images
    Output,
    /// Everything, including the cached base image
    All,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    // Load .env if present; real environment variables win.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let stage = e
                .downcast_ref::<PipelineError>()
                .map(PipelineError::stage)
                .unwrap_or("command");
            tracing::error!("{} stage failed", stage);
            eprintln!("error[{}]: {:#}", stage, e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let overrides = Overrides {
        iso_url: cli.iso_url,
        dir: cli.dir,
    };
    let config = Config::load(&overrides)?;
    let ctx = BuildContext::new(config.workspace(), config.tools.clone());

    match cli.command.unwrap_or(Commands::Build) {
        Commands::Build => {
            cmd_build(&ctx, &config)?;
        }
        Commands::Preflight { strict } => cmd_preflight(&ctx, strict)?,
        Commands::Clean { what } => {
            let target = match what {
                None | Some(CleanWhat::Work) => CleanTarget::Work,
                Some(CleanWhat::Output) => CleanTarget::Output,
                Some(CleanWhat::All) => CleanTarget::All,
            };
            cmd_clean(&ctx, target)?;
        }
        Commands::Show { json } => cmd_show(&ctx, &config, json)?,
    }
    Ok(())
}
