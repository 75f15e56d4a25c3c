//! CLI command handlers.
//!
//! - `build` - Run the pipeline (the default when no subcommand is given)
//! - `show` - Display configuration and stage markers
//!
//! `preflight` and `clean` live next to the code they inspect.

pub mod build;
pub mod show;

pub use build::cmd_build;
pub use show::cmd_show;
