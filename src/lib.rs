//! ove-builder - hybrid BIOS/UEFI installer ISO builder.
//!
//! Takes a vendor base ISO, stages one container image into its tree and
//! re-authors a bootable image:
//! - acquire: download (or reuse) the base image
//! - extract: mount or unpack it, copy a writable tree
//! - inject: copy the artifact into the tree as an OCI archive
//! - assemble: author an ISO with BIOS and UEFI El Torito entries
//! - finalize: patch the hybrid MBR, relocate, prune
//!
//! Every stage is skipped when its output already exists.

pub mod clean;
pub mod commands;
pub mod config;
pub mod context;
pub mod download;
pub mod error;
pub mod extract;
pub mod finalize;
pub mod inject;
pub mod iso;
pub mod pipeline;
pub mod preflight;
pub mod privilege;
pub mod process;
pub mod timing;
pub mod tools;
pub mod workspace;

pub use config::{Config, Overrides};
pub use context::BuildContext;
pub use error::{PipelineError, Result};
