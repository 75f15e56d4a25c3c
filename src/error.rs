//! Error types for the build pipeline.
//!
//! Every stage returns a [`PipelineError`]. The variant identifies the stage
//! that failed and, where the operator can fix it, carries the remediation
//! text in its message.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for pipeline stage failures.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Base image is missing and no source URL was configured.
    #[error(
        "base image not found at {}\n\n\
         Either:\n  \
         1. set BASE_ISO_URL (or pass --iso-url) so it can be downloaded, or\n  \
         2. place the ISO at {} manually",
        path.display(),
        path.display()
    )]
    MissingSource { path: PathBuf },

    /// Downloading the base image failed.
    #[error("failed to fetch {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    /// The base image's table of contents did not yield a volume id.
    #[error("could not read the volume label of {}: {reason}", path.display())]
    VolumeLabelMissing { path: PathBuf, reason: String },

    /// Staging the scratch area or materializing the tree failed.
    #[error("extraction failed while {step}: {reason}")]
    ExtractionFailed { step: &'static str, reason: String },

    /// The UEFI boot image is not where the assembler expects it.
    #[error(
        "UEFI boot image not found at {}\n\
         The extracted tree is incomplete. Remove {} for a clean rebuild \
         (or run 'ove-builder clean').",
        path.display(),
        workspace.display()
    )]
    MissingBootImage { path: PathBuf, workspace: PathBuf },

    /// Copying the artifact into the tree failed.
    #[error("failed to stage artifact {artifact}: {reason}")]
    InjectionFailed { artifact: String, reason: String },

    /// ISO authoring failed.
    #[error("ISO authoring failed: {0}")]
    AssemblyFailed(String),

    /// Hybrid MBR patching or output relocation failed.
    #[error("finalization failed: {0}")]
    FinalizationFailed(String),

    /// Invalid command-line or configuration input.
    #[error("invalid argument: {0}")]
    ArgumentError(String),

    /// Working space bookkeeping failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Short name of the stage that produced this error.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::MissingSource { .. } | Self::FetchFailed { .. } => "acquire",
            Self::VolumeLabelMissing { .. } | Self::ExtractionFailed { .. } => "extract",
            Self::InjectionFailed { .. } => "inject",
            Self::MissingBootImage { .. } | Self::AssemblyFailed(_) => "assemble",
            Self::FinalizationFailed(_) => "finalize",
            Self::ArgumentError(_) => "cli",
            Self::Io(_) => "workspace",
        }
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_source_names_both_remedies() {
        let err = PipelineError::MissingSource {
            path: PathBuf::from("/tmp/iso_builder/rhcos.iso"),
        };
        let msg = err.to_string();
        assert!(msg.contains("BASE_ISO_URL"));
        assert!(msg.contains("manually"));
        assert!(msg.contains("/tmp/iso_builder/rhcos.iso"));
    }

    #[test]
    fn test_missing_boot_image_suggests_clean_rebuild() {
        let err = PipelineError::MissingBootImage {
            path: PathBuf::from("/w/ove/work/images/efiboot.img"),
            workspace: PathBuf::from("/w/ove"),
        };
        let msg = err.to_string();
        assert!(msg.contains("clean rebuild"));
        assert!(msg.contains("/w/ove"));
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(
            PipelineError::FetchFailed {
                url: "http://x".into(),
                reason: "refused".into()
            }
            .stage(),
            "acquire"
        );
        assert_eq!(PipelineError::AssemblyFailed("x".into()).stage(), "assemble");
        assert_eq!(PipelineError::FinalizationFailed("x".into()).stage(), "finalize");
        assert_eq!(PipelineError::ArgumentError("x".into()).stage(), "cli");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PipelineError = io_err.into();
        assert!(matches!(err, PipelineError::Io(_)));
        assert_eq!(err.stage(), "workspace");
    }
}
