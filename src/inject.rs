//! Artifact injection.
//!
//! Copies one container image from its registry into the working tree as an
//! OCI archive at `images/<name>/<name>.tar`. The archive is written under a
//! `.part` name and renamed once `skopeo` succeeds, so its presence always
//! means a complete copy.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

use crate::context::BuildContext;
use crate::error::{PipelineError, Result};
use crate::extract::ExtractedTree;
use crate::process::Cmd;
use crate::workspace::{discard_partial, partial_path, StageState};

/// Registry coordinate staged into the tree when none is configured.
pub const DEFAULT_ARTIFACT_IMAGE: &str = "quay.io/openshift-release-dev/ocp-release:4.19.0-x86_64";

/// How an image version is pinned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Tag(String),
    Digest(String),
}

/// A container image in a registry, e.g. `quay.io/org/name:tag`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    /// `registry/path/name` without tag or digest.
    pub repository: String,
    pub reference: Reference,
    /// Directory and file stem inside the tree.
    pub name: String,
}

impl ArtifactRef {
    /// Override the name derived from the repository.
    pub fn with_name(mut self, name: &str) -> Result<Self> {
        validate_name(name)?;
        self.name = name.to_string();
        Ok(self)
    }

    /// Source argument for `skopeo copy`.
    pub fn source(&self) -> String {
        format!("docker://{}", self)
    }

    /// Where the archive lives inside `tree`.
    pub fn archive_path(&self, tree: &Path) -> PathBuf {
        tree.join("images")
            .join(&self.name)
            .join(format!("{}.tar", self.name))
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reference {
            Reference::Tag(tag) => write!(f, "{}:{}", self.repository, tag),
            Reference::Digest(digest) => write!(f, "{}@{}", self.repository, digest),
        }
    }
}

impl FromStr for ArtifactRef {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().trim_start_matches("docker://");
        let invalid = |why: &str| PipelineError::ArgumentError(format!("artifact image '{}': {}", s, why));

        let (repository, reference) = if let Some((repo, digest)) = s.split_once('@') {
            if digest.is_empty() {
                return Err(invalid("empty digest"));
            }
            (repo, Reference::Digest(digest.to_string()))
        } else {
            // A ':' before the last '/' is a registry port, not a tag.
            let last_slash = s.rfind('/').map(|i| i + 1).unwrap_or(0);
            match s[last_slash..].rfind(':') {
                Some(i) => {
                    let split = last_slash + i;
                    let tag = &s[split + 1..];
                    if tag.is_empty() {
                        return Err(invalid("empty tag"));
                    }
                    (&s[..split], Reference::Tag(tag.to_string()))
                }
                None => (s, Reference::Tag("latest".to_string())),
            }
        };

        let name = repository
            .rsplit('/')
            .next()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| invalid("missing repository name"))?;
        validate_name(name).map_err(|_| invalid("repository name is not a valid path component"))?;

        Ok(Self {
            repository: repository.to_string(),
            reference,
            name: name.to_string(),
        })
    }
}

fn validate_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if ok {
        Ok(())
    } else {
        Err(PipelineError::ArgumentError(format!(
            "invalid artifact name '{}'",
            name
        )))
    }
}

/// Stage `artifact` into `tree` unless it is already there.
pub fn inject_artifact(ctx: &BuildContext, tree: &ExtractedTree, artifact: &ArtifactRef) -> Result<()> {
    let dest = artifact.archive_path(&tree.path);
    if StageState::of_non_empty_file(&dest).is_complete() {
        info!("Artifact {} already staged at {}", artifact.name, dest.display());
        return Ok(());
    }

    let failed = |reason: String| PipelineError::InjectionFailed {
        artifact: artifact.to_string(),
        reason,
    };

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let partial = partial_path(&dest);
    discard_partial(&partial).map_err(|e| failed(format!("stale {}: {}", partial.display(), e)))?;
    // A zero-byte archive from an older run is not a staged artifact.
    discard_partial(&dest)?;

    info!("Copying {} into {}", artifact, dest.display());
    let cmd = Cmd::new(&ctx.tools.skopeo)
        .arg("copy")
        .arg(artifact.source())
        .arg(format!("oci-archive:{}", partial.display()))
        .error_msg("skopeo copy failed");

    if let Err(e) = ctx.privileged.elevate(cmd).run() {
        let _ = fs::remove_file(&partial);
        return Err(failed(format!("{:#}", e)));
    }

    if !StageState::of_non_empty_file(&partial).is_complete() {
        let _ = fs::remove_file(&partial);
        return Err(failed(format!("{} is missing or empty after copy", partial.display())));
    }

    if let Err(e) = fs::rename(&partial, &dest) {
        let _ = fs::remove_file(&partial);
        return Err(failed(format!("could not move archive into place: {}", e)));
    }

    info!("Staged {} at {}", artifact.name, dest.display());
    Ok(())
}
