//! Configuration management for ove-builder.
//!
//! Precedence, highest first: command-line flags, process environment,
//! `.env` file (loaded into the environment by `main`), built-in defaults.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::download::ImageSource;
use crate::error::{PipelineError, Result};
use crate::inject::{ArtifactRef, DEFAULT_ARTIFACT_IMAGE};
use crate::tools::Tools;
use crate::workspace::{WorkingSpace, DEFAULT_BUILD_DIR};

/// Base image URL.
pub const ENV_ISO_URL: &str = "BASE_ISO_URL";
/// Working space root.
pub const ENV_BUILD_DIR: &str = "BUILD_DIR";
/// Expected SHA-256 of a downloaded base image.
pub const ENV_ISO_SHA256: &str = "BASE_ISO_SHA256";
/// Registry coordinate of the injected artifact.
pub const ENV_ARTIFACT_IMAGE: &str = "ARTIFACT_IMAGE";
/// Name of the injected artifact inside the tree (default: repository name).
pub const ENV_ARTIFACT_NAME: &str = "ARTIFACT_NAME";

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub iso_url: Option<String>,
    pub dir: Option<PathBuf>,
}

/// Resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub build_dir: PathBuf,
    pub source: ImageSource,
    pub artifact: ArtifactRef,
    pub tools: Tools,
}

impl Config {
    /// Resolve configuration from the process environment and `overrides`.
    pub fn load(overrides: &Overrides) -> Result<Self> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars, overrides)
    }

    /// Resolve configuration from an explicit variable map.
    pub fn from_vars(vars: &HashMap<String, String>, overrides: &Overrides) -> Result<Self> {
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let build_dir = overrides
            .dir
            .clone()
            .filter(|d| !d.as_os_str().is_empty())
            .or_else(|| get(ENV_BUILD_DIR).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BUILD_DIR));

        let url = overrides
            .iso_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .or_else(|| get(ENV_ISO_URL));
        if let Some(url) = &url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(PipelineError::ArgumentError(format!(
                    "base image URL must be http(s): {}",
                    url
                )));
            }
        }

        let sha256 = get(ENV_ISO_SHA256);
        if let Some(sha) = &sha256 {
            if sha.len() != 64 || !sha.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(PipelineError::ArgumentError(format!(
                    "{} is not a SHA-256 hex digest: {}",
                    ENV_ISO_SHA256, sha
                )));
            }
        }

        let mut artifact: ArtifactRef = get(ENV_ARTIFACT_IMAGE)
            .as_deref()
            .unwrap_or(DEFAULT_ARTIFACT_IMAGE)
            .parse()?;
        if let Some(name) = get(ENV_ARTIFACT_NAME) {
            artifact = artifact.with_name(&name)?;
        }

        Ok(Self {
            build_dir,
            source: ImageSource { url, sha256 },
            artifact,
            tools: Tools::from_vars(vars),
        })
    }

    pub fn workspace(&self) -> WorkingSpace {
        WorkingSpace::new(&self.build_dir)
    }

    /// Print configuration for `ove-builder show`.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  {}: {}", ENV_BUILD_DIR, self.build_dir.display());
        println!(
            "  {}: {}",
            ENV_ISO_URL,
            self.source.url.as_deref().unwrap_or("(not set)")
        );
        println!(
            "  {}: {}",
            ENV_ISO_SHA256,
            self.source.sha256.as_deref().unwrap_or("(not set)")
        );
        println!("  {}: {}", ENV_ARTIFACT_IMAGE, self.artifact);
        println!("  {}: {}", ENV_ARTIFACT_NAME, self.artifact.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(&HashMap::new(), &Overrides::default()).unwrap();
        assert_eq!(config.build_dir, PathBuf::from(DEFAULT_BUILD_DIR));
        assert_eq!(config.source.url, None);
        assert_eq!(config.artifact.to_string(), DEFAULT_ARTIFACT_IMAGE);
    }

    #[test]
    fn test_environment_is_used() {
        let config = Config::from_vars(
            &vars(&[
                (ENV_BUILD_DIR, "/srv/build"),
                (ENV_ISO_URL, "https://example.com/rhcos.iso"),
            ]),
            &Overrides::default(),
        )
        .unwrap();
        assert_eq!(config.build_dir, PathBuf::from("/srv/build"));
        assert_eq!(
            config.source.url.as_deref(),
            Some("https://example.com/rhcos.iso")
        );
    }

    #[test]
    fn test_cli_overrides_environment() {
        let config = Config::from_vars(
            &vars(&[
                (ENV_BUILD_DIR, "/srv/build"),
                (ENV_ISO_URL, "https://example.com/a.iso"),
            ]),
            &Overrides {
                iso_url: Some("https://mirror.example.com/b.iso".into()),
                dir: Some(PathBuf::from("/data")),
            },
        )
        .unwrap();
        assert_eq!(config.build_dir, PathBuf::from("/data"));
        assert_eq!(
            config.source.url.as_deref(),
            Some("https://mirror.example.com/b.iso")
        );
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = Config::from_vars(
            &vars(&[(ENV_ISO_URL, "  "), (ENV_BUILD_DIR, "")]),
            &Overrides::default(),
        )
        .unwrap();
        assert_eq!(config.source.url, None);
        assert_eq!(config.build_dir, PathBuf::from(DEFAULT_BUILD_DIR));
    }

    #[test]
    fn test_rejects_non_http_url() {
        let err = Config::from_vars(
            &vars(&[(ENV_ISO_URL, "ftp://example.com/rhcos.iso")]),
            &Overrides::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::ArgumentError(_)));
    }

    #[test]
    fn test_rejects_bad_checksum() {
        let err = Config::from_vars(
            &vars(&[(ENV_ISO_SHA256, "abc")]),
            &Overrides::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::ArgumentError(_)));
    }

    #[test]
    fn test_artifact_override() {
        let config = Config::from_vars(
            &vars(&[
                (ENV_ARTIFACT_IMAGE, "registry.example.com/ocp/4.19:agent-installer-ui"),
                (ENV_ARTIFACT_NAME, "agent-installer-ui"),
            ]),
            &Overrides::default(),
        )
        .unwrap();
        assert_eq!(config.artifact.name, "agent-installer-ui");
        assert_eq!(
            config.artifact.source(),
            "docker://registry.example.com/ocp/4.19:agent-installer-ui"
        );
    }
}
