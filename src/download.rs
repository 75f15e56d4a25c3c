//! Base image acquisition.
//!
//! Guarantees the base ISO exists in the working space. A missing image is
//! streamed from the configured URL into `<path>.part` and renamed onto the
//! final path only after the whole body has been written, flushed and
//! (optionally) checksummed. The final path is the marker later stages and
//! later runs trust, so it must never hold a partial download.

use anyhow::{bail, Context};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::workspace::{discard_partial, partial_path};

/// Where the base image comes from when it is not cached yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageSource {
    pub url: Option<String>,
    /// Expected SHA-256 of a fresh download.
    pub sha256: Option<String>,
}

impl ImageSource {
    /// Ensure the image exists at `path`.
    pub fn ensure(&self, path: &Path) -> Result<()> {
        ensure_base_image(path, self.url.as_deref(), self.sha256.as_deref())
    }
}

/// Make sure the base image exists at `path`, downloading it if needed.
///
/// An existing file is accepted as-is; `expected_sha256` only applies to
/// fresh downloads.
pub fn ensure_base_image(
    path: &Path,
    source_url: Option<&str>,
    expected_sha256: Option<&str>,
) -> Result<()> {
    if path.exists() {
        info!("Base image already present at {}", path.display());
        return Ok(());
    }

    let url = match source_url.map(str::trim) {
        Some(url) if !url.is_empty() => url,
        _ => {
            return Err(PipelineError::MissingSource {
                path: path.to_path_buf(),
            })
        }
    };

    let fetch_failed = |reason: String| PipelineError::FetchFailed {
        url: url.to_string(),
        reason,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let partial = partial_path(path);
    discard_partial(&partial)?;

    info!("Downloading base image...");
    info!("  URL: {}", url);

    let outcome = fetch(url, &partial).and_then(|()| match expected_sha256 {
        Some(expected) => verify_sha256(&partial, expected),
        None => Ok(()),
    });

    if let Err(e) = outcome {
        let _ = fs::remove_file(&partial);
        return Err(fetch_failed(format!("{:#}", e)));
    }

    if let Err(e) = fs::rename(&partial, path) {
        let _ = fs::remove_file(&partial);
        return Err(fetch_failed(format!(
            "could not move download into place at {}: {}",
            path.display(),
            e
        )));
    }

    info!("Downloaded to {}", path.display());
    Ok(())
}

/// Blocking wrapper around the async HTTP download.
fn fetch(url: &str, dest: &Path) -> anyhow::Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start download runtime")?;
    rt.block_on(http(url, dest))
}

/// Stream `url` into `dest`, truncating whatever is there.
async fn http(url: &str, dest: &Path) -> anyhow::Result<()> {
    use futures_util::StreamExt;
    use tokio::io::AsyncWriteExt;

    let client = reqwest::Client::builder()
        .user_agent(concat!("ove-builder/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")?;

    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("HTTP request failed: {}", url))?;

    let status = response.status();
    if !status.is_success() {
        bail!(
            "HTTP {} for {}: {}",
            status.as_u16(),
            url,
            status.canonical_reason().unwrap_or("Unknown error")
        );
    }

    let total = response.content_length();
    let file = tokio::fs::File::create(dest)
        .await
        .with_context(|| format!("Failed to create {}", dest.display()))?;
    let mut writer = tokio::io::BufWriter::new(file);

    let mut downloaded = 0u64;
    let mut last_decile = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.with_context(|| format!("Failed to read chunk from {}", url))?;
        writer
            .write_all(&chunk)
            .await
            .with_context(|| format!("Failed to write to {}", dest.display()))?;
        downloaded += chunk.len() as u64;

        if let Some(total) = total.filter(|t| *t > 0) {
            let decile = downloaded * 10 / total;
            if decile > last_decile {
                last_decile = decile;
                info!(
                    "    {:.1}/{:.1} MB ({}%)",
                    downloaded as f64 / (1024.0 * 1024.0),
                    total as f64 / (1024.0 * 1024.0),
                    decile * 10
                );
            }
        }
    }

    writer
        .flush()
        .await
        .with_context(|| format!("Failed to flush {}", dest.display()))?;
    writer
        .into_inner()
        .sync_all()
        .await
        .with_context(|| format!("Failed to sync {}", dest.display()))?;

    if let Some(expected) = total {
        if downloaded != expected {
            bail!(
                "Download incomplete for {}: expected {} bytes, got {} bytes",
                url,
                expected,
                downloaded
            );
        }
    }

    Ok(())
}

/// Verify the SHA-256 of `path` against a lowercase or uppercase hex digest.
pub fn verify_sha256(path: &Path, expected: &str) -> anyhow::Result<()> {
    info!("Verifying SHA256 checksum...");

    let file = fs::File::open(path)
        .with_context(|| format!("Failed to open {} for checksum", path.display()))?;
    let mut reader = std::io::BufReader::with_capacity(1024 * 1024, file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 1024 * 1024];

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    let actual = format!("{:x}", hasher.finalize());
    if actual != expected.trim().to_lowercase() {
        bail!(
            "Checksum mismatch for {}\n  Expected: {}\n  Actual:   {}",
            path.display(),
            expected,
            actual
        );
    }

    info!("Checksum verified OK");
    Ok(())
}
