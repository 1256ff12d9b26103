//! Input resolution for the CLI: normalise a path or URL to a local image.
//!
//! The HTTP server receives bytes through multipart and never comes here;
//! `patrika process` accepts either a local file or an HTTP(S) URL. URLs are
//! downloaded into a `TempDir` that lives as long as the returned
//! [`ResolvedInput`], so cleanup happens even if the pipeline panics.

use crate::error::DigestError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// The resolved input — either a local path or a downloaded temp file.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; the image was downloaded to a temp directory.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Path to the image regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Check the leading bytes against known image signatures.
pub fn sniff_image(bytes: &[u8]) -> Option<image::ImageFormat> {
    image::guess_format(bytes).ok()
}

/// Resolve the input string to a local image path.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, DigestError> {
    if input.trim().is_empty() {
        return Err(DigestError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input).await
    }
}

/// Resolve a local file path, validating existence and image magic bytes.
async fn resolve_local(path_str: &str) -> Result<ResolvedInput, DigestError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(DigestError::FileNotFound { path });
        }
        Err(e) => return Err(DigestError::Io { path, source: e }),
    };

    if sniff_image(&bytes).is_none() {
        return Err(DigestError::NotAnImage {
            path,
            detail: "unrecognised image signature".into(),
        });
    }

    debug!("Resolved local image: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Download a URL to a temporary directory and return the path.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, DigestError> {
    info!("Downloading image from: {}", url);

    let failed = |reason: String| DigestError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            failed(format!("timed out after {timeout_secs}s"))
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;

    let temp_dir = TempDir::new().map_err(|e| DigestError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(extract_filename(url));

    if sniff_image(&bytes).is_none() {
        return Err(DigestError::NotAnImage {
            path: file_path,
            detail: "downloaded content is not an image".into(),
        });
    }

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| DigestError::Io {
            path: file_path.clone(),
            source: e,
        })?;

    info!("Downloaded to: {}", file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// A reasonable filename from the URL path.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }
    "downloaded.jpg".to_string()
}
