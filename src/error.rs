//! Error types for the patrika library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`DigestError`] — **Fatal**: the page cannot be digested at all (the
//!   upload is not an image, preprocessing failed, the model could not read
//!   the page, no provider is configured). Returned as `Err(DigestError)`
//!   from [`crate::digest::digest_image`].
//!
//! * [`StageError`] — **Non-fatal**: the structuring or summarising call
//!   failed or produced unusable output. The pipeline substitutes a weaker
//!   deterministic result and records the error as the `reason` of a
//!   [`crate::pipeline::StageOutcome::Degraded`] outcome.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the patrika library.
#[derive(Debug, Error)]
pub enum DigestError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// The file exists and was read, but is not a decodable image.
    #[error("File is not a supported image: '{path}': {detail}")]
    NotAnImage { path: PathBuf, detail: String },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// Resizing / level adjustment / re-encoding failed.
    #[error("Image preprocessing failed for '{path}': {detail}")]
    Preprocess { path: PathBuf, detail: String },

    /// Stage 1 failed: without raw text there is nothing to structure.
    #[error("Text extraction failed: {0}")]
    Extraction(#[source] StageError),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error from a single model call or its output.
#[derive(Debug, Clone, Error, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum StageError {
    /// The provider returned an error.
    #[error("model call failed: {detail}")]
    ModelFailed { detail: String },

    /// The call did not finish within `api_timeout_secs`.
    #[error("model call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The model answered, but with nothing usable.
    #[error("model returned an empty response")]
    EmptyResponse,

    /// The model answered, but the JSON could not be recovered.
    #[error("unusable model output: {detail}")]
    Unparseable { detail: String },
}
