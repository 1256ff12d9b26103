//! Progress-callback trait for per-stage digest events.
//!
//! Inject an [`Arc<dyn DigestProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves through its stages. The CLI forwards them to
//! a terminal spinner; the server leaves the callback unset and relies on
//! `tracing` instead.
//!
//! # Example
//!
//! ```rust
//! use patrika::{DigestProgressCallback, PipelineConfig, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     degraded: AtomicUsize,
//! }
//!
//! impl DigestProgressCallback for CountingCallback {
//!     fn on_stage_degraded(&self, stage: Stage, reason: &str) {
//!         self.degraded.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{stage} fell back: {reason}");
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { degraded: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::document::ExtractionMethod;
use std::fmt;
use std::sync::Arc;

/// The pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Preprocess,
    Extract,
    Structure,
    Summarize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Preprocess => "preprocess",
            Stage::Extract => "extract",
            Stage::Structure => "structure",
            Stage::Summarize => "summarize",
        })
    }
}

/// Called by the digest pipeline as it runs each stage.
///
/// Implementations must be `Send + Sync`: several uploads may be digested
/// concurrently with the same config. All methods have default no-op
/// implementations so callers only override what they care about.
pub trait DigestProgressCallback: Send + Sync {
    /// Called just before a stage starts.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage produced its result without falling back.
    ///
    /// `output_len` is the character length of the stage's main output
    /// (extracted text, structured `allText`, overall summary).
    fn on_stage_complete(&self, stage: Stage, output_len: usize) {
        let _ = (stage, output_len);
    }

    /// Called when a stage substituted its deterministic fallback.
    fn on_stage_degraded(&self, stage: Stage, reason: &str) {
        let _ = (stage, reason);
    }

    /// Called once after the document is assembled.
    fn on_digest_complete(&self, method: ExtractionMethod) {
        let _ = method;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl DigestProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn DigestProgressCallback>;
