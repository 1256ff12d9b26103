//! Pipeline stages for digesting a newspaper page.
//!
//! Each submodule implements exactly one transformation step, so every
//! stage's failure path can be exercised on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ preprocess ──▶ encode ──▶ extract ──▶ structure ──▶ summarize
//! (path/URL)  (image)     (base64)    (VLM)       (LLM+JSON)    (LLM+JSON)
//! ```
//!
//! 1. [`input`]      — canonicalise a CLI path or URL to a local image file
//! 2. [`preprocess`] — resize and level the photo; runs in `spawn_blocking`
//! 3. [`encode`]     — base64-wrap the processed JPEG for the vision request
//! 4. [`extract`]    — stage 1, raw text; the only fatal model call
//! 5. [`structure`]  — stage 2, JSON structure, regex fallback
//! 6. [`summarize`]  — stage 3, JSON summaries, synthesised fallback
//!
//! [`llm`] holds the model seam and [`sanitize`] the JSON-from-prose parser
//! shared by stages 2 and 3.

pub mod encode;
pub mod extract;
pub mod input;
pub mod llm;
pub mod preprocess;
pub mod sanitize;
pub mod structure;
pub mod summarize;

use crate::error::StageError;

/// Result of a stage that can degrade instead of failing.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    /// The model call succeeded and its output was usable.
    Produced(T),
    /// The model call or its output failed; `value` is the deterministic substitute.
    Degraded { value: T, reason: StageError },
}

impl<T> StageOutcome<T> {
    /// The value, whichever path produced it.
    pub fn into_value(self) -> T {
        match self {
            StageOutcome::Produced(v) => v,
            StageOutcome::Degraded { value, .. } => value,
        }
    }

    pub fn value(&self) -> &T {
        match self {
            StageOutcome::Produced(v) => v,
            StageOutcome::Degraded { value, .. } => value,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, StageOutcome::Degraded { .. })
    }

    /// Why the stage degraded, if it did.
    pub fn reason(&self) -> Option<&StageError> {
        match self {
            StageOutcome::Produced(_) => None,
            StageOutcome::Degraded { reason, .. } => Some(reason),
        }
    }
}
