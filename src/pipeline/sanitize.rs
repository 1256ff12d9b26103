//! Response sanitizer: recover one JSON object from free-form model output.
//!
//! Even when asked for "a single JSON object and nothing else", models wrap
//! the object in ```` ```json ```` fences, prepend "Here is the JSON:", or
//! append an explanation. The candidate is chosen in a fixed order:
//!
//! 1. the content of the first fenced code block, if any
//! 2. the span from the first `{` to the last `}` (applied to the fenced
//!    content too, so a fence holding prose plus an object still works)
//! 3. a strict `serde_json` parse of that candidate
//!
//! The result is an explicit `Result`, never a silent empty value, so a
//! caller cannot mistake "no data" for "valid empty data".

use crate::document::truncate_chars;
use crate::error::StageError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::warn;

/// Characters of the offending payload kept for diagnostics.
const SNIPPET_CHARS: usize = 200;

/// Why no JSON value could be recovered.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SanitizeError {
    /// Neither a fenced block nor a `{…}` span was found.
    #[error("no JSON object found in model output")]
    NoJson,

    /// A candidate was found but did not parse into the requested type.
    #[error("malformed JSON ({detail}) near: {snippet}")]
    Malformed { snippet: String, detail: String },
}

impl From<SanitizeError> for StageError {
    fn from(e: SanitizeError) -> Self {
        StageError::Unparseable {
            detail: e.to_string(),
        }
    }
}

static RE_FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n?(.*?)```").unwrap());

/// Choose the substring most likely to be the JSON object.
pub fn find_json_candidate(raw: &str) -> Option<&str> {
    let scope = RE_FENCED_BLOCK
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .unwrap_or(raw);

    brace_span(scope)
}

/// The span from the first `{` to the last `}`, inclusive.
fn brace_span(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&s[start..=end])
}

/// Extract and parse a JSON object of type `T` from raw model output.
///
/// Logs a diagnostic snippet on failure; never panics.
pub fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T, SanitizeError> {
    let Some(candidate) = find_json_candidate(raw) else {
        warn!(
            "No JSON object in model output: {:?}",
            truncate_chars(raw.trim(), SNIPPET_CHARS)
        );
        return Err(SanitizeError::NoJson);
    };

    serde_json::from_str::<T>(candidate).map_err(|e| {
        let snippet = truncate_chars(candidate, SNIPPET_CHARS).to_string();
        warn!("Malformed JSON in model output ({}): {:?}", e, snippet);
        SanitizeError::Malformed {
            snippet,
            detail: e.to_string(),
        }
    })
}
