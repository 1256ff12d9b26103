//! Document data model: what the pipeline produces and the store keeps.
//!
//! Every type serialises camelCase because the React client reads these
//! objects verbatim. Every field the model is asked to fill is
//! `#[serde(default)]` and reads an explicit `null` as its default: a reply
//! that omits `subHeadlines` or sends `"date": null` is still a usable
//! structuring result, not a parse failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

/// Language tag stamped on every document and extraction result.
pub const LANGUAGE_BENGALI: &str = "bengali";

/// A processed newspaper page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    /// Name of the stored upload inside the upload directory.
    pub filename: String,
    /// Name the client uploaded the file under.
    pub original_name: String,
    pub image_path: PathBuf,
    pub processed_image_path: PathBuf,
    pub upload_date: DateTime<Utc>,
    pub extracted_data: ExtractedData,
    pub summary_data: SummaryData,
    /// Stage-1 text, truncated to [`crate::PipelineConfig::raw_text_limit`] chars.
    pub raw_extracted_text: String,
    pub status: DocumentStatus,
    pub language: String,
}

impl Document {
    /// Number of headlines the extraction found.
    pub fn headlines_count(&self) -> usize {
        self.extracted_data.headlines.len()
    }

    /// Number of articles the extraction found.
    pub fn articles_count(&self) -> usize {
        self.extracted_data.articles.len()
    }

    /// Every textual field, concatenated and lowercased, for substring search.
    pub fn searchable_text(&self) -> String {
        let e = &self.extracted_data;
        let s = &self.summary_data;
        let mut parts: Vec<&str> = Vec::new();

        parts.push(&e.all_text);
        parts.extend(e.headlines.iter().map(String::as_str));
        parts.extend(e.sub_headlines.iter().map(String::as_str));
        for article in &e.articles {
            parts.push(&article.headline);
            parts.push(&article.content);
            if let Some(ref summary) = article.summary {
                parts.push(summary);
            }
        }

        parts.push(&s.overall_summary);
        for h in &s.headline_summaries {
            parts.push(&h.headline);
            parts.push(&h.summary);
        }
        for a in &s.article_summaries {
            parts.push(&a.headline);
            parts.push(&a.summary);
            parts.extend(a.key_points.iter().map(String::as_str));
        }
        parts.extend(s.important_topics.iter().map(String::as_str));

        parts.join(" ").to_lowercase()
    }
}

/// Lifecycle status of a stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    #[default]
    Processed,
}

/// Which stage actually produced an [`ExtractedData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// The structuring call returned parseable JSON.
    AiStructured,
    /// Structuring failed; headlines recovered from `HEADLINE:` markers.
    RegexFallback,
    /// Structuring failed and no markers were found.
    #[default]
    Fallback,
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ExtractionMethod::AiStructured => "ai_structured",
            ExtractionMethod::RegexFallback => "regex_fallback",
            ExtractionMethod::Fallback => "fallback",
        })
    }
}

/// Structured content of a newspaper page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractedData {
    #[serde(deserialize_with = "null_as_default")]
    pub date: String,
    #[serde(deserialize_with = "null_as_default")]
    pub headlines: Vec<String>,
    #[serde(alias = "sub_headlines", deserialize_with = "null_as_default")]
    pub sub_headlines: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub articles: Vec<Article>,
    #[serde(alias = "all_text", deserialize_with = "null_as_default")]
    pub all_text: String,
    #[serde(deserialize_with = "null_as_default")]
    pub language: String,
    #[serde(alias = "extraction_method", deserialize_with = "null_as_default")]
    pub extraction_method: ExtractionMethod,
}

/// One article as the structuring call sees it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Article {
    #[serde(deserialize_with = "null_as_default")]
    pub headline: String,
    #[serde(deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(deserialize_with = "null_as_default")]
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Summaries of a page. Always present on a [`Document`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SummaryData {
    #[serde(alias = "overall_summary", deserialize_with = "null_as_default")]
    pub overall_summary: String,
    #[serde(alias = "headline_summaries", deserialize_with = "null_as_default")]
    pub headline_summaries: Vec<HeadlineSummary>,
    #[serde(alias = "article_summaries", deserialize_with = "null_as_default")]
    pub article_summaries: Vec<ArticleSummary>,
    #[serde(alias = "important_topics", deserialize_with = "null_as_default")]
    pub important_topics: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadlineSummary {
    #[serde(deserialize_with = "null_as_default")]
    pub headline: String,
    #[serde(deserialize_with = "null_as_default")]
    pub summary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArticleSummary {
    #[serde(deserialize_with = "null_as_default")]
    pub headline: String,
    #[serde(deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(alias = "key_points", deserialize_with = "null_as_default")]
    pub key_points: Vec<String>,
}

/// Read `null` the same way as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Truncate `s` to at most `max_chars` characters, never splitting a code point.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
