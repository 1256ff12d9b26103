//! Stage 3: summarise structured page content into [`SummaryData`].
//!
//! Only a size-capped projection of the page is sent: the first
//! `summary_input_chars` of `allText`, every headline, and the first
//! `summary_article_limit` articles. On failure a summary is synthesised
//! from the structured data so a document always carries one.

use crate::config::PipelineConfig;
use crate::document::{truncate_chars, ArticleSummary, ExtractedData, HeadlineSummary, SummaryData};
use crate::error::StageError;
use crate::pipeline::llm::{call_model, LanguageModel, ModelRequest};
use crate::pipeline::sanitize::parse_json;
use crate::pipeline::StageOutcome;
use crate::prompts::summary_prompt;
use serde_json::json;
use tracing::{info, warn};

/// Overall summary used when the model could not summarise the page.
pub const FALLBACK_OVERALL_SUMMARY: &str =
    "সংবাদপত্রের বিষয়বস্তু প্রক্রিয়া করা হয়েছে, তবে স্বয়ংক্রিয় সারসংক্ষেপ তৈরি করা যায়নি।";

/// Per-headline placeholder in a synthesised summary.
pub const FALLBACK_HEADLINE_SUMMARY: &str = "বিস্তারিত জানতে মূল সংবাদটি দেখুন।";

/// The JSON payload embedded in the summarising prompt.
pub fn summary_payload(data: &ExtractedData, config: &PipelineConfig) -> String {
    let articles: Vec<_> = data
        .articles
        .iter()
        .take(config.summary_article_limit)
        .collect();
    let payload = json!({
        "allText": truncate_chars(&data.all_text, config.summary_input_chars),
        "headlines": data.headlines,
        "articles": articles,
    });
    format!("{:#}", payload)
}

/// Summarise `data` with the model, synthesising a summary on failure.
pub async fn summarize(
    model: &dyn LanguageModel,
    data: &ExtractedData,
    config: &PipelineConfig,
) -> StageOutcome<SummaryData> {
    let request = ModelRequest::text(summary_prompt(&summary_payload(data, config)), config).json();

    let parsed = match call_model(model, request, config).await {
        Ok(reply) => parse_json::<SummaryData>(&reply.text).map_err(StageError::from),
        Err(e) => Err(e),
    };

    match parsed {
        Ok(summary) => {
            info!(
                "Summarised page: {} headline summaries, {} article summaries",
                summary.headline_summaries.len(),
                summary.article_summaries.len()
            );
            StageOutcome::Produced(summary)
        }
        Err(reason) => {
            warn!("Summarising failed ({}); using synthesised summary", reason);
            StageOutcome::Degraded {
                value: fallback_summary(data, config.fallback_summary_chars),
                reason,
            }
        }
    }
}

/// A deterministic summary built from the structured data alone.
///
/// Article content longer than `clip_chars` is clipped and ends in `…`.
pub fn fallback_summary(data: &ExtractedData, clip_chars: usize) -> SummaryData {
    SummaryData {
        overall_summary: FALLBACK_OVERALL_SUMMARY.to_string(),
        headline_summaries: data
            .headlines
            .iter()
            .map(|h| HeadlineSummary {
                headline: h.clone(),
                summary: FALLBACK_HEADLINE_SUMMARY.to_string(),
            })
            .collect(),
        article_summaries: data
            .articles
            .iter()
            .map(|a| ArticleSummary {
                headline: a.headline.clone(),
                summary: clip(&a.content, clip_chars),
                key_points: Vec::new(),
            })
            .collect(),
        important_topics: Vec::new(),
    }
}

fn clip(text: &str, max_chars: usize) -> String {
    let clipped = truncate_chars(text, max_chars);
    if clipped.len() < text.len() {
        format!("{clipped}…")
    } else {
        clipped.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Article;
    use crate::pipeline::llm::test_support::ScriptedModel;
    use serde_json::Value;

    fn data() -> ExtractedData {
        ExtractedData {
            headlines: vec!["বাজেট ঘোষণা".into(), "ক্রিকেটে জয়".into()],
            articles: (0..5)
                .map(|i| Article {
                    headline: format!("খবর {i}"),
                    content: "অ".repeat(200),
                    category: "other".into(),
                    summary: None,
                })
                .collect(),
            all_text: "ক".repeat(3000),
            ..Default::default()
        }
    }

    #[test]
    fn payload_is_capped() {
        let payload: Value =
            serde_json::from_str(&summary_payload(&data(), &PipelineConfig::default())).unwrap();
        assert_eq!(payload["allText"].as_str().unwrap().chars().count(), 2000);
        assert_eq!(payload["headlines"].as_array().unwrap().len(), 2);
        assert_eq!(payload["articles"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn fallback_clips_article_content() {
        let summary = fallback_summary(&data(), 150);
        assert_eq!(summary.overall_summary, FALLBACK_OVERALL_SUMMARY);
        assert_eq!(summary.headline_summaries.len(), 2);
        assert_eq!(summary.headline_summaries[1].headline, "ক্রিকেটে জয়");
        assert_eq!(summary.article_summaries.len(), 5);

        let first = &summary.article_summaries[0].summary;
        assert_eq!(first.chars().count(), 151);
        assert!(first.ends_with('…'));
        assert!(summary.article_summaries[0].key_points.is_empty());
    }

    #[test]
    fn short_content_is_not_ellipsised() {
        assert_eq!(clip("ছোট", 150), "ছোট");
        assert_eq!(clip("", 150), "");
    }

    #[tokio::test]
    async fn model_summary_is_used() {
        let reply = r#"Here: {"overallSummary":"আজকের খবর","importantTopics":["অর্থনীতি"],
            "articleSummaries":[{"headline":"খবর 0","summary":"সংক্ষেপ","keyPoints":["এক"]}]}"#;
        let model = ScriptedModel::new(vec![Ok(reply.into())]);
        let outcome = summarize(&model, &data(), &PipelineConfig::default()).await;

        assert!(!outcome.is_degraded());
        let summary = outcome.into_value();
        assert_eq!(summary.overall_summary, "আজকের খবর");
        assert_eq!(summary.article_summaries[0].key_points, vec!["এক"]);
        assert!(model.requests.lock().unwrap()[0].expect_json);
    }

    #[tokio::test]
    async fn null_lists_keep_the_model_summary() {
        let reply = r#"{"overallSummary":"আজকের খবর","headlineSummaries":null,
            "articleSummaries":null,"importantTopics":["অর্থনীতি"]}"#;
        let model = ScriptedModel::new(vec![Ok(reply.into())]);
        let outcome = summarize(&model, &data(), &PipelineConfig::default()).await;

        assert!(!outcome.is_degraded(), "{:?}", outcome.reason());
        let summary = outcome.into_value();
        assert_eq!(summary.overall_summary, "আজকের খবর");
        assert!(summary.headline_summaries.is_empty());
        assert_eq!(summary.important_topics, vec!["অর্থনীতি"]);
    }

    #[tokio::test]
    async fn malformed_reply_is_synthesised() {
        let model = ScriptedModel::new(vec![Ok("{\"overallSummary\": ".into())]);
        let outcome = summarize(&model, &data(), &PipelineConfig::default()).await;

        assert!(outcome.is_degraded());
        assert_eq!(
            outcome.value().overall_summary,
            FALLBACK_OVERALL_SUMMARY.to_string()
        );
    }

    #[tokio::test]
    async fn empty_page_still_gets_a_summary() {
        let model = ScriptedModel::new(vec![Err(StageError::Timeout { secs: 5 })]);
        let outcome = summarize(&model, &ExtractedData::default(), &PipelineConfig::default()).await;

        assert_eq!(outcome.reason(), Some(&StageError::Timeout { secs: 5 }));
        let summary = outcome.into_value();
        assert!(!summary.overall_summary.is_empty());
        assert!(summary.headline_summaries.is_empty());
    }
}
