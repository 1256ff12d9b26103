//! Stage 2: turn raw extracted text into [`ExtractedData`].
//!
//! The model is asked for the schema as JSON; its reply goes through the
//! sanitizer. When the call fails or the JSON cannot be recovered, headlines
//! are recovered from the `HEADLINE:` markers stage 1 was told to emit.

use crate::config::PipelineConfig;
use crate::document::{truncate_chars, ExtractedData, ExtractionMethod, LANGUAGE_BENGALI};
use crate::error::StageError;
use crate::pipeline::llm::{call_model, LanguageModel, ModelRequest};
use crate::pipeline::sanitize::parse_json;
use crate::pipeline::StageOutcome;
use crate::prompts::structure_prompt;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

/// A marker line, tolerating markdown bold / heading decoration around it.
/// Group 1 is present for sub-headlines, group 2 holds the text.
static RE_MARKER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mR)(SUB)?HEADLINE:[ \t*_]*(.+?)[ \t*_]*$").unwrap());

/// Structure `text` with the model, falling back to marker scanning.
pub async fn structure_text(
    model: &dyn LanguageModel,
    text: &str,
    config: &PipelineConfig,
) -> StageOutcome<ExtractedData> {
    let input = truncate_chars(text, config.structure_input_chars);
    let request = ModelRequest::text(structure_prompt(input), config).json();

    let parsed = match call_model(model, request, config).await {
        Ok(reply) => parse_json::<ExtractedData>(&reply.text).map_err(StageError::from),
        Err(e) => Err(e),
    };

    match parsed {
        Ok(mut data) => {
            data.all_text = text.to_string();
            data.language = LANGUAGE_BENGALI.to_string();
            data.extraction_method = ExtractionMethod::AiStructured;
            info!(
                "Structured page: {} headlines, {} articles",
                data.headlines.len(),
                data.articles.len()
            );
            StageOutcome::Produced(data)
        }
        Err(reason) => {
            let value = marker_fallback(text);
            warn!(
                "Structuring failed ({}); {} with {} headlines",
                reason,
                value.extraction_method,
                value.headlines.len()
            );
            StageOutcome::Degraded { value, reason }
        }
    }
}

/// Build [`ExtractedData`] from marker lines alone.
///
/// `regex_fallback` when at least one headline was found, `fallback` with
/// empty lists otherwise. `allText` is always the full text.
pub fn marker_fallback(text: &str) -> ExtractedData {
    let (headlines, sub_headlines) = scan_markers(text);
    let extraction_method = if headlines.is_empty() {
        ExtractionMethod::Fallback
    } else {
        ExtractionMethod::RegexFallback
    };
    ExtractedData {
        sub_headlines: if headlines.is_empty() {
            Vec::new()
        } else {
            sub_headlines
        },
        headlines,
        all_text: text.to_string(),
        language: LANGUAGE_BENGALI.to_string(),
        extraction_method,
        ..Default::default()
    }
}

/// Headlines and sub-headlines in page order.
pub fn scan_markers(text: &str) -> (Vec<String>, Vec<String>) {
    let mut headlines = Vec::new();
    let mut sub_headlines = Vec::new();
    for caps in RE_MARKER_LINE.captures_iter(text) {
        let Some(value) = caps.get(2).map(|m| m.as_str().trim()) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }
        if caps.get(1).is_some() {
            sub_headlines.push(value.to_string());
        } else {
            headlines.push(value.to_string());
        }
    }
    (headlines, sub_headlines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::test_support::ScriptedModel;

    const PAGE: &str = "১২ মার্চ ২০২৪\n\
        HEADLINE: বাজেট ঘোষণা\n\
        SUBHEADLINE: নতুন কর নীতি\n\
        বাজেটের বিস্তারিত...\n\
        **HEADLINE: ক্রিকেটে জয়**\n\
        ## HEADLINE: বৃষ্টির পূর্বাভাস\n";

    #[test]
    fn scans_decorated_markers() {
        let (h, s) = scan_markers(PAGE);
        assert_eq!(h, vec!["বাজেট ঘোষণা", "ক্রিকেটে জয়", "বৃষ্টির পূর্বাভাস"]);
        assert_eq!(s, vec!["নতুন কর নীতি"]);
    }

    #[test]
    fn empty_marker_is_skipped() {
        let (h, _) = scan_markers("HEADLINE:\nHEADLINE:   \r\nHEADLINE: ক\r\n");
        assert_eq!(h, vec!["ক"]);
    }

    #[test]
    fn no_markers_is_plain_fallback() {
        let data = marker_fallback("শুধু বডি টেক্সট");
        assert_eq!(data.extraction_method, ExtractionMethod::Fallback);
        assert!(data.headlines.is_empty());
        assert!(data.sub_headlines.is_empty());
        assert!(data.articles.is_empty());
        assert_eq!(data.all_text, "শুধু বডি টেক্সট");
        assert_eq!(data.language, LANGUAGE_BENGALI);
    }

    #[tokio::test]
    async fn model_json_is_used_and_stamped() {
        let reply = r#"```json
{"date":"১২ মার্চ","headlines":["বাজেট ঘোষণা"],"subHeadlines":[],
 "articles":[{"headline":"বাজেট ঘোষণা","content":"বিস্তারিত","category":"economy"}]}
```"#;
        let model = ScriptedModel::new(vec![Ok(reply.into())]);
        let outcome = structure_text(&model, PAGE, &PipelineConfig::default()).await;

        assert!(!outcome.is_degraded());
        let data = outcome.into_value();
        assert_eq!(data.extraction_method, ExtractionMethod::AiStructured);
        assert_eq!(data.headlines, vec!["বাজেট ঘোষণা"]);
        assert_eq!(data.articles[0].category, "economy");
        assert_eq!(data.all_text, PAGE);
        assert_eq!(data.language, LANGUAGE_BENGALI);
    }

    #[tokio::test]
    async fn null_fields_keep_the_model_structure() {
        let reply = r#"{"date": null, "headlines":["বাজেট"], "subHeadlines": null,
            "articles":[{"headline":"বাজেট","content":"বিস্তারিত","category":null}]}"#;
        let model = ScriptedModel::new(vec![Ok(reply.into())]);
        let outcome = structure_text(&model, PAGE, &PipelineConfig::default()).await;

        assert!(!outcome.is_degraded(), "{:?}", outcome.reason());
        let data = outcome.into_value();
        assert_eq!(data.extraction_method, ExtractionMethod::AiStructured);
        assert_eq!(data.headlines, vec!["বাজেট"]);
        assert_eq!(data.date, "");
        assert_eq!(data.articles[0].category, "");
    }

    #[tokio::test]
    async fn prose_reply_degrades_to_regex() {
        let model = ScriptedModel::new(vec![Ok("Sorry, I cannot do that.".into())]);
        let outcome = structure_text(&model, PAGE, &PipelineConfig::default()).await;

        assert!(matches!(
            outcome.reason(),
            Some(StageError::Unparseable { .. })
        ));
        let data = outcome.into_value();
        assert_eq!(data.extraction_method, ExtractionMethod::RegexFallback);
        assert_eq!(data.headlines.len(), 3);
        assert_eq!(data.sub_headlines, vec!["নতুন কর নীতি"]);
    }

    #[tokio::test]
    async fn model_error_without_markers_is_fallback() {
        let model = ScriptedModel::new(vec![Err(StageError::ModelFailed {
            detail: "503".into(),
        })]);
        let outcome = structure_text(&model, "কিছু লেখা", &PipelineConfig::default()).await;

        assert!(outcome.is_degraded());
        let data = outcome.into_value();
        assert_eq!(data.extraction_method, ExtractionMethod::Fallback);
        assert!(data.headlines.is_empty());
    }

    #[tokio::test]
    async fn prompt_input_is_capped_but_all_text_is_not() {
        let long = "ক".repeat(50);
        let model = ScriptedModel::new(vec![Ok(r#"{"headlines":["h"]}"#.into())]);
        let config = PipelineConfig::builder()
            .structure_input_chars(10)
            .build()
            .unwrap();
        let data = structure_text(&model, &long, &config).await.into_value();

        let prompt = model.requests.lock().unwrap()[0].prompt.clone();
        assert!(prompt.contains(&"ক".repeat(10)));
        assert!(!prompt.contains(&"ক".repeat(11)));
        assert_eq!(data.all_text.chars().count(), 50);
    }
}
