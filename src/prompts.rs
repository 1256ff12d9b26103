//! Prompts for the three model calls.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — the marker token stage 1 is told to emit
//!    ([`HEADLINE_MARKER`]) is the same constant the regex fallback in
//!    [`crate::pipeline::structure`] scans for.
//!
//! 2. **Testability** — unit tests can inspect prompts directly without
//!    spinning up a real model.

/// Marker stage 1 puts in front of every large-font line.
pub const HEADLINE_MARKER: &str = "HEADLINE:";

/// Marker stage 1 puts in front of every medium-font line.
pub const SUBHEADLINE_MARKER: &str = "SUBHEADLINE:";

/// Stage 1: read every piece of text on the page image.
pub const EXTRACT_PROMPT: &str = r#"You are an expert OCR system for Bengali (Bangla) newspapers. The attached image is a photographed or scanned newspaper page.

Extract ALL text visible on the page, exactly as printed, in Bengali script. Group the text by its visual font size:

1. LARGE TEXT (main headlines)
   - Put each headline on its own line, prefixed with "HEADLINE: "

2. MEDIUM TEXT (sub-headlines, strap lines, section titles)
   - Put each one on its own line, prefixed with "SUBHEADLINE: "

3. BODY TEXT (article paragraphs)
   - Keep paragraphs together, in reading order, directly below the headline they belong to

4. OTHER
   - Include the publication date if it is printed anywhere on the page
   - Ignore advertisements only if they contain no readable text

Output ONLY the extracted text. Do NOT translate. Do NOT add commentary."#;

/// Instruction appended as a system message whenever a call expects JSON.
pub const JSON_ONLY_INSTRUCTION: &str =
    "Respond with a single valid JSON object and nothing else. Do not wrap it in markdown fences.";

/// Stage 2: turn raw extracted text into the `ExtractedData` schema.
pub fn structure_prompt(extracted_text: &str) -> String {
    format!(
        r#"The following text was extracted from a Bengali newspaper page. Lines starting with "HEADLINE:" were printed in a large font and lines starting with "SUBHEADLINE:" in a medium font.

Organise it into this exact JSON structure:
{{
  "date": "publication date if present, otherwise empty string",
  "headlines": ["main headline 1", "main headline 2"],
  "subHeadlines": ["sub-headline 1"],
  "articles": [
    {{
      "headline": "article headline",
      "content": "full article text",
      "category": "politics | economy | sports | international | entertainment | other"
    }}
  ]
}}

Keep all text in Bengali exactly as given. Remove the HEADLINE:/SUBHEADLINE: markers from the values.

TEXT:
"""
{extracted_text}
""""#
    )
}

/// Stage 3: summarise a size-capped projection of the structured data.
///
/// `payload` is the pretty-printed JSON built by
/// [`crate::pipeline::summarize::summary_payload`].
pub fn summary_prompt(payload: &str) -> String {
    format!(
        r#"You are a Bengali news editor. Summarise the newspaper content below IN BENGALI.

Return this exact JSON structure:
{{
  "overallSummary": "3-4 sentence summary of the whole page",
  "headlineSummaries": [
    {{ "headline": "headline text", "summary": "one sentence summary" }}
  ],
  "articleSummaries": [
    {{
      "headline": "article headline",
      "summary": "2-3 sentence summary",
      "keyPoints": ["key point 1", "key point 2"]
    }}
  ],
  "importantTopics": ["topic 1", "topic 2"]
}}

CONTENT:
{payload}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_prompt_names_both_markers() {
        assert!(EXTRACT_PROMPT.contains(HEADLINE_MARKER));
        assert!(EXTRACT_PROMPT.contains(SUBHEADLINE_MARKER));
    }

    #[test]
    fn structure_prompt_embeds_text_and_schema() {
        let p = structure_prompt("HEADLINE: বাজেট");
        assert!(p.contains("HEADLINE: বাজেট"));
        assert!(p.contains("\"subHeadlines\""));
        assert!(p.contains("\"articles\""));
    }

    #[test]
    fn summary_prompt_embeds_payload_and_schema() {
        let p = summary_prompt(r#"{"headlines":[]}"#);
        assert!(p.contains(r#"{"headlines":[]}"#));
        assert!(p.contains("\"keyPoints\""));
        assert!(p.contains("\"importantTopics\""));
    }
}
