//! Stage 1: vision OCR of the processed page.
//!
//! This is the only stage without a fallback. Stages 2 and 3 can always fall
//! back to something derived from the raw text, but without raw text there
//! is nothing to derive from, so any failure here aborts the digest.

use crate::config::PipelineConfig;
use crate::error::DigestError;
use crate::pipeline::llm::{call_model, LanguageModel, ModelRequest};
use crate::prompts::EXTRACT_PROMPT;
use edgequake_llm::ImageData;
use tracing::{error, info};

/// Ask the model to transcribe every piece of Bengali text on the page.
pub async fn extract_text(
    model: &dyn LanguageModel,
    image: &ImageData,
    config: &PipelineConfig,
) -> Result<String, DigestError> {
    let request = ModelRequest::text(EXTRACT_PROMPT, config).with_image(image.clone());

    match call_model(model, request, config).await {
        Ok(reply) => {
            let text = reply.text.trim().to_string();
            info!(
                "Extracted {} chars of text ({} output tokens)",
                text.chars().count(),
                reply.output_tokens
            );
            Ok(text)
        }
        Err(e) => {
            error!("Text extraction failed: {}", e);
            Err(DigestError::Extraction(e))
        }
    }
}
