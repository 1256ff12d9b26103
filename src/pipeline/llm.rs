//! Model interaction: the seam between the pipeline and the LLM provider.
//!
//! Every stage talks to a [`LanguageModel`] rather than to `edgequake-llm`
//! directly. Production code wraps a provider from `ProviderFactory` in
//! [`ProviderModel`]; tests substitute a scripted double so each stage's
//! failure path can be driven without network access.
//!
//! ## No retries
//!
//! Each call is attempted exactly once. Stages 2 and 3 already have a
//! deterministic fallback, and a retried stage 1 would double the latency of
//! the slowest call in the request.

use crate::config::{PipelineConfig, DEFAULT_PROVIDER};
use crate::error::{DigestError, StageError};
use crate::prompts::JSON_ONLY_INSTRUCTION;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;
use tracing::{debug, info};

/// One completion request.
#[derive(Clone)]
pub struct ModelRequest {
    pub prompt: String,
    /// Page image for vision calls (stage 1 only).
    pub image: Option<ImageData>,
    /// Ask the model for a bare JSON object.
    pub expect_json: bool,
    pub temperature: f32,
    pub max_tokens: usize,
}

impl std::fmt::Debug for ModelRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRequest")
            .field("prompt_chars", &self.prompt.chars().count())
            .field(
                "image",
                &self
                    .image
                    .as_ref()
                    .map(|i| format!("{} ({} bytes base64)", i.mime_type, i.data.len())),
            )
            .field("expect_json", &self.expect_json)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl ModelRequest {
    /// A text-only request using the config's sampling parameters.
    pub fn text(prompt: impl Into<String>, config: &PipelineConfig) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
            expect_json: false,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub fn with_image(mut self, image: ImageData) -> Self {
        self.image = Some(image);
        self
    }

    pub fn json(mut self) -> Self {
        self.expect_json = true;
        self
    }
}

/// The model's answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// A text (and optionally vision) completion backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Identifier used in logs, e.g. `gemini/gemini-2.0-flash`.
    fn name(&self) -> &str;

    /// Run one completion.
    async fn complete(&self, request: ModelRequest) -> Result<ModelReply, StageError>;
}

/// [`LanguageModel`] backed by an `edgequake-llm` provider.
pub struct ProviderModel {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl ProviderModel {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }
}

#[async_trait]
impl LanguageModel for ProviderModel {
    fn name(&self) -> &str {
        &self.label
    }

    async fn complete(&self, request: ModelRequest) -> Result<ModelReply, StageError> {
        let messages = build_messages(&request);
        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| StageError::ModelFailed {
                detail: e.to_string(),
            })?;

        Ok(ModelReply {
            text: response.content,
            input_tokens: response.prompt_tokens as usize,
            output_tokens: response.completion_tokens as usize,
        })
    }
}

/// Message layout: optional JSON-only system message, then the user prompt
/// (with the page image attached for vision calls).
fn build_messages(request: &ModelRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2);
    if request.expect_json {
        messages.push(ChatMessage::system(JSON_ONLY_INSTRUCTION));
    }
    match request.image {
        Some(ref image) => messages.push(ChatMessage::user_with_images(
            request.prompt.as_str(),
            vec![image.clone()],
        )),
        None => messages.push(ChatMessage::user(request.prompt.as_str())),
    }
    messages
}

/// Send one request, honouring `api_timeout_secs`, and reject blank replies.
pub async fn call_model(
    model: &dyn LanguageModel,
    request: ModelRequest,
    config: &PipelineConfig,
) -> Result<ModelReply, StageError> {
    let start = Instant::now();

    let reply = match config.api_timeout_secs {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), model.complete(request))
            .await
            .map_err(|_| StageError::Timeout { secs })??,
        None => model.complete(request).await?,
    };

    debug!(
        "{}: {} input tokens, {} output tokens, {:?}",
        model.name(),
        reply.input_tokens,
        reply.output_tokens,
        start.elapsed()
    );

    if reply.text.trim().is_empty() {
        return Err(StageError::EmptyResponse);
    }
    Ok(reply)
}

/// Resolve the model, from most-specific to least-specific.
///
/// 1. **Pre-built model** (`config.provider`) — used as-is (tests, custom
///    middleware).
/// 2. **Named provider** (`config.provider_name`) — created through
///    [`ProviderFactory::create_llm_provider`], which reads that provider's
///    API key from the environment.
/// 3. **Gemini** when `GEMINI_API_KEY` is set.
/// 4. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_model(config: &PipelineConfig) -> Result<Arc<dyn LanguageModel>, DigestError> {
    if let Some(ref model) = config.provider {
        return Ok(Arc::clone(model));
    }

    let model_id = config.model_or_default();

    if let Some(ref name) = config.provider_name {
        return create_provider_model(name, model_id);
    }

    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        if !key.is_empty() {
            return create_provider_model(DEFAULT_PROVIDER, model_id);
        }
    }

    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| DigestError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY (or another provider's key and --provider).\n\
                Error: {}",
                e
            ),
        })?;

    info!("Auto-detected LLM provider from environment");
    Ok(Arc::new(ProviderModel::new(provider, "auto")))
}

fn create_provider_model(
    provider_name: &str,
    model_id: &str,
) -> Result<Arc<dyn LanguageModel>, DigestError> {
    let provider = ProviderFactory::create_llm_provider(provider_name, model_id).map_err(|e| {
        DigestError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    info!("Using LLM provider {}/{}", provider_name, model_id);
    Ok(Arc::new(ProviderModel::new(
        provider,
        format!("{provider_name}/{model_id}"),
    )))
}


#[cfg(test)]
mod tests {
    use super::test_support::ScriptedModel;
    use super::*;

    #[test]
    fn request_builders() {
        let config = PipelineConfig::default();
        let req = ModelRequest::text("hi", &config).json();
        assert!(req.expect_json);
        assert!(req.image.is_none());
        assert_eq!(req.temperature, 0.1);
        assert_eq!(req.max_tokens, 8192);
    }

    #[test]
    fn json_requests_get_a_system_instruction() {
        let config = PipelineConfig::default();
        assert_eq!(build_messages(&ModelRequest::text("hi", &config)).len(), 1);
        assert_eq!(
            build_messages(&ModelRequest::text("hi", &config).json()).len(),
            2
        );
    }

    #[tokio::test]
    async fn blank_reply_is_an_error() {
        let model = ScriptedModel::new(vec![Ok("   \n".into())]);
        let config = PipelineConfig::default();
        let err = call_model(&model, ModelRequest::text("x", &config), &config)
            .await
            .unwrap_err();
        assert_eq!(err, StageError::EmptyResponse);
    }

    #[tokio::test]
    async fn pre_built_model_wins_resolution() {
        let model: Arc<dyn LanguageModel> = Arc::new(ScriptedModel::new(vec![]));
        let config = PipelineConfig::builder()
            .provider(Arc::clone(&model))
            .build()
            .unwrap();
        let resolved = resolve_model(&config).unwrap();
        assert_eq!(resolved.name(), "scripted");
    }

    struct SlowModel;

    #[async_trait]
    impl LanguageModel for SlowModel {
        fn name(&self) -> &str {
            "slow"
        }

        async fn complete(&self, _request: ModelRequest) -> Result<ModelReply, StageError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(ModelReply::default())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_reported() {
        let config = PipelineConfig::builder().api_timeout_secs(1).build().unwrap();
        let err = call_model(&SlowModel, ModelRequest::text("x", &config), &config)
            .await
            .unwrap_err();
        assert_eq!(err, StageError::Timeout { secs: 1 });
    }
}
