//! Configuration types for the digest pipeline.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. The HTTP server and the CLI both construct
//! one and share it across requests behind an `Arc`.

use crate::error::DigestError;
use crate::pipeline::llm::LanguageModel;
use crate::progress::ProgressCallback;
use std::fmt;
use std::sync::Arc;

/// Default Gemini model for all three stages.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Default provider name passed to `ProviderFactory`.
pub const DEFAULT_PROVIDER: &str = "gemini";

/// Configuration for digesting one newspaper page.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use patrika::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .model("gemini-2.5-pro")
///     .max_width(1600)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_width, 1600);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// LLM model identifier. If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai"). If None, uses [`DEFAULT_PROVIDER`]
    /// when `GEMINI_API_KEY` is set, otherwise auto-detects.
    pub provider_name: Option<String>,

    /// Pre-constructed model. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LanguageModel>>,

    /// Sampling temperature for every call. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate per call. Default: 8192.
    ///
    /// A dense broadsheet page transcribes to several thousand Bengali
    /// tokens; too low a cap silently truncates stage 1.
    pub max_tokens: usize,

    /// Per-call timeout in seconds. Default: None (wait indefinitely).
    pub api_timeout_secs: Option<u64>,

    /// Maximum width of the processed image in pixels. Default: 2000.
    pub max_width: u32,

    /// Gamma applied after level normalisation. Default: 1.2.
    pub gamma: f32,

    /// Brightness offset added to every channel. Default: 10.
    pub brightness: i32,

    /// Contrast adjustment in percent. Default: 15.0.
    pub contrast: f32,

    /// Unsharp-mask sigma. Default: 1.0.
    pub sharpen_sigma: f32,

    /// JPEG quality of the processed image (1–100). Default: 95.
    pub jpeg_quality: u8,

    /// Characters of extracted text sent to the structuring call. Default: 4000.
    pub structure_input_chars: usize,

    /// Characters of `allText` sent to the summarising call. Default: 2000.
    pub summary_input_chars: usize,

    /// Articles sent to the summarising call. Default: 3.
    pub summary_article_limit: usize,

    /// Characters of article content kept in a fallback summary. Default: 150.
    pub fallback_summary_chars: usize,

    /// Characters of stage-1 text kept on the document. Default: 5000.
    pub raw_text_limit: usize,

    /// Optional stage progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 8192,
            api_timeout_secs: None,
            max_width: 2000,
            gamma: 1.2,
            brightness: 10,
            contrast: 15.0,
            sharpen_sigma: 1.0,
            jpeg_quality: 95,
            structure_input_chars: 4000,
            summary_input_chars: 2000,
            summary_article_limit: 3,
            fallback_summary_chars: 150,
            raw_text_limit: 5000,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|p| p.name().to_string()))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_width", &self.max_width)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("structure_input_chars", &self.structure_input_chars)
            .field("summary_input_chars", &self.summary_input_chars)
            .field("summary_article_limit", &self.summary_article_limit)
            .field("raw_text_limit", &self.raw_text_limit)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model id to request, falling back to [`DEFAULT_MODEL`].
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`PipelineConfig`].
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl fmt::Debug for PipelineConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl PipelineConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LanguageModel>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    pub fn max_width(mut self, px: u32) -> Self {
        self.config.max_width = px.max(100);
        self
    }

    pub fn gamma(mut self, gamma: f32) -> Self {
        self.config.gamma = gamma;
        self
    }

    pub fn brightness(mut self, offset: i32) -> Self {
        self.config.brightness = offset.clamp(-255, 255);
        self
    }

    pub fn contrast(mut self, percent: f32) -> Self {
        self.config.contrast = percent;
        self
    }

    pub fn sharpen_sigma(mut self, sigma: f32) -> Self {
        self.config.sharpen_sigma = sigma.max(0.0);
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q;
        self
    }

    pub fn structure_input_chars(mut self, n: usize) -> Self {
        self.config.structure_input_chars = n;
        self
    }

    pub fn summary_input_chars(mut self, n: usize) -> Self {
        self.config.summary_input_chars = n;
        self
    }

    pub fn summary_article_limit(mut self, n: usize) -> Self {
        self.config.summary_article_limit = n;
        self
    }

    pub fn fallback_summary_chars(mut self, n: usize) -> Self {
        self.config.fallback_summary_chars = n;
        self
    }

    pub fn raw_text_limit(mut self, n: usize) -> Self {
        self.config.raw_text_limit = n;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, DigestError> {
        let c = &self.config;
        if c.jpeg_quality == 0 || c.jpeg_quality > 100 {
            return Err(DigestError::InvalidConfig(format!(
                "JPEG quality must be 1–100, got {}",
                c.jpeg_quality
            )));
        }
        if !(c.gamma.is_finite() && c.gamma > 0.0) {
            return Err(DigestError::InvalidConfig(format!(
                "Gamma must be a positive number, got {}",
                c.gamma
            )));
        }
        if c.structure_input_chars == 0 || c.summary_input_chars == 0 {
            return Err(DigestError::InvalidConfig(
                "Model input caps must be ≥ 1 character".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(DigestError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}
