//! # patrika
//!
//! Digest photographed Bengali newspaper pages with Vision Language Models.
//!
//! ## Why this crate?
//!
//! Classical OCR engines struggle with Bengali conjuncts, multi-column
//! broadsheet layouts and phone-camera photos. This crate normalises the
//! photo and lets a vision model read it, then asks the model to organise
//! the text into headlines and articles and to summarise them. Every step
//! after the read degrades to a deterministic result instead of failing.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image
//!  │
//!  ├─ 1. Preprocess  resize, levels, gamma, contrast, sharpen (spawn_blocking)
//!  ├─ 2. Encode      JPEG → base64 ImageData
//!  ├─ 3. Extract     vision call, raw Bengali text          (fatal on failure)
//!  ├─ 4. Structure   JSON headlines/articles      → HEADLINE: marker fallback
//!  ├─ 5. Summarise   JSON summaries               → synthesised fallback
//!  └─ 6. Store       in-memory document store, CRUD + search over HTTP
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use patrika::{digest_input, resolve_model, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Gemini is used when GEMINI_API_KEY is set
//!     let config = PipelineConfig::default();
//!     let model = resolve_model(&config)?;
//!     let output = digest_input("front-page.jpg", 120, model.as_ref(), &config).await?;
//!     for headline in &output.document.extracted_data.headlines {
//!         println!("• {headline}");
//!     }
//!     println!("{}", output.document.summary_data.overall_summary);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `patrika` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when embedding only the library or the router:
//! ```toml
//! patrika = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod digest;
pub mod document;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod server;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder, DEFAULT_MODEL, DEFAULT_PROVIDER};
pub use digest::{digest_image, digest_input, regenerate_summary, DigestOutput, DigestStats, UploadedImage};
pub use document::{
    Article, ArticleSummary, Document, DocumentStatus, ExtractedData, ExtractionMethod,
    HeadlineSummary, SummaryData,
};
pub use error::{DigestError, StageError};
pub use pipeline::llm::{resolve_model, LanguageModel, ModelReply, ModelRequest, ProviderModel};
pub use pipeline::StageOutcome;
pub use progress::{DigestProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
pub use server::{router, serve, AppState, ServerConfig};
pub use store::DocumentStore;
