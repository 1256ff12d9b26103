//! Digest entry points: one uploaded page in, one [`Document`] out.
//!
//! [`digest_image`] runs every stage in order and assembles the document the
//! store keeps. Only preprocessing and stage 1 can fail the digest; stages 2
//! and 3 degrade to deterministic fallbacks, and the outcome of each is
//! reported on [`DigestOutput`] alongside the document.

use crate::config::PipelineConfig;
use crate::document::{
    truncate_chars, Document, DocumentStatus, SummaryData, LANGUAGE_BENGALI,
};
use crate::error::{DigestError, StageError};
use crate::pipeline::llm::LanguageModel;
use crate::pipeline::{encode, extract, input, preprocess, structure, summarize, StageOutcome};
use crate::progress::{DigestProgressCallback, Stage};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// An image already stored on disk, ready to digest.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    /// Where the original image lives.
    pub path: PathBuf,
    /// Stored file name (inside the upload directory).
    pub filename: String,
    /// Name the client uploaded the file under.
    pub original_name: String,
}

/// Wall-clock timings of one digest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DigestStats {
    pub preprocess_ms: u64,
    /// Time spent across the three model calls.
    pub model_ms: u64,
    pub total_ms: u64,
}

/// A digested page plus how each degradable stage went.
#[derive(Debug, Clone)]
pub struct DigestOutput {
    pub document: Document,
    /// Why structuring fell back, if it did.
    pub structure_fallback: Option<StageError>,
    /// Why summarising fell back, if it did.
    pub summary_fallback: Option<StageError>,
    pub stats: DigestStats,
}

impl DigestOutput {
    /// True when the summary came from the model rather than the fallback.
    pub fn summary_generated(&self) -> bool {
        self.summary_fallback.is_none()
    }
}

static LAST_ID: AtomicI64 = AtomicI64::new(0);

/// A millisecond-timestamp id, strictly increasing within the process.
///
/// Two uploads in the same millisecond get consecutive values instead of
/// colliding.
pub fn next_document_id() -> String {
    let now = Utc::now().timestamp_millis();
    let previous = LAST_ID
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or(now);
    now.max(previous + 1).to_string()
}

/// Digest one stored page image.
///
/// # Errors
/// Returns `Err(DigestError)` only when the image cannot be preprocessed or
/// the model cannot read it. Structuring and summarising failures are
/// recovered and reported through [`DigestOutput`].
pub async fn digest_image(
    upload: &UploadedImage,
    model: &dyn LanguageModel,
    config: &PipelineConfig,
) -> Result<DigestOutput, DigestError> {
    let total_start = Instant::now();
    let progress = config.progress_callback.as_deref();
    info!("Digesting {} ({})", upload.original_name, upload.path.display());

    // ── Step 1: Preprocess ───────────────────────────────────────────────
    notify(progress, |cb| cb.on_stage_start(Stage::Preprocess));
    let preprocess_start = Instant::now();
    let processed_path = preprocess::preprocess_image(&upload.path, config).await?;
    let preprocess_ms = preprocess_start.elapsed().as_millis() as u64;
    notify(progress, |cb| cb.on_stage_complete(Stage::Preprocess, 0));
    debug!("Preprocessed in {}ms", preprocess_ms);

    // ── Step 2: Encode ───────────────────────────────────────────────────
    let image = encode::encode_image_file(&processed_path).await?;

    // ── Step 3: Extract (fatal on failure) ───────────────────────────────
    let model_start = Instant::now();
    notify(progress, |cb| cb.on_stage_start(Stage::Extract));
    let text = extract::extract_text(model, &image, config).await?;
    notify(progress, |cb| {
        cb.on_stage_complete(Stage::Extract, text.chars().count())
    });

    // ── Step 4: Structure (degrades to marker scan) ──────────────────────
    notify(progress, |cb| cb.on_stage_start(Stage::Structure));
    let structured = structure::structure_text(model, &text, config).await;
    report(progress, Stage::Structure, &structured, |d| {
        d.all_text.chars().count()
    });
    let structure_fallback = structured.reason().cloned();
    let extracted_data = structured.into_value();

    // ── Step 5: Summarise (degrades to synthesised summary) ──────────────
    notify(progress, |cb| cb.on_stage_start(Stage::Summarize));
    let summarised = summarize::summarize(model, &extracted_data, config).await;
    report(progress, Stage::Summarize, &summarised, |s| {
        s.overall_summary.chars().count()
    });
    let summary_fallback = summarised.reason().cloned();
    let summary_data = summarised.into_value();
    let model_ms = model_start.elapsed().as_millis() as u64;

    // ── Step 6: Assemble ─────────────────────────────────────────────────
    let method = extracted_data.extraction_method;
    let document = Document {
        id: next_document_id(),
        filename: upload.filename.clone(),
        original_name: upload.original_name.clone(),
        image_path: upload.path.clone(),
        processed_image_path: processed_path,
        upload_date: Utc::now(),
        extracted_data,
        summary_data,
        raw_extracted_text: truncate_chars(&text, config.raw_text_limit).to_string(),
        status: DocumentStatus::Processed,
        language: LANGUAGE_BENGALI.to_string(),
    };

    let stats = DigestStats {
        preprocess_ms,
        model_ms,
        total_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Digest complete: id={} method={} headlines={} in {}ms",
        document.id,
        method,
        document.headlines_count(),
        stats.total_ms
    );
    notify(progress, |cb| cb.on_digest_complete(method));

    Ok(DigestOutput {
        document,
        structure_fallback,
        summary_fallback,
        stats,
    })
}

/// Re-run stage 3 on a stored document's extracted data.
pub async fn regenerate_summary(
    document: &Document,
    model: &dyn LanguageModel,
    config: &PipelineConfig,
) -> StageOutcome<SummaryData> {
    info!("Regenerating summary for document {}", document.id);
    let progress = config.progress_callback.as_deref();
    notify(progress, |cb| cb.on_stage_start(Stage::Summarize));
    let outcome = summarize::summarize(model, &document.extracted_data, config).await;
    report(progress, Stage::Summarize, &outcome, |s| {
        s.overall_summary.chars().count()
    });
    outcome
}

/// Digest a local image path or HTTP(S) URL without touching the caller's
/// directory.
///
/// The image is staged into a scratch directory, so the processed JPEG is
/// not written next to the caller's file. The returned document's paths
/// point into that directory, which is removed on return.
pub async fn digest_input(
    input_str: &str,
    download_timeout_secs: u64,
    model: &dyn LanguageModel,
    config: &PipelineConfig,
) -> Result<DigestOutput, DigestError> {
    let resolved = input::resolve_input(input_str, download_timeout_secs).await?;
    let scratch = tempfile::tempdir().map_err(|e| DigestError::Internal(format!("tempdir: {e}")))?;

    let original_name = file_name_of(resolved.path());
    let staged = scratch.path().join(&original_name);
    tokio::fs::copy(resolved.path(), &staged)
        .await
        .map_err(|e| DigestError::Io {
            path: resolved.path().to_path_buf(),
            source: e,
        })?;

    let upload = UploadedImage {
        path: staged,
        filename: original_name.clone(),
        original_name,
    };
    digest_image(&upload, model, config).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn notify(progress: Option<&dyn DigestProgressCallback>, event: impl FnOnce(&dyn DigestProgressCallback)) {
    if let Some(cb) = progress {
        event(cb);
    }
}

fn report<T>(
    progress: Option<&dyn DigestProgressCallback>,
    stage: Stage,
    outcome: &StageOutcome<T>,
    output_len: impl FnOnce(&T) -> usize,
) {
    let Some(cb) = progress else { return };
    match outcome {
        StageOutcome::Produced(value) => cb.on_stage_complete(stage, output_len(value)),
        StageOutcome::Degraded { reason, .. } => cb.on_stage_degraded(stage, &reason.to_string()),
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "page.jpg".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ExtractionMethod;
    use crate::pipeline::llm::test_support::ScriptedModel;
    use image::{Rgb, RgbImage};
    use std::sync::{Arc, Mutex};

    fn stored_page(dir: &Path) -> UploadedImage {
        let path = dir.join("100-page.png");
        RgbImage::from_fn(64, 32, |x, y| {
            let v = ((x * 3 + y) % 200) as u8 + 30;
            Rgb([v, v, v])
        })
        .save(&path)
        .unwrap();
        UploadedImage {
            path,
            filename: "100-page.png".into(),
            original_name: "page.png".into(),
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl DigestProgressCallback for Recorder {
        fn on_stage_start(&self, stage: Stage) {
            self.0.lock().unwrap().push(format!("start:{stage}"));
        }
        fn on_stage_degraded(&self, stage: Stage, _reason: &str) {
            self.0.lock().unwrap().push(format!("degraded:{stage}"));
        }
        fn on_digest_complete(&self, method: ExtractionMethod) {
            self.0.lock().unwrap().push(format!("done:{method}"));
        }
    }

    #[test]
    fn ids_are_strictly_increasing() {
        let ids: Vec<i64> = (0..100)
            .map(|_| next_document_id().parse().unwrap())
            .collect();
        assert!(ids.windows(2).all(|w| w[1] > w[0]));
    }

    #[tokio::test]
    async fn full_pipeline_with_model_output() {
        let dir = tempfile::tempdir().unwrap();
        let upload = stored_page(dir.path());
        let model = ScriptedModel::new(vec![
            Ok("HEADLINE: বাজেট ঘোষণা\nবিস্তারিত".into()),
            Ok(r#"{"headlines":["বাজেট ঘোষণা"],"articles":[{"headline":"বাজেট ঘোষণা","content":"বিস্তারিত"}]}"#.into()),
            Ok(r#"{"overallSummary":"বাজেট","importantTopics":["অর্থনীতি"]}"#.into()),
        ]);

        let out = digest_image(&upload, &model, &PipelineConfig::default())
            .await
            .unwrap();

        let doc = &out.document;
        assert_eq!(doc.extracted_data.extraction_method, ExtractionMethod::AiStructured);
        assert_eq!(doc.extracted_data.headlines, vec!["বাজেট ঘোষণা"]);
        assert_eq!(doc.summary_data.overall_summary, "বাজেট");
        assert_eq!(doc.raw_extracted_text, "HEADLINE: বাজেট ঘোষণা\nবিস্তারিত");
        assert_eq!(doc.original_name, "page.png");
        assert_eq!(doc.language, LANGUAGE_BENGALI);
        assert!(doc.processed_image_path.exists());
        assert!(out.summary_generated());
        assert!(out.structure_fallback.is_none());
    }

    #[tokio::test]
    async fn degraded_stages_still_produce_a_document() {
        let dir = tempfile::tempdir().unwrap();
        let upload = stored_page(dir.path());
        let recorder = Arc::new(Recorder::default());
        let config = PipelineConfig::builder()
            .progress_callback(recorder.clone())
            .raw_text_limit(10)
            .build()
            .unwrap();
        let model = ScriptedModel::new(vec![
            Ok("HEADLINE: প্রথম খবর\nHEADLINE: দ্বিতীয় খবর\nবডি".into()),
            Ok("no json here".into()),
            Err(StageError::ModelFailed {
                detail: "quota".into(),
            }),
        ]);

        let out = digest_image(&upload, &model, &config).await.unwrap();

        let doc = &out.document;
        assert_eq!(doc.extracted_data.extraction_method, ExtractionMethod::RegexFallback);
        assert_eq!(doc.extracted_data.headlines, vec!["প্রথম খবর", "দ্বিতীয় খবর"]);
        assert_eq!(doc.summary_data.headline_summaries.len(), 2);
        assert_eq!(doc.raw_extracted_text.chars().count(), 10);
        assert!(!out.summary_generated());

        let events = recorder.0.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "start:preprocess",
                "start:extract",
                "start:structure",
                "degraded:structure",
                "start:summarize",
                "degraded:summarize",
                "done:regex_fallback",
            ]
        );
    }

    #[tokio::test]
    async fn extraction_failure_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let upload = stored_page(dir.path());
        let model = ScriptedModel::new(vec![Err(StageError::Timeout { secs: 30 })]);

        let err = digest_image(&upload, &model, &PipelineConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DigestError::Extraction(_)));
        assert_eq!(model.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn regenerate_only_runs_stage_three() {
        let dir = tempfile::tempdir().unwrap();
        let upload = stored_page(dir.path());
        let model = ScriptedModel::new(vec![
            Ok("শুধু বডি".into()),
            Ok("{}".into()),
            Ok("{}".into()),
            Ok(r#"{"overallSummary":"নতুন"}"#.into()),
        ]);
        let config = PipelineConfig::default();
        let doc = digest_image(&upload, &model, &config).await.unwrap().document;

        let outcome = regenerate_summary(&doc, &model, &config).await;
        assert_eq!(outcome.into_value().overall_summary, "নতুন");
        assert_eq!(model.requests.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn digest_input_leaves_caller_directory_clean() {
        let dir = tempfile::tempdir().unwrap();
        let upload = stored_page(dir.path());
        let model = ScriptedModel::new(vec![Ok("HEADLINE: ক".into())]);

        let out = digest_input(upload.path.to_str().unwrap(), 5, &model, &PipelineConfig::default())
            .await
            .unwrap();

        assert_eq!(out.document.original_name, "100-page.png");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
