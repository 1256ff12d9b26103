//! Route handlers.

use super::error::ApiError;
use super::state::AppState;
use crate::digest::{self, next_document_id, UploadedImage};
use crate::document::{Document, ExtractionMethod, SummaryData};
use crate::pipeline::input::sniff_image;
use crate::pipeline::preprocess::processed_path_for;
use crate::store::remove_backing_files;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Multipart field carrying the page image.
pub const UPLOAD_FIELD: &str = "newspaper";

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/upload", post(upload))
        .route("/documents", get(list_documents))
        .route("/documents/:id", get(get_document).delete(delete_document))
        .route("/documents/:id/summary", get(get_summary))
        .route("/documents/:id/generate-summary", post(generate_summary))
        .route("/search", get(search))
        .nest_service("/uploads", ServeDir::new(state.upload_dir()))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub document: Document,
    pub message: String,
    pub headlines_found: usize,
    pub summaries_generated: bool,
    pub extraction_method: ExtractionMethod,
    pub overall_summary: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryView {
    pub id: String,
    pub original_name: String,
    pub upload_date: DateTime<Utc>,
    pub summary_data: SummaryData,
    pub headlines_count: usize,
    pub articles_count: usize,
}

impl From<&Document> for SummaryView {
    fn from(d: &Document) -> Self {
        Self {
            id: d.id.clone(),
            original_name: d.original_name.clone(),
            upload_date: d.upload_date,
            summary_data: d.summary_data.clone(),
            headlines_count: d.headlines_count(),
            articles_count: d.articles_count(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerateResponse {
    pub success: bool,
    pub summary_data: SummaryData,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// POST /upload
///
/// Store the image, run the full pipeline, keep the document.
async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        debug!(
            "Received field: name='{}', filename={:?}, content_type={:?}",
            name,
            field.file_name(),
            field.content_type()
        );
        if name != UPLOAD_FIELD {
            continue;
        }

        let original_name = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| "newspaper.jpg".to_string());
        let content_type = field.content_type().unwrap_or("").to_string();
        if !content_type.starts_with("image/") {
            return Err(ApiError::bad_request(
                "Only image files are allowed",
                format!("'{original_name}' has content type '{content_type}'"),
            ));
        }

        let data = field.bytes().await?;
        if data.is_empty() {
            return Err(ApiError::bad_request(
                "No file uploaded",
                format!("'{original_name}' is empty"),
            ));
        }
        if sniff_image(&data).is_none() {
            return Err(ApiError::bad_request(
                "Only image files are allowed",
                format!("'{original_name}' is not a recognised image format"),
            ));
        }

        let filename = stored_file_name(&next_document_id(), &original_name);
        let path = state.upload_dir().join(&filename);
        tokio::fs::write(&path, &data).await?;
        info!(
            "Stored upload '{}' as {} ({} bytes)",
            original_name,
            path.display(),
            data.len()
        );

        let upload = UploadedImage {
            path,
            filename,
            original_name,
        };
        // Removes both files on error or if the client goes away mid-pipeline.
        let guard = UploadGuard::new(&upload);
        let output = digest::digest_image(&upload, state.model(), state.pipeline()).await?;

        let document = output.document.clone();
        state.store().insert(output.document).await;
        guard.keep();

        return Ok(Json(UploadResponse {
            success: true,
            message: "Newspaper processed successfully".to_string(),
            headlines_found: document.headlines_count(),
            summaries_generated: output.summary_fallback.is_none(),
            extraction_method: document.extracted_data.extraction_method,
            overall_summary: document.summary_data.overall_summary.clone(),
            document,
        }));
    }

    Err(ApiError::bad_request(
        "No file uploaded",
        format!("Expected an image in multipart field '{UPLOAD_FIELD}'"),
    ))
}

/// GET /documents
async fn list_documents(State(state): State<AppState>) -> Json<Vec<Document>> {
    Json(state.store().list().await)
}

/// GET /documents/:id
async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Document>, ApiError> {
    state
        .store()
        .get(&id)
        .await
        .map(Json)
        .ok_or(ApiError::NotFound(id))
}

/// GET /documents/:id/summary
async fn get_summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SummaryView>, ApiError> {
    let document = state.store().get(&id).await.ok_or(ApiError::NotFound(id))?;
    Ok(Json(SummaryView::from(&document)))
}

/// POST /documents/:id/generate-summary
///
/// Re-runs the summarising stage only; the rest of the document is kept.
async fn generate_summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RegenerateResponse>, ApiError> {
    let document = state
        .store()
        .get(&id)
        .await
        .ok_or_else(|| ApiError::NotFound(id.clone()))?;

    let outcome = digest::regenerate_summary(&document, state.model(), state.pipeline()).await;
    let message = match outcome.reason() {
        None => "Summary regenerated successfully".to_string(),
        Some(reason) => format!("Summary regenerated from extracted text ({reason})"),
    };

    let updated = state
        .store()
        .replace_summary(&id, outcome.into_value())
        .await
        .ok_or(ApiError::NotFound(id))?;

    Ok(Json(RegenerateResponse {
        success: true,
        summary_data: updated.summary_data,
        message,
    }))
}

/// DELETE /documents/:id
async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let document = state
        .store()
        .remove(&id)
        .await
        .ok_or_else(|| ApiError::NotFound(id.clone()))?;
    remove_backing_files(&document).await;
    info!("Deleted document {}", id);

    Ok(Json(DeleteResponse {
        success: true,
        message: format!("Document {id} deleted"),
    }))
}

/// GET /search?q=
async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<Vec<Document>> {
    match params.q {
        Some(q) => Json(state.store().search(&q).await),
        None => Json(Vec::new()),
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// `<prefix>-<name>` with everything outside `[A-Za-z0-9._-]` replaced.
pub fn stored_file_name(prefix: &str, original_name: &str) -> String {
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        format!("{prefix}-upload")
    } else {
        format!("{prefix}-{cleaned}")
    }
}

/// Owns the files of an upload until its document is stored.
///
/// Dropping the guard without [`UploadGuard::keep`] removes the original and
/// the processed image.
struct UploadGuard {
    paths: Option<[PathBuf; 2]>,
}

impl UploadGuard {
    fn new(upload: &UploadedImage) -> Self {
        let processed = processed_path_for(&upload.path);
        Self {
            paths: Some([upload.path.clone(), processed]),
        }
    }

    fn keep(mut self) {
        self.paths = None;
    }
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        let Some(paths) = self.paths.take() else {
            return;
        };
        for path in &paths {
            match std::fs::remove_file(path) {
                Ok(()) => debug!("Discarded {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Could not remove {}: {}", path.display(), e),
            }
        }
    }
}
