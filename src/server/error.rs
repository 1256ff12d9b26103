//! HTTP error mapping.
//!
//! Every failed request answers with `{ "error": <short message>,
//! "details": <cause> }` and a 400, 404, 413 or 500 status.

use crate::error::DigestError;
use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Errors a handler can return.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{error}: {details}")]
    BadRequest { error: String, details: String },

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Invalid multipart upload: {0}")]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    Digest(#[from] DigestError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub fn bad_request(error: impl Into<String>, details: impl Into<String>) -> Self {
        ApiError::BadRequest {
            error: error.into(),
            details: details.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Multipart(e) => e.status(),
            ApiError::Digest(DigestError::NotAnImage { .. })
            | ApiError::Digest(DigestError::InvalidInput { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Digest(_) | ApiError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error, details) = match &self {
            ApiError::BadRequest { error, details } => (error.clone(), details.clone()),
            ApiError::NotFound(id) => ("Document not found".to_string(), format!("No document with id '{id}'")),
            ApiError::Multipart(e) => ("Invalid upload".to_string(), e.body_text()),
            ApiError::Digest(DigestError::Extraction(e)) => {
                ("Failed to extract text from image".to_string(), e.to_string())
            }
            ApiError::Digest(e) => ("Failed to process newspaper".to_string(), e.to_string()),
            ApiError::Io(e) => ("Storage error".to_string(), e.to_string()),
        };

        if status.is_server_error() {
            tracing::error!("{} ({}): {}", error, status, details);
        } else {
            tracing::warn!("{} ({}): {}", error, status, details);
        }

        (status, Json(ErrorResponse { error, details })).into_response()
    }
}

/// Start-up failures of the server.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Cannot create upload directory '{path}': {source}")]
    UploadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}
