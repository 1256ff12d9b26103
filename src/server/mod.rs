//! HTTP surface: axum routes over the digest pipeline and document store.
//!
//! ```text
//! GET    /health
//! POST   /upload                          multipart field `newspaper`
//! GET    /documents
//! GET    /documents/:id
//! GET    /documents/:id/summary
//! POST   /documents/:id/generate-summary
//! DELETE /documents/:id
//! GET    /search?q=
//! GET    /uploads/*                       stored images
//! ```

pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ServerError};
pub use routes::router;
pub use state::AppState;

use crate::config::PipelineConfig;
use crate::pipeline::llm::LanguageModel;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

/// Default listen port.
pub const DEFAULT_PORT: u16 = 5000;

/// Default upload body limit in megabytes.
pub const DEFAULT_MAX_UPLOAD_MB: usize = 10;

/// Where and how the server listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory uploads are stored in and served from. Created at start-up.
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Run the server until Ctrl+C or SIGTERM.
pub async fn serve(
    config: ServerConfig,
    model: Arc<dyn LanguageModel>,
    pipeline: PipelineConfig,
) -> Result<(), ServerError> {
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .map_err(|e| ServerError::UploadDir {
            path: config.upload_dir.clone(),
            source: e,
        })?;

    let state = AppState::new(
        model,
        pipeline,
        config.upload_dir.clone(),
        config.max_upload_bytes,
    );
    let app = router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ServerError::Bind {
            addr: addr.clone(),
            source: e,
        })?;
    let local: Option<SocketAddr> = listener.local_addr().ok();
    info!(
        "patrika v{} listening on {} (uploads in {})",
        env!("CARGO_PKG_VERSION"),
        local.map(|a| a.to_string()).unwrap_or(addr),
        config.upload_dir.display()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting graceful shutdown..."),
    }
}
