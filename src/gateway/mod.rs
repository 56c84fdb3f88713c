//! HTTP upload gateway: `POST /upload/` takes a multipart PDF upload, stages
//! it on disk and answers with the generated quiz JSON.

pub mod storage;

pub use storage::{sanitize_file_name, StoreError, UploadStore};

use std::io;
use std::sync::Arc;

use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::config::ServerConfig;
use crate::core::{LowLevelClient, QuizGenerator, QuizRequest};
use crate::error::GenerationError;
use crate::retry::RetryConfig;

pub const PDF_ONLY_MESSAGE: &str = "Only PDF files are allowed!";

pub type SharedGenerator = Arc<QuizGenerator<Box<dyn LowLevelClient>>>;

/// Everything a request handler needs. Cheap to clone; nothing in it is mutated per request.
#[derive(Debug, Clone)]
pub struct AppState {
    generator: SharedGenerator,
    store: UploadStore,
    retry: Arc<RetryConfig>,
}

impl AppState {
    pub fn new(generator: QuizGenerator<Box<dyn LowLevelClient>>, store: UploadStore, retry: RetryConfig) -> Self {
        Self {
            generator: Arc::new(generator),
            store,
            retry: Arc::new(retry),
        }
    }

    pub fn store(&self) -> &UploadStore {
        &self.store
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Only PDF files are allowed!")]
    InvalidUpload,
    #[error("No file uploaded")]
    MissingFile,
    #[error("malformed upload: {0}")]
    Multipart(#[from] MultipartError),
    #[error("failed to store upload: {0}")]
    Storage(#[from] StoreError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            // Kept as a 200 with an error body; existing clients check the body.
            Self::InvalidUpload => (StatusCode::OK, json!({ "error": PDF_ONLY_MESSAGE })),
            Self::MissingFile => (StatusCode::BAD_REQUEST, json!({ "error": "No file uploaded" })),
            Self::Multipart(e) => (e.status(), json!({ "error": e.body_text() })),
            // Names whose last component is unusable, e.g. one containing NUL.
            Self::Storage(StoreError::InvalidName(_)) => {
                (StatusCode::BAD_REQUEST, json!({ "error": "Invalid file name" }))
            }
            Self::Storage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Failed to store upload" }),
            ),
            Self::Generation(e) => {
                let status = match e {
                    GenerationError::Document { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                    GenerationError::Fatal { .. } | GenerationError::Exhausted { .. } => StatusCode::BAD_GATEWAY,
                };
                let reason = e.last_error().map_or_else(|| e.to_string(), ToString::to_string);
                (
                    status,
                    json!({
                        "error": "Quiz generation failed",
                        "reason": reason,
                        "kind": e.last_error().map(|last| last.kind().as_str()),
                        "attempts": e.attempts(),
                    }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Build the gateway router.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/upload/", post(upload_pdf))
        .route("/upload", post(upload_pdf))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// Bind `config.bind` and serve until the process is stopped.
pub async fn serve(config: &ServerConfig, state: AppState) -> io::Result<()> {
    state.store.ensure_dir().await?;
    let app = router(state, config.max_upload_bytes);
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!(addr = %listener.local_addr()?, upload_dir = %config.upload_dir.display(), "Upload gateway listening");
    axum::serve(listener, app).await
}

#[instrument(target = "pdf_quiz::gateway", skip_all)]
async fn upload_pdf(State(state): State<AppState>, mut multipart: Multipart) -> Result<Json<Value>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        let Some(file_name) = field.file_name().map(str::to_owned) else {
            continue;
        };

        if !file_name.ends_with(".pdf") {
            warn!(file_name = %file_name, "Rejected non-PDF upload");
            return Err(ApiError::InvalidUpload);
        }

        let bytes = field.bytes().await?;
        let path = state.store.save(&file_name, &bytes).await.map_err(|e| {
            error!(file_name = %file_name, error = %e, "Failed to store upload");
            e
        })?;

        let generated = state.generator.generate(&QuizRequest::new(path), &state.retry).await?;
        info!(file_name = %file_name, attempts = generated.attempts, "Returning generated quiz");
        return Ok(Json(generated.raw));
    }

    warn!("Upload request had no file field");
    Err(ApiError::MissingFile)
}
