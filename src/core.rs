//! Core generation API: wraps a low-level model client with prompt
//! construction, JSON extraction, quiz validation and a bounded retry loop.
//!
//! The generator is meant to be built once and shared (`Arc`) between
//! requests. It holds no mutable state; each `generate` call brings its own
//! `RetryConfig` and starts from a full budget.

use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{AIError, AttemptError, GenerationError};
use crate::interceptors::{Interceptor, Transcript};
use crate::json_utils::extract_json_object;
use crate::prompt::{add_schema_guidance, quiz_instructions};
use crate::quiz::{Quiz, QuizBlueprint, Validation};
use crate::retry::{Decision, RetryConfig, RetryState};

pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Raw document bytes plus their MIME type, sent as one request part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub mime_type: String,
    pub bytes: Bytes,
}

impl Document {
    pub fn new(mime_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self { mime_type: mime_type.into(), bytes: bytes.into() }
    }

    pub fn pdf(bytes: impl Into<Bytes>) -> Self {
        Self::new(PDF_MIME_TYPE, bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Low-level model client abstraction.
///
/// Implementors send the prompt and the document as two parts of a single
/// request and return the raw model text. Decoding, validation and retries
/// are handled by `QuizGenerator`.
#[async_trait]
pub trait LowLevelClient: Send + Sync + Debug {
    async fn ask_raw(&self, prompt: String, document: Document) -> Result<String, AIError>;

    /// Clone this client into a boxed trait object
    fn clone_box(&self) -> Box<dyn LowLevelClient>;
}

impl Clone for Box<dyn LowLevelClient> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

#[async_trait]
impl LowLevelClient for Box<dyn LowLevelClient> {
    async fn ask_raw(&self, prompt: String, document: Document) -> Result<String, AIError> {
        self.as_ref().ask_raw(prompt, document).await
    }

    fn clone_box(&self) -> Box<dyn LowLevelClient> {
        self.as_ref().clone_box()
    }
}

/// A request to turn an already-persisted document into a quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizRequest {
    pub file_path: PathBuf,
}

impl QuizRequest {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self { file_path: file_path.into() }
    }
}

/// A successfully generated and validated quiz.
#[derive(Debug, Clone)]
pub struct GeneratedQuiz {
    pub quiz: Quiz,
    /// The model's JSON exactly as parsed, before typed decoding.
    pub raw: Value,
    /// Model calls made, including the successful one.
    pub attempts: usize,
}

#[derive(Clone)]
pub struct QuizGenerator<C: LowLevelClient> {
    client: C,
    blueprint: QuizBlueprint,
    validation: Validation,
    interceptor: Option<Arc<dyn Interceptor>>,
}

impl<C: LowLevelClient> Debug for QuizGenerator<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuizGenerator")
            .field("client", &self.client)
            .field("blueprint", &self.blueprint)
            .field("validation", &self.validation)
            .field("interceptor", &self.interceptor.is_some())
            .finish()
    }
}

impl<C: LowLevelClient> QuizGenerator<C> {
    pub fn new(client: C) -> Self {
        info!("Creating new QuizGenerator");
        Self {
            client,
            blueprint: QuizBlueprint::default(),
            validation: Validation::default(),
            interceptor: None,
        }
    }

    #[must_use]
    pub fn with_blueprint(mut self, blueprint: QuizBlueprint) -> Self {
        self.blueprint = blueprint;
        self
    }

    #[must_use]
    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }

    #[must_use]
    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptor = Some(interceptor);
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn blueprint(&self) -> &QuizBlueprint {
        &self.blueprint
    }

    /// The full prompt sent with every document.
    pub fn prompt(&self) -> String {
        add_schema_guidance::<Quiz>(quiz_instructions(&self.blueprint))
    }

    /// Generate a quiz for the document at `request.file_path`.
    ///
    /// Makes at most `retry.max_attempts` model calls. Non-retryable failures
    /// end the loop immediately as `GenerationError::Fatal`; running out of
    /// budget yields `GenerationError::Exhausted` carrying the last failure.
    #[instrument(target = "pdf_quiz::generator", skip(self, request, retry), fields(path = %request.file_path.display(), max_attempts = retry.max_attempts))]
    pub async fn generate(&self, request: &QuizRequest, retry: &RetryConfig) -> Result<GeneratedQuiz, GenerationError> {
        let bytes = tokio::fs::read(&request.file_path).await.map_err(|source| {
            error!(error = %source, "Failed to read document");
            GenerationError::Document { path: request.file_path.clone(), source }
        })?;
        let document = Document::pdf(bytes);
        let prompt = self.prompt();
        debug!(document_len = document.len(), prompt_len = prompt.len(), "Prepared generation request");

        let mut state = RetryState::new(retry);
        loop {
            let attempt = state.begin_attempt();
            let err = match self.attempt(request, attempt, prompt.clone(), document.clone()).await {
                Ok((quiz, raw)) => {
                    info!(attempt, questions = quiz.questions.len(), "Quiz generated");
                    return Ok(GeneratedQuiz { quiz, raw, attempts: attempt });
                }
                Err(e) => e,
            };

            let kind = err.kind();
            match state.on_failure(kind) {
                Decision::Retry(delay) => {
                    warn!(attempt, kind = %kind, error = %err, delay_ms = delay.as_millis() as u64, "Attempt failed, retrying");
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Decision::Exhausted => {
                    error!(attempts = state.attempts(), kind = %kind, error = %err, "Retry budget exhausted");
                    return Err(GenerationError::Exhausted { attempts: state.attempts(), last: err });
                }
                Decision::Fatal => {
                    error!(attempts = state.attempts(), kind = %kind, error = %err, "Non-retryable failure");
                    return Err(GenerationError::Fatal { attempts: state.attempts(), source: err });
                }
            }
        }
    }

    async fn attempt(&self, request: &QuizRequest, attempt: usize, prompt: String, document: Document) -> Result<(Quiz, Value), AttemptError> {
        let raw_text = self.client.ask_raw(prompt, document).await?;
        let result = self.decode(&raw_text);

        if let Some(interceptor) = &self.interceptor {
            let outcome = match &result {
                Ok(_) => "ok".to_string(),
                Err(e) => e.kind().to_string(),
            };
            let transcript = Transcript {
                document: &request.file_path,
                attempt,
                outcome: &outcome,
                response: &raw_text,
            };
            if let Err(e) = interceptor.save(&transcript).await {
                warn!(error = %e, "Failed to save transcript");
            }
        }

        result
    }

    /// Parse, decode and validate raw model text.
    pub fn decode(&self, raw_text: &str) -> Result<(Quiz, Value), AttemptError> {
        let raw = extract_json_object(raw_text)
            .map_err(|e| AttemptError::Json(e, raw_text.to_string()))?;
        let quiz: Quiz = serde_json::from_value(raw.clone())
            .map_err(|e| AttemptError::Json(e, raw_text.to_string()))?;

        if self.validation == Validation::Strict {
            self.blueprint.validate(&quiz)?;
        }
        Ok((quiz, raw))
    }
}
