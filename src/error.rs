use std::path::PathBuf;

use thiserror::Error;

use crate::quiz::ValidationError;
use crate::retry::FailureKind;

/// Terminal outcome of a `QuizGenerator::generate` call that did not produce a quiz.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("failed to read document {}: {source}", path.display())]
    Document {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("generation failed after {attempts} attempt(s) with a non-retryable error: {source}")]
    Fatal {
        attempts: usize,
        #[source]
        source: AttemptError,
    },
    #[error("retry budget exhausted after {attempts} attempt(s); last error: {last}")]
    Exhausted {
        attempts: usize,
        #[source]
        last: AttemptError,
    },
}

impl GenerationError {
    /// Number of model calls made before giving up.
    pub fn attempts(&self) -> usize {
        match self {
            Self::Document { .. } => 0,
            Self::Fatal { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// The failure that ended the call, when a model call was made.
    pub fn last_error(&self) -> Option<&AttemptError> {
        match self {
            Self::Document { .. } => None,
            Self::Fatal { source, .. } => Some(source),
            Self::Exhausted { last, .. } => Some(last),
        }
    }
}

/// Why a single attempt failed.
#[derive(Error, Debug)]
pub enum AttemptError {
    #[error("AI error: {0}")]
    Ai(#[from] AIError),
    #[error("JSON deserialization error: {0}. Raw response: {1}")]
    Json(#[source] serde_json::Error, String),
    #[error("quiz failed validation: {0}")]
    Validation(#[from] ValidationError),
}

impl AttemptError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Ai(e) => e.kind(),
            Self::Json(..) => FailureKind::JsonParse,
            Self::Validation(_) => FailureKind::Validation,
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum AIError {
    #[error("Gemini API error: {0}")]
    Gemini(#[from] GeminiError),
    #[error("Mock client error: {0}")]
    Mock(String),
}

impl AIError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Gemini(e) => e.kind(),
            Self::Mock(_) => FailureKind::Internal,
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum GeminiError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("request timed out")]
    Timeout,
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Rate limit exceeded")]
    RateLimit,
    #[error("Authentication failed")]
    Authentication,
    #[error("prompt blocked: {0}")]
    Blocked(String),
    #[error("response contained no text")]
    EmptyResponse,
}

impl GeminiError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Http(_) => FailureKind::Http,
            Self::Timeout => FailureKind::Timeout,
            Self::RateLimit => FailureKind::RateLimit,
            Self::Authentication => FailureKind::Authentication,
            Self::Api { status, .. } if *status >= 500 => FailureKind::Api,
            Self::Api { .. } => FailureKind::Client,
            Self::Blocked(_) => FailureKind::Blocked,
            // Usually a truncated or filtered candidate; a fresh sample may succeed.
            Self::EmptyResponse => FailureKind::Api,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("environment variable {0} is not set (checked process environment and .env)")]
    MissingKey(&'static str),
}
