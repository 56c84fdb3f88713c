pub mod clients;
pub mod config;
pub mod core;
pub mod error;
pub mod gateway;
pub mod interceptors;
pub mod json_utils;
pub mod prompt;
pub mod quiz;
pub mod retry;

// Convenient re-exports
pub use crate::core::{Document, GeneratedQuiz, LowLevelClient, QuizGenerator, QuizRequest};
pub use crate::error::{AIError, AttemptError, GenerationError};
pub use crate::quiz::{AnswerOption, Level, Question, Quiz, QuizBlueprint, Validation};
pub use crate::retry::{FailureKind, RetryConfig};
