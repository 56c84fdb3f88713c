use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pdf_quiz::clients::{GeminiClient, GeminiConfig, GeminiModel};
use pdf_quiz::config::{ServerConfig, DEFAULT_MAX_UPLOAD_BYTES};
use pdf_quiz::core::{LowLevelClient, QuizGenerator, QuizRequest};
use pdf_quiz::gateway::{self, AppState, UploadStore};
use pdf_quiz::interceptors::FileInterceptor;
use pdf_quiz::quiz::Validation;
use pdf_quiz::retry::RetryConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about = "Turn uploaded PDFs into multiple-choice quizzes", long_about = None)]
#[command(after_help = "ENVIRONMENT VARIABLES:
    GEMINI_API_KEY     API key for the Gemini API (required)
    RUST_LOG           Log filter, e.g. info or pdf_quiz=debug

EXAMPLES:
    quiz-server serve                             # Listen on 0.0.0.0:8000, store uploads in ./uploads
    quiz-server serve --bind 127.0.0.1:9000       # Custom address
    quiz-server generate history.pdf --lenient    # One-off generation, quiz JSON on stdout")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP upload gateway
    Serve(ServeArgs),
    /// Generate a quiz for one local PDF and print it
    Generate {
        /// Path to the PDF document
        path: PathBuf,
        #[command(flatten)]
        generation: GenerationArgs,
    },
}

#[derive(Args)]
struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "QUIZ_BIND", default_value = "0.0.0.0:8000")]
    bind: SocketAddr,

    /// Directory uploads are written to (created if missing)
    #[arg(long, env = "QUIZ_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Maximum accepted upload size in bytes
    #[arg(long, env = "QUIZ_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,

    #[command(flatten)]
    generation: GenerationArgs,
}

#[derive(Args)]
struct GenerationArgs {
    /// Gemini model id
    #[arg(long, env = "GEMINI_MODEL", default_value = "gemini-2.0-flash")]
    model: String,

    /// Total model calls allowed per quiz, including the first
    #[arg(long, env = "QUIZ_MAX_ATTEMPTS", default_value_t = 3)]
    max_attempts: usize,

    /// Timeout for a single model call, in seconds
    #[arg(long, env = "QUIZ_TIMEOUT_SECS", default_value_t = 120)]
    timeout_secs: u64,

    /// Only require the response to decode as a quiz; skip count/answer checks
    #[arg(long)]
    lenient: bool,

    /// Write every raw model response to this directory
    #[arg(long, env = "QUIZ_TRANSCRIPT_DIR")]
    transcript_dir: Option<PathBuf>,
}

impl GenerationArgs {
    fn retry_config(&self) -> RetryConfig {
        RetryConfig::default().with_max_attempts(self.max_attempts)
    }

    fn build_generator(&self) -> Result<QuizGenerator<Box<dyn LowLevelClient>>> {
        let config = GeminiConfig::from_env()?
            .with_model(GeminiModel::from_id(&self.model))
            .with_timeout(Duration::from_secs(self.timeout_secs));
        let client: Box<dyn LowLevelClient> = Box::new(GeminiClient::new(config)?);

        let validation = if self.lenient { Validation::Lenient } else { Validation::Strict };
        let mut generator = QuizGenerator::new(client).with_validation(validation);
        if let Some(dir) = &self.transcript_dir {
            info!(dir = %dir.display(), "Recording model transcripts");
            generator = generator.with_interceptor(Arc::new(FileInterceptor::new(dir.clone())));
        }
        Ok(generator)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env first so RUST_LOG in .env is seen
    let _ = dotenvy::dotenv();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    match Cli::parse().command {
        Command::Serve(args) => {
            let config = ServerConfig {
                bind: args.bind,
                upload_dir: args.upload_dir.clone(),
                max_upload_bytes: args.max_upload_bytes,
            };
            let generator = args.generation.build_generator()?;
            let state = AppState::new(
                generator,
                UploadStore::new(&config.upload_dir),
                args.generation.retry_config(),
            );
            gateway::serve(&config, state).await.context("upload gateway stopped")?;
        }
        Command::Generate { path, generation } => {
            let generator = generation.build_generator()?;
            let generated = generator
                .generate(&QuizRequest::new(&path), &generation.retry_config())
                .await
                .with_context(|| format!("failed to generate a quiz for {}", path.display()))?;
            info!(attempts = generated.attempts, questions = generated.quiz.questions.len(), "Done");
            println!("{}", serde_json::to_string_pretty(&generated.raw)?);
        }
    }

    Ok(())
}
