use async_trait::async_trait;
use std::fmt::Debug;
use std::path::Path;

/// One model attempt as seen by an interceptor.
#[derive(Debug, Clone, Copy)]
pub struct Transcript<'a> {
    pub document: &'a Path,
    pub attempt: usize,
    /// `ok` or the failure kind of the attempt.
    pub outcome: &'a str,
    pub response: &'a str,
}

/// Records raw model responses for later inspection.
#[async_trait]
pub trait Interceptor: Send + Sync + Debug {
    async fn save(&self, transcript: &Transcript<'_>) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

pub mod file;
pub use file::FileInterceptor;
