use super::{Interceptor, Transcript};
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Writes one markdown file per attempt into `base_path`.
///
/// Names carry the document stem and a per-interceptor sequence number, and
/// files are opened create-new, so concurrent requests never share a file.
#[derive(Debug)]
pub struct FileInterceptor {
    base_path: PathBuf,
    sequence: AtomicUsize,
}

impl FileInterceptor {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path, sequence: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl Interceptor for FileInterceptor {
    async fn save(&self, transcript: &Transcript<'_>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let timestamp = Utc::now();
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let stem = transcript
            .document
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document");
        let filename = format!(
            "quiz_{}_{}_{:04}_attempt{}.md",
            timestamp.format("%Y%m%d_%H%M%S_%3f"),
            stem,
            seq,
            transcript.attempt
        );
        let file_path = self.base_path.join(filename);

        fs::create_dir_all(&self.base_path).await?;

        let content = format!(
            "# Document\n\n{}\n\n# Attempt\n\n{} ({})\n\n# Response\n\n{}\n",
            transcript.document.display(),
            transcript.attempt,
            transcript.outcome,
            transcript.response
        );

        let mut file = OpenOptions::new().write(true).create_new(true).open(&file_path).await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[tokio::test]
    async fn writes_markdown_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let interceptor = FileInterceptor::new(dir.path().join("transcripts"));
        let transcript = Transcript {
            document: Path::new("uploads/history.pdf"),
            attempt: 2,
            outcome: "json_parse_error",
            response: "not json",
        };
        interceptor.save(&transcript).await.unwrap();

        let mut entries = std::fs::read_dir(dir.path().join("transcripts")).unwrap();
        let entry = entries.next().unwrap().unwrap();
        assert!(entry.file_name().to_string_lossy().ends_with("_attempt2.md"));
        let content = std::fs::read_to_string(entry.path()).unwrap();
        assert!(content.contains("uploads/history.pdf"));
        assert!(content.contains("2 (json_parse_error)"));
        assert!(content.ends_with("not json\n"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_saves_keep_every_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let interceptor = std::sync::Arc::new(FileInterceptor::new(dir.path().to_path_buf()));

        let mut tasks = Vec::new();
        for i in 0..32 {
            let interceptor = interceptor.clone();
            tasks.push(tokio::spawn(async move {
                let response = format!("response {i}");
                let transcript = Transcript {
                    document: Path::new("uploads/history.pdf"),
                    attempt: 1,
                    outcome: "ok",
                    response: &response,
                };
                interceptor.save(&transcript).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let mut bodies: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| std::fs::read_to_string(entry.unwrap().path()).unwrap())
            .collect();
        bodies.sort();
        bodies.dedup();
        assert_eq!(bodies.len(), 32);
    }
}
