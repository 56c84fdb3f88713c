//! Staging of uploaded documents on the local filesystem.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Upper bound on `name-N.ext` candidates tried for one upload.
const MAX_NAME_CANDIDATES: usize = 10_000;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("unusable file name {0:?}")]
    InvalidName(String),
    #[error("no free file name for {0:?}")]
    NoFreeName(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Writes uploads into a single directory without ever overwriting an existing file.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the upload directory if it does not exist yet.
    pub async fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir).await
    }

    /// Persist `bytes` under the final component of `client_name`.
    ///
    /// If that name is taken, `stem-1.ext`, `stem-2.ext`, ... are tried.
    /// Files are opened with create-new semantics, so two concurrent uploads
    /// with the same name always end up in different files.
    pub async fn save(&self, client_name: &str, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        let name = sanitize_file_name(client_name)
            .ok_or_else(|| StoreError::InvalidName(client_name.to_string()))?;
        if name != client_name {
            warn!(client_name, stored_name = %name, "Stripped directory components from upload name");
        }

        for n in 0..MAX_NAME_CANDIDATES {
            let path = self.dir.join(candidate_name(&name, n));
            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(path = %path.display(), "Upload name taken, trying next");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let written = async {
                file.write_all(bytes).await?;
                file.flush().await
            }
            .await;
            if let Err(e) = written {
                let _ = fs::remove_file(&path).await;
                return Err(e.into());
            }

            info!(path = %path.display(), size = bytes.len(), "Stored upload");
            return Ok(path);
        }

        Err(StoreError::NoFreeName(name))
    }
}

/// Keep only the last path component of a client-supplied name.
///
/// Both `/` and `\` count as separators. Returns `None` when nothing usable is left.
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next()?.trim();
    if last.is_empty() || last == "." || last == ".." || last.contains('\0') {
        return None;
    }
    Some(last.to_string())
}

fn candidate_name(name: &str, n: usize) -> String {
    if n == 0 {
        return name.to_string();
    }
    let path = Path::new(name);
    match (path.file_stem().and_then(|s| s.to_str()), path.extension().and_then(|s| s.to_str())) {
        (Some(stem), Some(ext)) => format!("{stem}-{n}.{ext}"),
        _ => format!("{name}-{n}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_directories() {
        assert_eq!(sanitize_file_name("history.pdf").as_deref(), Some("history.pdf"));
        assert_eq!(sanitize_file_name("../../etc/passwd.pdf").as_deref(), Some("passwd.pdf"));
        assert_eq!(sanitize_file_name(r"C:\docs\notes.pdf").as_deref(), Some("notes.pdf"));
        assert_eq!(sanitize_file_name("dir/.."), None);
        assert_eq!(sanitize_file_name("dir/"), None);
        assert_eq!(sanitize_file_name("bad\0name.pdf"), None);
    }

    #[test]
    fn candidates_number_before_extension() {
        assert_eq!(candidate_name("history.pdf", 0), "history.pdf");
        assert_eq!(candidate_name("history.pdf", 2), "history-2.pdf");
        assert_eq!(candidate_name("archive.tar.pdf", 1), "archive.tar-1.pdf");
    }

    #[tokio::test]
    async fn same_name_uploads_never_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());

        let first = store.save("history.pdf", b"one").await.unwrap();
        let second = store.save("history.pdf", b"two").await.unwrap();

        assert_eq!(first, dir.path().join("history.pdf"));
        assert_eq!(second, dir.path().join("history-1.pdf"));
        assert_eq!(std::fs::read(&first).unwrap(), b"one");
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
    }

    #[tokio::test]
    async fn unusable_name_is_rejected_before_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());

        let err = store.save("bad\0name.pdf", b"x").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidName(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn traversal_stays_inside_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().join("uploads"));
        store.ensure_dir().await.unwrap();

        let path = store.save("../escape.pdf", b"x").await.unwrap();
        assert_eq!(path, dir.path().join("uploads").join("escape.pdf"));
        assert!(!dir.path().join("escape.pdf").exists());
    }
}
