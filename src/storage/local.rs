//! Local filesystem backend.
//!
//! Stores the state document as `{root}/state.json` for development and
//! single-host deployments. Production deployments on Lambda should use the
//! S3 backend.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── state.json            # Sections, users, feed and run history
//! └── state.tmp             # Present only while a write is in progress
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::ObjectBackend;

const STATE_FILE: &str = "state.json";

/// Local filesystem backend.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root_dir: PathBuf,
}

impl LocalBackend {
    /// Create a new LocalBackend rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Full path of the state document.
    pub fn path(&self) -> PathBuf {
        self.root_dir.join(STATE_FILE)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectBackend for LocalBackend {
    async fn read(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path()).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write(&self, bytes: &[u8]) -> Result<()> {
        let path = self.path();
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    fn location(&self) -> String {
        self.path().display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Snapshot;
    use crate::storage::{DocumentStore, StateStore};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let backend = LocalBackend::new(tmp.path());

        backend.write(b"{}").await.unwrap();
        let data = backend.read().await.unwrap();
        assert_eq!(data, Some(b"{}".to_vec()));
        assert!(!backend.path().with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let backend = LocalBackend::new(tmp.path().join("nested"));

        assert!(backend.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_survives_reopen() {
        let tmp = TempDir::new().unwrap();

        let store = DocumentStore::open(LocalBackend::new(tmp.path()), "202611")
            .await
            .unwrap();
        store.subscribe("12345", "u1").await.unwrap();
        store
            .set_snapshot("12345", &Snapshot::new(7, "Smith"))
            .await
            .unwrap();
        drop(store);

        let reopened = DocumentStore::open(LocalBackend::new(tmp.path()), "202611")
            .await
            .unwrap();
        assert_eq!(
            reopened.snapshot("12345").await.unwrap(),
            Some(Snapshot::new(7, "Smith"))
        );
    }
}
