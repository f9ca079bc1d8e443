//! Remote file storage used for the accounting export and shipping labels.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::error::{FulfillmentError, Result};

/// Trait for a remote file store.
#[async_trait]
pub trait FileTransfer: Send + Sync {
    /// Downloads a file. A missing file is `Ok(None)`, not an error.
    async fn download(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Uploads a file, replacing any previous content.
    async fn upload(&self, path: &str, contents: Vec<u8>) -> Result<()>;
}

#[derive(Debug, Default)]
struct InMemoryFilesState {
    files: HashMap<String, Vec<u8>>,
    fail_on_download: bool,
    fail_on_upload: bool,
}

/// In-memory file store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFileTransfer {
    state: Arc<RwLock<InMemoryFilesState>>,
}

impl InMemoryFileTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on_download(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_download = fail;
    }

    pub fn set_fail_on_upload(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_upload = fail;
    }

    /// Returns a copy of a stored file.
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .files
            .get(path)
            .cloned()
    }

    pub fn file_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .files
            .len()
    }
}

#[async_trait]
impl FileTransfer for InMemoryFileTransfer {
    async fn download(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if state.fail_on_download {
            return Err(FulfillmentError::FileTransfer(format!(
                "Download of {path} failed"
            )));
        }
        Ok(state.files.get(path).cloned())
    }

    async fn upload(&self, path: &str, contents: Vec<u8>) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.fail_on_upload {
            return Err(FulfillmentError::FileTransfer(format!(
                "Upload of {path} failed"
            )));
        }
        state.files.insert(path.to_string(), contents);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_downloads_as_none() {
        let files = InMemoryFileTransfer::new();
        assert_eq!(files.download("exports/sales.csv").await.unwrap(), None);
    }

    #[tokio::test]
    async fn upload_replaces_content() {
        let files = InMemoryFileTransfer::new();

        files.upload("a.txt", b"one".to_vec()).await.unwrap();
        files.upload("a.txt", b"two".to_vec()).await.unwrap();

        assert_eq!(files.download("a.txt").await.unwrap(), Some(b"two".to_vec()));
        assert_eq!(files.file_count(), 1);
    }

    #[tokio::test]
    async fn failure_toggles() {
        let files = InMemoryFileTransfer::new();

        files.set_fail_on_upload(true);
        assert!(files.upload("a.txt", Vec::new()).await.is_err());
        assert!(files.file("a.txt").is_none());

        files.set_fail_on_download(true);
        assert!(files.download("a.txt").await.is_err());
    }
}
