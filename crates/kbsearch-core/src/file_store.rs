//! Directory-backed [`FileStore`]: originals live under `<root>/<document_id>/`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::traits::FileStore;

pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// First regular file stored for the document, if any.
    pub async fn file_path(&self, document_id: &str) -> Option<PathBuf> {
        // Ids come from the index; refuse anything that would escape the root.
        if document_id.is_empty() || document_id.contains(['/', '\\']) || document_id == ".." {
            return None;
        }
        let doc_dir = self.root.join(document_id);
        let mut entries = tokio::fs::read_dir(&doc_dir).await.ok()?;
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                return Some(entry.path());
            }
        }
        None
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn file_exists(&self, document_id: &str) -> bool {
        self.file_path(document_id).await.is_some()
    }
}
