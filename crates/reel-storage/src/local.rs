//! Storage contract and its local filesystem implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

use crate::error::{StorageError, StorageOp, StorageResult};

/// A regular file inside a listed directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// File name without directory
    pub name: String,
    /// Size in bytes
    pub size: u64,
}

/// Where uploads live and artifacts are written.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read a whole file.
    async fn read(&self, path: &Path) -> StorageResult<Vec<u8>>;

    /// Regular files directly inside `dir`, sorted by name.
    async fn list(&self, dir: &Path) -> StorageResult<Vec<FileInfo>>;

    async fn delete(&self, path: &Path) -> StorageResult<()>;

    async fn exists(&self, path: &Path) -> StorageResult<bool>;
}

/// [`Storage`] over the local filesystem.
#[derive(Debug, Default, Clone)]
pub struct LocalStorage;

impl LocalStorage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn read(&self, path: &Path) -> StorageResult<Vec<u8>> {
        debug!(path = %path.display(), "Reading file");
        fs::read(path)
            .await
            .map_err(|e| StorageError::from_io(StorageOp::Read, path, e))
    }

    async fn list(&self, dir: &Path) -> StorageResult<Vec<FileInfo>> {
        let mut entries = fs::read_dir(dir)
            .await
            .map_err(|e| StorageError::from_io(StorageOp::List, dir, e))?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            files.push(FileInfo {
                name: entry.file_name().to_string_lossy().to_string(),
                size: metadata.len(),
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(dir = %dir.display(), "Listed {} files", files.len());
        Ok(files)
    }

    async fn delete(&self, path: &Path) -> StorageResult<()> {
        match fs::remove_file(path).await {
            Ok(()) => {
                info!(path = %path.display(), "Deleted file");
                Ok(())
            }
            Err(e) => Err(StorageError::from_io(StorageOp::Delete, path, e)),
        }
    }

    async fn exists(&self, path: &Path) -> StorageResult<bool> {
        fs::try_exists(path)
            .await
            .map_err(|e| StorageError::from_io(StorageOp::Stat, path, e))
    }
}
