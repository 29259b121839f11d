// src/storage/local.rs

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;

use super::{Blob, BlobStore, validate_path};
use crate::error::AppError;

/// Stores blobs as files under a root directory, one file per path.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, AppError> {
        validate_path(path)?;
        Ok(self.root.join(path))
    }
}

fn io_error(action: &str, path: &str, e: std::io::Error) -> AppError {
    AppError::InternalServerError(format!("Failed to {} blob {}: {}", action, path, e))
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, path: &str, bytes: Vec<u8>, _content_type: &str) -> Result<(), AppError> {
        let file = self.resolve(path)?;
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error("create folder for", path, e))?;
        }
        tokio::fs::write(&file, bytes)
            .await
            .map_err(|e| io_error("write", path, e))
    }

    async fn get(&self, path: &str) -> Result<Option<Blob>, AppError> {
        let file = self.resolve(path)?;
        match tokio::fs::read(&file).await {
            Ok(bytes) => Ok(Some(Blob {
                bytes,
                content_type: mime_guess::from_path(&file)
                    .first_or_octet_stream()
                    .to_string(),
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error("read", path, e)),
        }
    }

    async fn delete(&self, path: &str) -> Result<(), AppError> {
        let file = self.resolve(path)?;
        match tokio::fs::remove_file(&file).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("delete", path, e)),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, AppError> {
        let file = self.resolve(path)?;
        tokio::fs::try_exists(&file)
            .await
            .map_err(|e| io_error("stat", path, e))
    }
}
