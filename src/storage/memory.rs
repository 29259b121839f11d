// src/storage/memory.rs

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Blob, BlobStore, validate_path};
use crate::error::AppError;

#[derive(Default)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<String, Blob>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), AppError> {
        validate_path(path)?;
        self.objects.write().await.insert(
            path.to_string(),
            Blob {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Blob>, AppError> {
        validate_path(path)?;
        Ok(self.objects.read().await.get(path).cloned())
    }

    async fn delete(&self, path: &str) -> Result<(), AppError> {
        validate_path(path)?;
        self.objects.write().await.remove(path);
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, AppError> {
        validate_path(path)?;
        Ok(self.objects.read().await.contains_key(path))
    }
}
