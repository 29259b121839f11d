// src/storage/mod.rs

//! Object storage for question scans and student drawings.

pub mod local;
pub mod memory;
pub mod supabase;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{error::AppError, models::question::AssetKind};

pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;
pub use supabase::SupabaseBlobStore;

/// A stored object and its MIME type.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Creates or replaces the object at `path`.
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), AppError>;

    /// `Ok(None)` when nothing is stored at `path`.
    async fn get(&self, path: &str) -> Result<Option<Blob>, AppError>;

    /// Deleting a missing object is not an error.
    async fn delete(&self, path: &str) -> Result<(), AppError>;

    async fn exists(&self, path: &str) -> Result<bool, AppError> {
        Ok(self.get(path).await?.is_some())
    }
}

/// Rejects absolute paths, empty segments and `..` so a stored path can
/// never escape the bucket or storage root.
pub fn validate_path(path: &str) -> Result<(), AppError> {
    let invalid = || AppError::BadRequest(format!("Invalid storage path '{}'", path));

    if path.is_empty() || path.starts_with('/') || path.contains('\\') {
        return Err(invalid());
    }
    for segment in path.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(invalid());
        }
        if !segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(invalid());
        }
    }
    Ok(())
}

/// `questions/{folder}/question.png`, `questions/{folder}/mark_scheme.jpg`, ...
pub fn question_asset_path(folder: Uuid, kind: AssetKind, extension: &str) -> String {
    format!("questions/{}/{}.{}", folder, kind.file_stem(), extension)
}

/// `attempts/{submission_id}/drawing.png`
pub fn drawing_path(submission_id: Uuid) -> String {
    format!("attempts/{}/drawing.png", submission_id)
}

/// Best-effort removal used when a multi-step write fails half way.
pub async fn delete_quietly(store: &dyn BlobStore, path: &str) {
    if let Err(e) = store.delete(path).await {
        tracing::warn!("Failed to clean up blob {}: {:?}", path, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_paths_are_valid() {
        let id = Uuid::new_v4();
        validate_path(&question_asset_path(id, AssetKind::MarkScheme, "png")).unwrap();
        validate_path(&drawing_path(id)).unwrap();
        assert!(question_asset_path(id, AssetKind::MarkScheme, "jpg").ends_with("/mark_scheme.jpg"));
    }

    #[test]
    fn traversal_and_absolute_paths_are_rejected() {
        for path in ["", "/etc/passwd", "a/../b", "a//b", "a/./b", "a\\b", "a/b c", "./a"] {
            assert!(validate_path(path).is_err(), "{path:?} should be rejected");
        }
    }
}
