// src/handlers/assets.rs

//! Serving stored images, degrading to a placeholder when a blob is gone.

use axum::{
    http::{HeaderName, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::{models::question::AssetStatus, storage::BlobStore};

/// Set on placeholder responses so the UI can offer a re-upload.
pub const ASSET_MISSING_HEADER: HeaderName = HeaderName::from_static("x-asset-missing");

/// Returns the blob at `path`, or a placeholder SVG when there is no path,
/// the object is missing, or storage cannot be reached.
pub async fn blob_or_placeholder(blobs: &dyn BlobStore, path: Option<&str>, label: &str) -> Response {
    let Some(path) = path else {
        return placeholder(label);
    };

    match blobs.get(path).await {
        Ok(Some(blob)) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, blob.content_type),
                (header::CACHE_CONTROL, "private, max-age=300".to_string()),
            ],
            blob.bytes,
        )
            .into_response(),
        Ok(None) => {
            tracing::warn!("Referenced blob is missing: {}", path);
            placeholder(label)
        }
        Err(e) => {
            tracing::error!("Failed to fetch blob {}: {:?}", path, e);
            placeholder(label)
        }
    }
}

pub async fn asset_status(blobs: &dyn BlobStore, path: Option<&str>) -> AssetStatus {
    let Some(path) = path else {
        return AssetStatus::None;
    };
    match blobs.exists(path).await {
        Ok(true) => AssetStatus::Present,
        Ok(false) => AssetStatus::Missing,
        Err(e) => {
            tracing::warn!("Could not check blob {}: {:?}", path, e);
            AssetStatus::Missing
        }
    }
}

fn placeholder(label: &str) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/svg+xml".to_string()),
            (header::CACHE_CONTROL, "no-store".to_string()),
            (ASSET_MISSING_HEADER, "true".to_string()),
        ],
        placeholder_svg(label),
    )
        .into_response()
}

pub fn placeholder_svg(label: &str) -> String {
    let label: String = label
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || matches!(c, '-' | ':'))
        .collect();
    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="480" height="160" viewBox="0 0 480 160"><rect width="480" height="160" fill="#f0f2f6" stroke="#c5c9d1" stroke-dasharray="6 4"/><text x="240" y="75" font-family="sans-serif" font-size="16" text-anchor="middle" fill="#5c6370">{} unavailable</text><text x="240" y="100" font-family="sans-serif" font-size="12" text-anchor="middle" fill="#8b919c">The image could not be loaded</text></svg>"##,
        label
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBlobStore;

    #[tokio::test]
    async fn missing_blob_serves_placeholder() {
        let blobs = MemoryBlobStore::new();
        let response =
            blob_or_placeholder(&blobs, Some("questions/x/question.png"), "Question image").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[&ASSET_MISSING_HEADER], "true");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/svg+xml");
    }

    #[tokio::test]
    async fn present_blob_is_served() {
        let blobs = MemoryBlobStore::new();
        blobs
            .put("questions/x/question.png", vec![1, 2], "image/png")
            .await
            .unwrap();
        let response =
            blob_or_placeholder(&blobs, Some("questions/x/question.png"), "Question image").await;
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert!(response.headers().get(&ASSET_MISSING_HEADER).is_none());
    }

    #[tokio::test]
    async fn asset_status_reports_each_case() {
        let blobs = MemoryBlobStore::new();
        blobs.put("a/b.png", vec![1], "image/png").await.unwrap();
        assert_eq!(asset_status(&blobs, None).await, AssetStatus::None);
        assert_eq!(asset_status(&blobs, Some("a/b.png")).await, AssetStatus::Present);
        assert_eq!(asset_status(&blobs, Some("a/c.png")).await, AssetStatus::Missing);
    }

    #[test]
    fn placeholder_label_is_sanitized() {
        let svg = placeholder_svg("<script>Drawing");
        assert!(!svg.contains("<script>"));
        assert!(svg.contains("scriptDrawing unavailable"));
    }
}
