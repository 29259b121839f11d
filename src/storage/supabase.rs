// src/storage/supabase.rs

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use url::Url;

use super::{Blob, BlobStore, validate_path};
use crate::error::AppError;

/// Supabase Storage over its REST API, authenticated with the service key.
pub struct SupabaseBlobStore {
    client: Client,
    base_url: Url,
    service_key: String,
    bucket: String,
}

impl SupabaseBlobStore {
    /// `base_url` is the project URL with a trailing slash.
    pub fn new(base_url: Url, service_key: String, bucket: String) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;
        Ok(Self {
            client,
            base_url,
            service_key,
            bucket,
        })
    }

    fn object_url(&self, path: &str) -> Result<Url, AppError> {
        validate_path(path)?;
        self.base_url
            .join(&format!("storage/v1/object/{}/{}", self.bucket, path))
            .map_err(|e| AppError::InternalServerError(format!("Bad storage URL: {}", e)))
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
    }
}

/// Storage answers 400 with a "not_found" body for missing objects in some
/// versions and 404 in others.
async fn is_not_found(response: reqwest::Response) -> bool {
    match response.status() {
        StatusCode::NOT_FOUND => true,
        StatusCode::BAD_REQUEST => response
            .text()
            .await
            .map(|body| body.to_lowercase().contains("not_found") || body.contains("404"))
            .unwrap_or(false),
        _ => false,
    }
}

fn storage_error(action: &str, path: &str, status: StatusCode) -> AppError {
    AppError::InternalServerError(format!(
        "Storage {} of {} failed with status {}",
        action, path, status
    ))
}

#[async_trait]
impl BlobStore for SupabaseBlobStore {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), AppError> {
        let url = self.object_url(path)?;
        let response = self
            .authorized(self.client.post(url))
            .header(header::CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await
            .map_err(|e| AppError::InternalServerError(format!("Storage upload failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Upload of {} rejected ({}): {}", path, status, body);
            return Err(storage_error("upload", path, status));
        }
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Blob>, AppError> {
        let url = self.object_url(path)?;
        let response = self
            .authorized(self.client.get(url))
            .send()
            .await
            .map_err(|e| AppError::InternalServerError(format!("Storage download failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            let content_type = response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .unwrap_or_else(|| mime_guess::from_path(path).first_or_octet_stream().to_string());
            let bytes = response
                .bytes()
                .await
                .map_err(|e| AppError::InternalServerError(format!("Storage read failed: {}", e)))?;
            return Ok(Some(Blob {
                bytes: bytes.to_vec(),
                content_type,
            }));
        }

        if is_not_found(response).await {
            return Ok(None);
        }
        Err(storage_error("download", path, status))
    }

    async fn delete(&self, path: &str) -> Result<(), AppError> {
        let url = self.object_url(path)?;
        let response = self
            .authorized(self.client.delete(url))
            .send()
            .await
            .map_err(|e| AppError::InternalServerError(format!("Storage delete failed: {}", e)))?;

        let status = response.status();
        if status.is_success() || is_not_found(response).await {
            return Ok(());
        }
        Err(storage_error("delete", path, status))
    }
}
