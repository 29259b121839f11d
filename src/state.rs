// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    ai::{DisabledExaminer, Examiner, OpenAiExaminer},
    config::{AiConfig, Config, StorageConfig},
    error::AppError,
    storage::{BlobStore, LocalBlobStore, MemoryBlobStore, SupabaseBlobStore},
    store::{Database, MemoryStore},
    utils::inflight::InFlight,
};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
    pub blobs: Arc<dyn BlobStore>,
    pub examiner: Arc<dyn Examiner>,
    pub config: Config,
    pub in_flight: InFlight,
}

impl AppState {
    pub fn new(
        db: Arc<dyn Database>,
        blobs: Arc<dyn BlobStore>,
        examiner: Arc<dyn Examiner>,
        config: Config,
    ) -> Self {
        Self {
            db,
            blobs,
            examiner,
            config,
            in_flight: InFlight::default(),
        }
    }

    /// Memory store, memory blobs and no AI.
    pub fn in_memory(config: Config) -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryBlobStore::new()),
            Arc::new(DisabledExaminer),
            config,
        )
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

pub fn build_blob_store(config: &StorageConfig) -> Result<Arc<dyn BlobStore>, AppError> {
    Ok(match config {
        StorageConfig::Memory => {
            tracing::warn!("Using in-memory blob storage; uploads are lost on restart");
            Arc::new(MemoryBlobStore::new())
        }
        StorageConfig::Local { root } => {
            tracing::info!("Storing blobs under {}", root.display());
            Arc::new(LocalBlobStore::new(root.clone()))
        }
        StorageConfig::Supabase {
            url,
            service_key,
            bucket,
        } => {
            tracing::info!("Storing blobs in Supabase bucket '{}'", bucket);
            Arc::new(SupabaseBlobStore::new(
                url.clone(),
                service_key.clone(),
                bucket.clone(),
            )?)
        }
    })
}

pub fn build_examiner(config: &AiConfig) -> Result<Arc<dyn Examiner>, AppError> {
    Ok(match &config.api_key {
        Some(key) => {
            tracing::info!("AI examiner using model {}", config.model);
            Arc::new(OpenAiExaminer::new(config, key.clone())?)
        }
        None => {
            tracing::warn!("OPENAI_API_KEY not set; generation and marking are disabled");
            Arc::new(DisabledExaminer)
        }
    })
}
