//! Shared application state for the HTTP server.

use std::sync::Arc;

use crate::aws::{AwsCredentials, SqsQueue};
use crate::config::{AppPaths, Settings};
use crate::embedder::FastembedEmbedder;
use crate::llm::GeminiClient;
use crate::queue::MessageQueue;
use crate::rag::RagEngine;
use crate::status::StatusCache;
use crate::vector_store::SqliteVectorStore;

pub struct AppState {
    pub settings: Settings,
    pub rag: Arc<RagEngine>,
    pub status_cache: StatusCache,
    /// Work queue the upload-notification endpoint feeds.
    pub ingest_queue: Arc<dyn MessageQueue>,
    /// Status channel consumed by the background projection task.
    pub status_queue: Arc<dyn MessageQueue>,
}

impl AppState {
    /// Wire up every long-lived client the server needs. Embedding model
    /// download and vector database setup happen here, so startup fails
    /// fast when either is unavailable.
    pub async fn initialize(settings: Settings, paths: &AppPaths) -> anyhow::Result<Arc<Self>> {
        let creds = AwsCredentials::from_env()?;

        let embedder = Arc::new(FastembedEmbedder::new()?);
        let store = Arc::new(SqliteVectorStore::new(&paths.vector_db_path).await?);

        let model_lg = Arc::new(GeminiClient::new(
            settings.gemini_api_key.clone(),
            settings.model_lg.clone(),
        ));
        let model_sm = Arc::new(GeminiClient::new(
            settings.gemini_api_key.clone(),
            settings.model_sm.clone(),
        ));

        let rag = Arc::new(RagEngine::new(embedder, store, model_lg, model_sm));

        let ingest_queue: Arc<dyn MessageQueue> = Arc::new(SqsQueue::new(
            settings.ingest_queue_url.clone(),
            settings.aws_region.clone(),
            creds.clone(),
        ));
        let status_queue: Arc<dyn MessageQueue> = Arc::new(SqsQueue::new(
            settings.status_queue_url.clone(),
            settings.aws_region.clone(),
            creds,
        ));

        let status_cache = StatusCache::in_memory().await?;

        tracing::info!("application state initialized");

        Ok(Arc::new(Self {
            settings,
            rag,
            status_cache,
            ingest_queue,
            status_queue,
        }))
    }
}
