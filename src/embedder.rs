//! Text embedding behind a process-wide model instance.
//!
//! The model is expensive to initialize, so exactly one instance is loaded
//! per process and shared across callers. Inference runs on the blocking
//! thread pool so a slow batch never stalls request tasks.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::errors::EmbeddingError;

/// Embedding dimensionality of all-MiniLM-L6-v2. Ingestion and query must
/// agree on this or retrieval silently breaks.
pub const EMBEDDING_DIM: usize = 384;

const EMBED_BATCH_SIZE: usize = 32;

/// Converts batches of text into fixed-dimension vectors, one per input,
/// order-preserving.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Local embedding via fastembed (all-MiniLM-L6-v2).
#[derive(Clone)]
pub struct FastembedEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
}

impl FastembedEmbedder {
    pub fn new() -> Result<Self, EmbeddingError> {
        let model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false),
        )
        .map_err(|e| EmbeddingError::Init(e.to_string()))?;

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
        })
    }
}

#[async_trait]
impl TextEmbedder for FastembedEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| EmbeddingError::Inference("embedding model lock poisoned".into()))?;
            model
                .embed(texts, Some(EMBED_BATCH_SIZE))
                .map_err(|e| EmbeddingError::Inference(e.to_string()))
        })
        .await
        .map_err(|e| EmbeddingError::Inference(e.to_string()))?
    }
}
