//! Ingestion orchestrator.
//!
//! One invocation processes one `(doc_id, key)` unit of work end to end:
//! fetch bytes, extract text, chunk, embed, store vectors. A stage failure
//! short-circuits the pipeline; whatever happens, exactly one terminal
//! status event is published on the status channel. The attempt is
//! all-or-nothing and idempotent: the only stateful side effect is the
//! fixed-id vector upsert, so duplicate or concurrent delivery of the same
//! document is safe.

use std::sync::Arc;

use crate::chunk::chunk_text;
use crate::embedder::TextEmbedder;
use crate::errors::{DocumentLoadError, EmbeddingError, QueueError, VectorStoreError};
use crate::extract::extract_pdf_text;
use crate::object_store::ObjectStore;
use crate::queue::MessageQueue;
use crate::status::event::StatusEvent;
use crate::vector_store::VectorStore;

/// Tagged outcome of one pipeline stage, matched by the orchestrator to
/// pick the terminal failure reason.
#[derive(Debug)]
pub enum StageFailure {
    Load(DocumentLoadError),
    Embed(EmbeddingError),
    Store(VectorStoreError),
    Other(String),
}

impl StageFailure {
    /// Human-readable reason carried on the terminal status event.
    pub fn reason(&self) -> &'static str {
        match self {
            StageFailure::Load(_) => "Failed to load document for processing",
            StageFailure::Embed(_) => "Failed to create embeddings of the document",
            StageFailure::Store(_) => "Failed storing processed data in vector store",
            StageFailure::Other(_) => "Failed processing file",
        }
    }

    fn detail(&self) -> String {
        match self {
            StageFailure::Load(e) => e.to_string(),
            StageFailure::Embed(e) => e.to_string(),
            StageFailure::Store(e) => e.to_string(),
            StageFailure::Other(detail) => detail.clone(),
        }
    }
}

#[derive(Clone)]
pub struct IngestionPipeline {
    objects: Arc<dyn ObjectStore>,
    embedder: Arc<dyn TextEmbedder>,
    store: Arc<dyn VectorStore>,
    status_queue: Arc<dyn MessageQueue>,
}

impl IngestionPipeline {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        embedder: Arc<dyn TextEmbedder>,
        store: Arc<dyn VectorStore>,
        status_queue: Arc<dyn MessageQueue>,
    ) -> Self {
        Self {
            objects,
            embedder,
            store,
            status_queue,
        }
    }

    /// Run one ingestion attempt and publish its terminal status event.
    /// Returns the event that was published.
    pub async fn process(&self, doc_id: &str, key: &str) -> Result<StatusEvent, QueueError> {
        // The stages run in their own task: a panic anywhere inside them
        // resolves to the generic failure event instead of killing the
        // caller's loop with no event emitted.
        let attempt = {
            let pipeline = self.clone();
            let doc_id = doc_id.to_string();
            let key = key.to_string();
            tokio::spawn(async move { pipeline.run_stages(&doc_id, &key).await })
        };

        let event = match attempt.await {
            Ok(Ok(chunk_count)) => {
                tracing::info!("document {} ingested ({} chunks)", doc_id, chunk_count);
                StatusEvent::success(doc_id)
            }
            Ok(Err(failure)) => {
                tracing::error!("ingestion of document {} failed: {}", doc_id, failure.detail());
                StatusEvent::failed(doc_id, failure.reason())
            }
            Err(join_err) => {
                let failure = StageFailure::Other(join_err.to_string());
                tracing::error!("ingestion of document {} aborted: {}", doc_id, failure.detail());
                StatusEvent::failed(doc_id, failure.reason())
            }
        };

        self.status_queue.send(&event.to_json()).await?;
        Ok(event)
    }

    async fn run_stages(&self, doc_id: &str, key: &str) -> Result<usize, StageFailure> {
        let bytes = self
            .objects
            .get(key)
            .await
            .map_err(StageFailure::Load)?;

        // PDF parsing is CPU-bound and panics on some malformed inputs;
        // keep it off the async threads.
        let text = tokio::task::spawn_blocking(move || extract_pdf_text(&bytes))
            .await
            .map_err(|e| StageFailure::Other(e.to_string()))?
            .map_err(StageFailure::Load)?;
        if text.trim().is_empty() {
            return Err(StageFailure::Load(DocumentLoadError::EmptyText(
                key.to_string(),
            )));
        }

        let chunks = chunk_text(&text, doc_id).map_err(StageFailure::Load)?;
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();

        let embeddings = self
            .embedder
            .embed(&texts)
            .await
            .map_err(StageFailure::Embed)?;

        self.store
            .add_embeddings(&chunks, &embeddings)
            .await
            .map_err(StageFailure::Store)?;

        Ok(chunks.len())
    }
}
