//! End-to-end ingestion flow over in-memory infrastructure: a storage
//! event is dispatched onto the work queue, the worker runs the pipeline,
//! the status consumer projects the terminal event into the cache, and
//! the vectors become queryable.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::watch;

use askpdf_backend::embedder::TextEmbedder;
use askpdf_backend::errors::EmbeddingError;
use askpdf_backend::ingest::{handle_storage_event, IngestWorker, IngestionPipeline, StorageEvent};
use askpdf_backend::object_store::InMemoryObjectStore;
use askpdf_backend::queue::{InMemoryQueue, MessageQueue};
use askpdf_backend::status::{StatusCache, StatusConsumer};
use askpdf_backend::vector_store::{SqliteVectorStore, VectorStore};

struct FixedEmbedder;

#[async_trait]
impl TextEmbedder for FixedEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
    }
}

/// Smallest well-formed single-page PDF with one text run.
fn minimal_pdf(content_text: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 72 712 Td ({}) Tj ET", content_text);
    let mut objects = Vec::new();
    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    objects.push("<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string());
    objects.push(
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R \
         /Resources << /Font << /F1 5 0 R >> >> >>"
            .to_string(),
    );
    objects.push(format!(
        "<< /Length {} >>\nstream\n{}\nendstream",
        content.len(),
        content
    ));
    objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string());

    let mut pdf = String::from("%PDF-1.4\n");
    let mut offsets = Vec::new();
    for (i, obj) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, obj));
    }
    let xref_offset = pdf.len();
    pdf.push_str(&format!("xref\n0 {}\n", objects.len() + 1));
    pdf.push_str("0000000000 65535 f \n");
    for offset in &offsets {
        pdf.push_str(&format!("{:010} 00000 n \n", offset));
    }
    pdf.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF",
        objects.len() + 1,
        xref_offset
    ));
    pdf.into_bytes()
}

fn storage_event(key: &str, doc_id: &str) -> StorageEvent {
    StorageEvent {
        bucket: "uploads".to_string(),
        key: key.to_string(),
        metadata: HashMap::from([("doc-id".to_string(), doc_id.to_string())]),
    }
}

async fn wait_for_status(cache: &StatusCache, doc_id: &str) -> (String, Option<String>) {
    for _ in 0..200 {
        if let Some(entry) = cache.get(doc_id).await.unwrap() {
            return (entry.status, entry.desc);
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("no status for document {} within the deadline", doc_id);
}

struct Harness {
    objects: Arc<InMemoryObjectStore>,
    ingest_queue: Arc<dyn MessageQueue>,
    cache: StatusCache,
    store: Arc<SqliteVectorStore>,
    shutdown: watch::Sender<bool>,
    worker: tokio::task::JoinHandle<()>,
    consumer: tokio::task::JoinHandle<()>,
}

async fn start(dir: &TempDir) -> Harness {
    let objects = Arc::new(InMemoryObjectStore::new());
    let ingest_queue: Arc<dyn MessageQueue> = Arc::new(InMemoryQueue::new());
    let status_queue: Arc<dyn MessageQueue> = Arc::new(InMemoryQueue::new());
    let store = Arc::new(
        SqliteVectorStore::new(&dir.path().join("vectors.db"))
            .await
            .unwrap(),
    );
    let cache = StatusCache::in_memory().await.unwrap();

    let pipeline = Arc::new(IngestionPipeline::new(
        Arc::clone(&objects) as Arc<dyn askpdf_backend::object_store::ObjectStore>,
        Arc::new(FixedEmbedder),
        Arc::clone(&store) as Arc<dyn VectorStore>,
        Arc::clone(&status_queue),
    ));

    let (shutdown, worker_rx) = watch::channel(false);
    let consumer_rx = shutdown.subscribe();

    let worker = tokio::spawn(
        IngestWorker::new(Arc::clone(&ingest_queue), pipeline, worker_rx).run(),
    );
    let consumer = tokio::spawn(
        StatusConsumer::new(Arc::clone(&status_queue), cache.clone(), consumer_rx).run(),
    );

    Harness {
        objects,
        ingest_queue,
        cache,
        store,
        shutdown,
        worker,
        consumer,
    }
}

impl Harness {
    async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = tokio::time::timeout(Duration::from_secs(2), self.worker).await;
        let _ = tokio::time::timeout(Duration::from_secs(2), self.consumer).await;
    }
}

#[tokio::test]
async fn upload_event_flows_to_success_status_and_queryable_vectors() {
    let dir = TempDir::new().unwrap();
    let harness = start(&dir).await;

    harness.objects.put(
        "uploads/d1.pdf",
        minimal_pdf("Interest accrues daily on the outstanding principal."),
    );

    let outcome = handle_storage_event(&storage_event("uploads/d1.pdf", "d1"), &harness.ingest_queue)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        askpdf_backend::ingest::DispatchOutcome::Enqueued {
            doc_id: "d1".to_string()
        }
    );

    let (status, desc) = wait_for_status(&harness.cache, "d1").await;
    assert_eq!(status, "success");
    assert_eq!(desc, None);

    let results = harness
        .store
        .query(&[1.0, 0.0, 0.0], 5, Some("d1"))
        .await
        .unwrap();
    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.doc_id == "d1"));
    assert!(results[0]
        .text
        .contains("Interest accrues daily on the outstanding principal."));

    harness.stop().await;
}

#[tokio::test]
async fn missing_object_flows_to_failed_status_with_load_reason() {
    let dir = TempDir::new().unwrap();
    let harness = start(&dir).await;

    handle_storage_event(&storage_event("uploads/ghost.pdf", "d2"), &harness.ingest_queue)
        .await
        .unwrap();

    let (status, desc) = wait_for_status(&harness.cache, "d2").await;
    assert_eq!(status, "failed");
    assert_eq!(
        desc.as_deref(),
        Some("Failed to load document for processing")
    );

    let results = harness.store.query(&[1.0, 0.0, 0.0], 5, Some("d2")).await.unwrap();
    assert!(results.is_empty());

    harness.stop().await;
}
