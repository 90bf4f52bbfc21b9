use std::sync::Arc;

use tokio::sync::watch;

use askpdf_backend::aws::{AwsCredentials, SqsQueue};
use askpdf_backend::config::{AppPaths, Settings};
use askpdf_backend::embedder::FastembedEmbedder;
use askpdf_backend::ingest::{IngestWorker, IngestionPipeline};
use askpdf_backend::logging;
use askpdf_backend::object_store::S3ObjectStore;
use askpdf_backend::queue::MessageQueue;
use askpdf_backend::vector_store::SqliteVectorStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = AppPaths::new();
    logging::init(&paths, "askpdf-worker.log");

    let settings = Settings::from_env()?;
    let creds = AwsCredentials::from_env()?;

    let objects = Arc::new(S3ObjectStore::new(
        settings.bucket_name.clone(),
        settings.aws_region.clone(),
        creds.clone(),
    ));
    let embedder = Arc::new(FastembedEmbedder::new()?);
    let store = Arc::new(SqliteVectorStore::new(&paths.vector_db_path).await?);

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

    let pipeline = Arc::new(IngestionPipeline::new(
        objects,
        embedder,
        store,
        status_queue,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = IngestWorker::new(ingest_queue, pipeline, shutdown_rx);
    let handle = tokio::spawn(worker.run());

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    handle.await?;

    Ok(())
}
