//! Queue-driven ingestion worker.
//!
//! Pulls one task at a time from the work queue with long polling. The
//! message is deleted only after the pipeline has emitted its terminal
//! status event; if the worker dies first, the visibility timeout
//! redelivers the task and the pipeline's idempotent upsert absorbs the
//! repeat.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::errors::QueueError;
use crate::ingest::pipeline::IngestionPipeline;
use crate::queue::MessageQueue;

/// Long-poll wait per receive call.
pub const POLL_WAIT: Duration = Duration::from_secs(20);
/// Must exceed the expected pipeline duration; a slower run means the
/// task becomes visible again and may run concurrently on another worker.
pub const VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);
/// Unparsable task messages are dropped after this many receives.
pub const POISON_MAX_RECEIVES: u32 = 5;

/// One unit of ingestion work, as carried on the work queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestTask {
    pub doc_id: String,
    pub key: String,
}

impl IngestTask {
    pub fn from_json(body: &str) -> Result<Self, QueueError> {
        serde_json::from_str(body).map_err(|e| QueueError::Malformed(e.to_string()))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("ingest task serialization cannot fail")
    }
}

pub struct IngestWorker {
    queue: Arc<dyn MessageQueue>,
    pipeline: Arc<IngestionPipeline>,
    shutdown: watch::Receiver<bool>,
}

impl IngestWorker {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        pipeline: Arc<IngestionPipeline>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            queue,
            pipeline,
            shutdown,
        }
    }

    /// Poll and process until shutdown is signalled.
    pub async fn run(mut self) {
        tracing::info!("ingestion worker started");
        loop {
            let batch = tokio::select! {
                _ = self.shutdown.changed() => break,
                received = self.queue.receive(1, POLL_WAIT, VISIBILITY_TIMEOUT) => received,
            };

            let messages = match batch {
                Ok(messages) => messages,
                Err(err) => {
                    tracing::error!("work queue receive failed: {}", err);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            for message in messages {
                self.process(&message.body, &message.receipt_handle, message.receive_count)
                    .await;
            }

            if *self.shutdown.borrow() {
                break;
            }
        }
        tracing::info!("ingestion worker stopped");
    }

    async fn process(&self, body: &str, receipt_handle: &str, receive_count: u32) {
        let task = match IngestTask::from_json(body) {
            Ok(task) => task,
            Err(err) => {
                if receive_count >= POISON_MAX_RECEIVES {
                    tracing::error!(
                        "dropping poison task message after {} receives: {}",
                        receive_count,
                        err
                    );
                    if let Err(del_err) = self.queue.delete(receipt_handle).await {
                        tracing::error!("failed to drop poison message: {}", del_err);
                    }
                } else {
                    tracing::warn!("malformed task message (receive {}): {}", receive_count, err);
                }
                return;
            }
        };

        tracing::info!("processing document {} (key '{}')", task.doc_id, task.key);

        match self.pipeline.process(&task.doc_id, &task.key).await {
            Ok(_) => {
                // Terminal status is on the channel; the task is done even
                // if the attempt failed.
                if let Err(err) = self.queue.delete(receipt_handle).await {
                    tracing::warn!("failed to delete processed task message: {}", err);
                }
            }
            Err(err) => {
                // Status publish failed; leave the task for redelivery so
                // the attempt produces its one status event eventually.
                tracing::error!(
                    "failed to publish status for document {}: {}",
                    task.doc_id,
                    err
                );
            }
        }
    }
}
