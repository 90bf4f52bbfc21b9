//! Storage-event dispatcher.
//!
//! Translates an object-storage upload notification into a task on the
//! work queue. Events without a document id are acknowledged and skipped
//! rather than retried, since redelivery cannot add the missing metadata.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::QueueError;
use crate::ingest::worker::IngestTask;
use crate::queue::MessageQueue;

/// Metadata key carrying the document id, set by the upload endpoint.
pub const DOC_ID_METADATA_KEY: &str = "doc-id";

/// An upload notification from object storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageEvent {
    pub bucket: String,
    pub key: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A task was enqueued for the given document id.
    Enqueued { doc_id: String },
    /// The event carried no document id and was dropped.
    Skipped,
}

/// Enqueue an ingestion task for an upload event.
pub async fn handle_storage_event(
    event: &StorageEvent,
    queue: &Arc<dyn MessageQueue>,
) -> Result<DispatchOutcome, QueueError> {
    let doc_id = match event.metadata.get(DOC_ID_METADATA_KEY) {
        Some(id) if !id.trim().is_empty() => id.clone(),
        _ => {
            tracing::warn!(
                "storage event for '{}' has no document id metadata, skipping",
                event.key
            );
            return Ok(DispatchOutcome::Skipped);
        }
    };

    let task = IngestTask {
        doc_id: doc_id.clone(),
        key: event.key.clone(),
    };
    queue.send(&task.to_json()).await?;

    tracing::info!("queued ingestion of document {} (key '{}')", doc_id, event.key);
    Ok(DispatchOutcome::Enqueued { doc_id })
}
