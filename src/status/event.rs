//! Terminal ingestion outcome, serialized as JSON on the status queue.

use serde::{Deserialize, Serialize};

use crate::errors::QueueError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStatus {
    Success,
    Failed,
}

impl IngestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestStatus::Success => "success",
            IngestStatus::Failed => "failed",
        }
    }
}

/// One status event per logical ingestion attempt. Delivery may repeat;
/// consumers must treat identical replays as no-ops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub doc_id: String,
    pub status: IngestStatus,
    /// Required iff `status == failed`.
    pub reason: Option<String>,
}

impl StatusEvent {
    pub fn success(doc_id: &str) -> Self {
        Self {
            doc_id: doc_id.to_string(),
            status: IngestStatus::Success,
            reason: None,
        }
    }

    pub fn failed(doc_id: &str, reason: &str) -> Self {
        Self {
            doc_id: doc_id.to_string(),
            status: IngestStatus::Failed,
            reason: Some(reason.to_string()),
        }
    }

    /// Parse and validate a wire body. A `failed` event without a reason
    /// is rejected here, before it can reach the cache.
    pub fn from_json(body: &str) -> Result<Self, QueueError> {
        let event: StatusEvent =
            serde_json::from_str(body).map_err(|e| QueueError::Malformed(e.to_string()))?;

        if event.status == IngestStatus::Failed
            && event.reason.as_deref().map_or(true, |r| r.is_empty())
        {
            return Err(QueueError::Malformed(
                "reason is required when status is 'failed'".to_string(),
            ));
        }

        Ok(event)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("status event serialization cannot fail")
    }
}
