use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

/// Failure while fetching, parsing or chunking a document.
#[derive(Debug, Error)]
pub enum DocumentLoadError {
    #[error("failed to fetch object '{key}': {detail}")]
    Fetch { key: String, detail: String },
    #[error("failed to extract text from PDF: {0}")]
    Extract(String),
    #[error("text extraction resulted in empty content for key '{0}'")]
    EmptyText(String),
    #[error("failed to chunk document {doc_id}: {detail}")]
    Chunk { doc_id: String, detail: String },
}

/// Failure in the embedding model.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("failed to initialize the embedding model: {0}")]
    Init(String),
    #[error("failed to generate embeddings for the provided text: {0}")]
    Inference(String),
}

/// Failure in the vector index.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("vector store initialization failed: {0}")]
    Init(String),
    #[error("invalid input format for chunks or embeddings: {0}")]
    InvalidInput(String),
    #[error("vector store backend error: {0}")]
    Backend(String),
}

/// Failure in the generative model call.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Request(String),
    #[error("LLM returned no usable content")]
    EmptyContent,
}

/// Opaque outward-facing failure of the query engine. Internal detail is
/// logged, never carried here.
#[derive(Debug, Error)]
#[error("An internal error occurred while processing your request.")]
pub struct MessageProcessingError;

/// Failure on the message-queue transport or a malformed message body.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue transport error: {0}")]
    Transport(String),
    #[error("malformed message: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<MessageProcessingError> for ApiError {
    fn from(err: MessageProcessingError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}
