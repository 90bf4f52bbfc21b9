use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::ApiError;
use crate::rag::DEFAULT_TOP_K;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    /// Restricts retrieval to one document when present.
    pub doc_id: Option<Uuid>,
    pub top_k: Option<usize>,
}

pub async fn query_documents(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.query.trim().is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".to_string()));
    }

    let doc_id = request.doc_id.map(|id| id.to_string());
    let top_k = request.top_k.unwrap_or(DEFAULT_TOP_K);

    let response = state
        .rag
        .generate_augmented_response(&request.query, doc_id.as_deref(), top_k)
        .await?;

    Ok(Json(response))
}
