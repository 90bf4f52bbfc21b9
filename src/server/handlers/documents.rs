use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use uuid::Uuid;

use crate::errors::ApiError;
use crate::state::AppState;
use crate::status::cache::StatusEntry;

/// Poll the ingestion status of one document. A document the cache has
/// not heard about yet is reported as still processing.
pub async fn get_document_status(
    State(state): State<Arc<AppState>>,
    Path(doc_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let id = doc_id.to_string();
    let entry = state.status_cache.get(&id).await?.unwrap_or(StatusEntry {
        id,
        status: "processing".to_string(),
        desc: Some("File is being processed".to_string()),
    });

    Ok(Json(entry))
}
