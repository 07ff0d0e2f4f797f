use axum::{Json, extract::State};
use koe_services::{BatchRequest, BatchResult};
use tracing::info;

use crate::{error::ApiError, state::AppState};

/// Fetches the requested artifacts from storage, transcribes and persists them.
pub async fn fetch_and_transcribe(
    State(state): State<AppState>,
    Json(body): Json<BatchRequest>,
) -> Result<Json<BatchResult>, ApiError> {
    info!(
        device_id = ?body.device_id,
        local_date = ?body.local_date,
        paths = body.file_paths.as_ref().map(Vec::len),
        model = ?body.model,
        "Batch requested"
    );
    let result = state.orchestrator.run_batch(&body).await?;
    Ok(Json(result))
}
