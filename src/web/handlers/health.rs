//! Health check handler.

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::web::dto::HealthResponse;
use crate::web::error::ApiError;
use crate::web::handlers::{blocking, AppState};

/// GET /health - Liveness probe with storage usage.
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HealthResponse>, ApiError> {
    let files = state.files.clone();
    let usage = blocking(move || files.usage()).await?;
    Ok(Json(HealthResponse::ok(usage)))
}
