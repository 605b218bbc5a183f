//! Health and readiness probes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use subflow_models::JobId;
use subflow_store::StoreError;

use crate::state::AppState;

/// Liveness probe.
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Readiness probe: round-trips the job store. A NotFound for a random id
/// proves the store answered.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    match state.manager.get_job(&JobId::new()).await {
        Ok(_) | Err(StoreError::NotFound(_)) => {
            (StatusCode::OK, Json(json!({ "status": "ready" })))
        }
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable", "detail": e.to_string() })),
        ),
    }
}
