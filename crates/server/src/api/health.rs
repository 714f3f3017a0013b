//! Health endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

use super::{read_store, ApiError, ErrorResponse};

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub active_sessions: usize,
    pub users: usize,
    pub saved_databases: usize,
    #[schema(value_type = Object)]
    pub config: serde_json::Value,
}

/// Server liveness plus store counts.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Server is up", body = HealthResponse),
        (status = 500, description = "A store could not be read", body = ErrorResponse)
    )
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, ApiError> {
    let users = read_store(&state.users, |users| users.count()).await?;
    let saved_databases = read_store(&state.databases, |databases| databases.count_all()).await?;
    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        active_sessions: state.sessions.len().await,
        users,
        saved_databases,
        config: state.config.redacted_summary(),
    }))
}

/// Fallback for unknown routes, keeping the JSON error envelope.
pub async fn not_found() -> ApiError {
    super::api_error(StatusCode::NOT_FOUND, "Not found.")
}
