//! Domain-focused API endpoint modules.
//!
//! Each sub-module owns a single responsibility area.
//! The shared error envelope and session guards live here in mod.rs.

pub(crate) mod auth;
pub(crate) mod databases;
pub(crate) mod doc;
pub(crate) mod graph;
pub(crate) mod health;
pub(crate) mod pages;

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{error, warn};

use smartd_connector::{ConnectionTarget, ConnectorError, GraphConnector};

use crate::credential_store::StoreError;
use crate::sessions::{session_cookie, token_from_headers, SelectedDatabase};
use crate::state::AppState;

// ── Shared types ─────────────────────────────────────────────────

/// Body of every failed request: `{"success": false, "error": "..."}`.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

/// Body of requests that only report an outcome.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
        })
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            success: false,
            error: error.into(),
        }),
    )
}

/// Map a store failure onto the HTTP status it deserves.
pub(crate) fn store_error(e: StoreError) -> ApiError {
    match e {
        StoreError::Conflict(msg) => api_error(StatusCode::CONFLICT, msg),
        StoreError::Invalid(msg) => api_error(StatusCode::BAD_REQUEST, msg),
        other => {
            error!("Store failure: {}", other);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

/// Bad input is the caller's fault; anything else came from the database.
pub(crate) fn connector_error(e: ConnectorError) -> ApiError {
    match e {
        ConnectorError::InvalidUri(_) | ConnectorError::InvalidInput(_) => {
            api_error(StatusCode::BAD_REQUEST, e.to_string())
        }
        other => {
            warn!("Neo4j request failed: {}", other);
            api_error(StatusCode::BAD_GATEWAY, other.to_string())
        }
    }
}

/// Unwrap a JSON body, turning malformed input into a 400 envelope.
pub(crate) fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(v)| v)
        .map_err(|rejection| api_error(StatusCode::BAD_REQUEST, rejection.body_text()))
}

/// Build a connector for `target` and run the `RETURN 1` probe. The
/// connector is closed again if the probe fails.
pub(crate) async fn open_connector(
    state: &AppState,
    target: &ConnectionTarget,
) -> Result<Arc<dyn GraphConnector>, ApiError> {
    let connector = state.connectors.connect(target).map_err(connector_error)?;
    let (ok, message) = connector.test_connection().await;
    if !ok {
        connector.close().await;
        warn!(uri = %target.uri, "Neo4j connection test failed: {}", message);
        return Err(api_error(StatusCode::BAD_GATEWAY, message));
    }
    Ok(connector)
}

// ── Store access ─────────────────────────────────────────────────

/// Run `f` on the blocking pool while holding the store's read lock.
/// The JSON stores do synchronous file I/O.
pub(crate) async fn read_store<S, T, F>(lock: &Arc<RwLock<S>>, f: F) -> Result<T, ApiError>
where
    S: Send + Sync + 'static,
    T: Send + 'static,
    F: FnOnce(&S) -> Result<T, StoreError> + Send + 'static,
{
    let guard = lock.clone().read_owned().await;
    run_blocking(move || f(&*guard)).await
}

/// Like [`read_store`], holding the write lock.
pub(crate) async fn write_store<S, T, F>(lock: &Arc<RwLock<S>>, f: F) -> Result<T, ApiError>
where
    S: Send + Sync + 'static,
    T: Send + 'static,
    F: FnOnce(&S) -> Result<T, StoreError> + Send + 'static,
{
    let guard = lock.clone().write_owned().await;
    run_blocking(move || f(&*guard)).await
}

async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("Store task failed: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Store task failed.")
        })?
        .map_err(store_error)
}

// ── Session guards ───────────────────────────────────────────────

/// The logged-in user behind a request.
pub(crate) struct CurrentUser {
    pub token: String,
    pub username: String,
}

/// Return 401 unless the request carries a live session cookie.
pub(crate) async fn require_user(state: &AppState, headers: &HeaderMap) -> Result<CurrentUser, ApiError> {
    let not_logged_in = || api_error(StatusCode::UNAUTHORIZED, "Not logged in.");
    let token = token_from_headers(headers).ok_or_else(not_logged_in)?;
    let username = state.sessions.username(&token).await.ok_or_else(not_logged_in)?;
    Ok(CurrentUser { token, username })
}

/// Return 400 unless the session has a database selected.
pub(crate) async fn require_selected(state: &AppState, user: &CurrentUser) -> Result<SelectedDatabase, ApiError> {
    state
        .sessions
        .selected(&user.token)
        .await
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "No database selected."))
}

/// Re-issue the session cookie on every response to a live session, so the
/// browser keeps it for as long as the server's idle timer does.
pub(crate) async fn refresh_session_cookie(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let token = token_from_headers(request.headers());
    let mut response = next.run(request).await;

    let Some(token) = token else {
        return response;
    };
    // Login, signup and logout set their own cookie.
    if response.headers().contains_key(header::SET_COOKIE) {
        return response;
    }
    if state.sessions.username(&token).await.is_some() {
        if let Ok(value) = HeaderValue::from_str(&session_cookie(&token, state.sessions.ttl())) {
            response.headers_mut().insert(header::SET_COOKIE, value);
        }
    }
    response
}
