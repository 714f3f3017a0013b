//! Per-user saved database handlers: list, add, select, delete.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use smartd_connector::target::normalize_uri;
use smartd_connector::ConnectionTarget;

use crate::databases::{DatabaseInput, DatabaseSafe};
use crate::state::AppState;

use super::{
    api_error, connector_error, open_connector, parse_body, read_store, require_user, write_store,
    ApiError, ErrorResponse, MessageResponse,
};

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddDatabaseRequest {
    pub full_url: String,
    pub server_username: String,
    pub server_password: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelectDatabaseRequest {
    pub selected_url: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct DeleteDatabaseRequest {
    pub url: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct DatabaseListResponse {
    pub success: bool,
    pub databases: Vec<DatabaseSafe>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct DatabaseAddedResponse {
    pub success: bool,
    pub message: String,
    pub database: DatabaseSafe,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct DatabaseSelectedResponse {
    pub success: bool,
    pub message: String,
    pub url: String,
}

enum DeleteOutcome {
    Deleted,
    NotFound,
    LastOne,
}

/// Databases saved by the logged-in user (passwords masked).
#[utoipa::path(
    get,
    path = "/get_user_databases/",
    tag = "Databases",
    responses(
        (status = 200, description = "Saved databases, oldest first", body = DatabaseListResponse),
        (status = 401, description = "Not logged in", body = ErrorResponse)
    )
)]
pub async fn list_databases(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<DatabaseListResponse>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let username = user.username.clone();
    let databases = read_store(&state.databases, move |databases| databases.list_for(&username)).await?;
    Ok(Json(DatabaseListResponse {
        success: true,
        databases,
    }))
}

/// Test a server and remember it for the logged-in user.
#[utoipa::path(
    post,
    path = "/add_database/",
    tag = "Databases",
    request_body = AddDatabaseRequest,
    responses(
        (status = 201, description = "Database saved", body = DatabaseAddedResponse),
        (status = 400, description = "Invalid URI", body = ErrorResponse),
        (status = 401, description = "Not logged in", body = ErrorResponse),
        (status = 409, description = "Already saved", body = ErrorResponse),
        (status = 502, description = "Neo4j connection test failed", body = ErrorResponse)
    )
)]
pub async fn add_database(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<AddDatabaseRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DatabaseAddedResponse>), ApiError> {
    let user = require_user(&state, &headers).await?;
    let req = parse_body(body)?;
    let target = ConnectionTarget::parse(&req.full_url, &req.server_username, &req.server_password)
        .map_err(connector_error)?;

    let (username, uri) = (user.username.clone(), target.uri.clone());
    let existing = read_store(&state.databases, move |databases| databases.find(&username, &uri)).await?;
    if existing.is_some() {
        return Err(api_error(StatusCode::CONFLICT, "This database is already added."));
    }

    // Only the probe result matters here; the session keeps its selection.
    let connector = open_connector(&state, &target).await?;
    connector.close().await;

    let input = DatabaseInput {
        owner: user.username.clone(),
        target,
    };
    let database = write_store(&state.databases, move |databases| databases.add_for(&input)).await?;
    info!("User '{}' added database {}", user.username, database.url);

    Ok((
        StatusCode::CREATED,
        Json(DatabaseAddedResponse {
            success: true,
            message: "Database added successfully.".to_string(),
            database,
        }),
    ))
}

/// Connect to one of the user's databases and make it the session's target.
#[utoipa::path(
    post,
    path = "/select_database/",
    tag = "Databases",
    request_body = SelectDatabaseRequest,
    responses(
        (status = 200, description = "Database selected", body = DatabaseSelectedResponse),
        (status = 401, description = "Not logged in", body = ErrorResponse),
        (status = 404, description = "Not one of the user's databases", body = ErrorResponse),
        (status = 502, description = "Neo4j connection test failed", body = ErrorResponse)
    )
)]
pub async fn select_database(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<SelectDatabaseRequest>, JsonRejection>,
) -> Result<Json<DatabaseSelectedResponse>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let req = parse_body(body)?;
    let url = normalize_uri(&req.selected_url).map_err(connector_error)?;

    let username = user.username.clone();
    let db = read_store(&state.databases, move |databases| databases.find(&username, &url))
        .await?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Database not found."))?;

    let connector = open_connector(&state, &db.target()).await?;
    if !state.sessions.select(&user.token, &db.url, connector).await {
        return Err(api_error(StatusCode::UNAUTHORIZED, "Not logged in."));
    }
    info!("User '{}' selected database {}", user.username, db.url);

    Ok(Json(DatabaseSelectedResponse {
        success: true,
        message: "Database selected and connected successfully.".to_string(),
        url: db.url,
    }))
}

/// Forget one of the user's databases. The last remaining one is kept.
#[utoipa::path(
    post,
    path = "/delete_database/",
    tag = "Databases",
    request_body = DeleteDatabaseRequest,
    responses(
        (status = 200, description = "Database deleted", body = MessageResponse),
        (status = 400, description = "Refusing to delete the last database", body = ErrorResponse),
        (status = 401, description = "Not logged in", body = ErrorResponse),
        (status = 404, description = "Not one of the user's databases", body = ErrorResponse)
    )
)]
pub async fn delete_database(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<DeleteDatabaseRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let req = parse_body(body)?;
    let url = normalize_uri(&req.url).map_err(connector_error)?;

    let (username, target_url) = (user.username.clone(), url.clone());
    write_store(&state.databases, move |databases| {
        let owned = databases.list_for(&username)?;
        if !owned.iter().any(|d| d.url == target_url) {
            return Ok(DeleteOutcome::NotFound);
        }
        if owned.len() <= 1 {
            return Ok(DeleteOutcome::LastOne);
        }
        databases.delete_for(&username, &target_url)?;
        Ok(DeleteOutcome::Deleted)
    })
    .await
    .and_then(|outcome| match outcome {
        DeleteOutcome::Deleted => Ok(()),
        DeleteOutcome::NotFound => Err(api_error(StatusCode::NOT_FOUND, "Database not found.")),
        DeleteOutcome::LastOne => Err(api_error(
            StatusCode::BAD_REQUEST,
            "You must have at least one database.",
        )),
    })?;

    let deselected = state.sessions.clear_selection_for(&user.username, &url).await;
    info!(
        "User '{}' deleted database {} ({} sessions deselected)",
        user.username, url, deselected
    );
    Ok(MessageResponse::ok("Database deleted successfully."))
}
