//! Signup, login and logout.
//!
//! Signup only succeeds once the submitted Neo4j server answers `RETURN 1`;
//! login re-tests the user's most recent database and reports the result
//! without failing the login.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use smartd_connector::{ConnectionTarget, CONNECTION_OK};

use crate::databases::DatabaseInput;
use crate::sessions::{clear_cookie, session_cookie, token_from_headers};
use crate::state::AppState;
use crate::users::validate_signup;

use super::{
    api_error, connector_error, open_connector, parse_body, read_store, store_error, write_store,
    ApiError, ErrorResponse, MessageResponse,
};

type WithCookie<T> = (StatusCode, [(header::HeaderName, String); 1], Json<T>);

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    /// Bolt/Neo4j URI, e.g. `neo4j://localhost:7687`.
    pub full_url: String,
    pub server_username: String,
    pub server_password: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Outcome of testing a saved database.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ConnectionStatus {
    pub success: bool,
    pub message: String,
    pub url: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    pub username: String,
    /// Database selected for the new session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neo4j: Option<ConnectionStatus>,
}

/// Create an account after verifying the user's Neo4j server.
#[utoipa::path(
    post,
    path = "/test_neo4j_and_signup/",
    tag = "Auth",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created and logged in", body = AuthResponse),
        (status = 400, description = "Invalid username, password or URI", body = ErrorResponse),
        (status = 409, description = "Username taken", body = ErrorResponse),
        (status = 502, description = "Neo4j connection test failed", body = ErrorResponse)
    )
)]
pub async fn signup(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<WithCookie<AuthResponse>, ApiError> {
    let req = parse_body(body)?;
    validate_signup(&req.username, &req.password).map_err(store_error)?;
    let username = req.username.clone();
    if read_store(&state.users, move |users| users.exists(&username)).await? {
        return Err(api_error(
            StatusCode::CONFLICT,
            "A user with that username already exists.",
        ));
    }

    let target = ConnectionTarget::parse(&req.full_url, &req.server_username, &req.server_password)
        .map_err(connector_error)?;
    let connector = open_connector(&state, &target).await?;

    let (username, password) = (req.username.clone(), req.password.clone());
    let created = write_store(&state.users, move |users| users.create(&username, &password)).await;
    if let Err(e) = created {
        connector.close().await;
        return Err(e);
    }
    let input = DatabaseInput {
        owner: req.username.clone(),
        target: target.clone(),
    };
    let added = write_store(&state.databases, move |databases| databases.add_for(&input)).await;
    if let Err(e) = added {
        // Every account owns at least one database.
        let username = req.username.clone();
        if let Err((_, Json(rollback))) =
            write_store(&state.users, move |users| users.delete(&username)).await
        {
            error!("Failed to remove user '{}' after signup error: {}", req.username, rollback.error);
        }
        connector.close().await;
        return Err(e);
    }

    let token = state.sessions.create(&req.username).await;
    state.sessions.select(&token, &target.uri, connector).await;
    info!("User '{}' signed up with {}", req.username, target.uri);

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, session_cookie(&token, state.sessions.ttl()))],
        Json(AuthResponse {
            success: true,
            message: "Signup successful.".to_string(),
            username: req.username,
            database: Some(target.uri),
            neo4j: None,
        }),
    ))
}

/// Log in and re-test the most recently added database.
#[utoipa::path(
    post,
    path = "/test_neo4j_and_login/",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; `neo4j` reports the database test", body = AuthResponse),
        (status = 400, description = "Malformed request", body = ErrorResponse),
        (status = 401, description = "Invalid username or password", body = ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<WithCookie<AuthResponse>, ApiError> {
    let req = parse_body(body)?;
    let (username, password) = (req.username.clone(), req.password.clone());
    let verified = read_store(&state.users, move |users| users.verify(&username, &password)).await?;
    if !verified {
        return Err(api_error(StatusCode::UNAUTHORIZED, "Invalid username or password."));
    }
    let username = req.username.clone();
    write_store(&state.users, move |users| users.record_login(&username)).await?;

    // No session exists until every fallible store read is done.
    let username = req.username.clone();
    let latest = read_store(&state.databases, move |databases| {
        let Some(url) = databases.latest_url_for(&username)? else {
            return Ok(None);
        };
        Ok(Some((databases.find(&username, &url), url)))
    })
    .await?;

    let mut connector = None;
    let neo4j = match latest {
        None => None,
        Some((Ok(Some(db)), _)) => Some(match open_connector(&state, &db.target()).await {
            Ok(c) => {
                connector = Some(c);
                ConnectionStatus {
                    success: true,
                    message: CONNECTION_OK.to_string(),
                    url: db.url,
                }
            }
            Err((_, Json(err))) => ConnectionStatus {
                success: false,
                message: err.error,
                url: db.url,
            },
        }),
        Some((Ok(None), url)) => Some(ConnectionStatus {
            success: false,
            message: "Database not found.".to_string(),
            url,
        }),
        Some((Err(e), url)) => {
            warn!("Saved credentials for {} are unreadable: {}", url, e);
            Some(ConnectionStatus {
                success: false,
                message: format!("Saved credentials could not be read: {}", e),
                url,
            })
        }
    };

    let token = state.sessions.create(&req.username).await;
    let mut database = None;
    if let (Some(connector), Some(status)) = (connector, &neo4j) {
        if state.sessions.select(&token, &status.url, connector).await {
            database = Some(status.url.clone());
        }
    }
    info!("User '{}' logged in", req.username);

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, session_cookie(&token, state.sessions.ttl()))],
        Json(AuthResponse {
            success: true,
            message: "Login successful.".to_string(),
            username: req.username,
            database,
            neo4j,
        }),
    ))
}

/// End the session and close its connector.
#[utoipa::path(
    post,
    path = "/logout/",
    tag = "Auth",
    responses((status = 200, description = "Logged out", body = MessageResponse))
)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> WithCookie<MessageResponse> {
    if let Some(token) = token_from_headers(&headers) {
        state.sessions.remove(&token).await;
    }
    (
        StatusCode::OK,
        [(header::SET_COOKIE, clear_cookie())],
        MessageResponse::ok("Logged out."),
    )
}
