//! Landing routes: `/`, `/home/` and `/playground/`.
//!
//! The frontend renders the pages; these endpoints hand it the data it
//! needs to pick a view.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Redirect;
use axum::Json;
use serde::Serialize;

use crate::sessions::token_from_headers;
use crate::state::AppState;

use super::{read_store, require_user, ApiError, ErrorResponse};

#[derive(Serialize, utoipa::ToSchema)]
pub struct HomeResponse {
    pub success: bool,
    pub service: &'static str,
    pub page: &'static str,
    pub version: &'static str,
    /// Logged-in user, if any.
    pub user: Option<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct PlaygroundResponse {
    pub success: bool,
    pub page: &'static str,
    pub user: String,
    /// URLs of the user's saved databases, oldest first.
    pub databases: Vec<String>,
    /// URL of the database selected in this session.
    pub selected: Option<String>,
}

/// Send visitors of the bare root to the home page.
#[utoipa::path(
    get,
    path = "/",
    tag = "Pages",
    responses((status = 303, description = "Redirect to /home/"))
)]
pub async fn root() -> Redirect {
    Redirect::to("/home/")
}

#[utoipa::path(
    get,
    path = "/home/",
    tag = "Pages",
    responses((status = 200, description = "Home page data", body = HomeResponse))
)]
pub async fn home(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Json<HomeResponse> {
    let user = match token_from_headers(&headers) {
        Some(token) => state.sessions.username(&token).await,
        None => None,
    };
    Json(HomeResponse {
        success: true,
        service: "SMARTD Studio",
        page: "home",
        version: env!("CARGO_PKG_VERSION"),
        user,
    })
}

#[utoipa::path(
    get,
    path = "/playground/",
    tag = "Pages",
    responses(
        (status = 200, description = "Playground data", body = PlaygroundResponse),
        (status = 401, description = "Not logged in", body = ErrorResponse)
    )
)]
pub async fn playground(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<PlaygroundResponse>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let username = user.username.clone();
    let databases = read_store(&state.databases, move |databases| databases.list_for(&username))
        .await?
        .into_iter()
        .map(|d| d.url)
        .collect();
    let selected = state.sessions.selected(&user.token).await.map(|s| s.url);
    Ok(Json(PlaygroundResponse {
        success: true,
        page: "playground",
        user: user.username,
        databases,
        selected,
    }))
}
