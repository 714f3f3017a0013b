//! HTTP router construction.
//!
//! Assembles all Axum routes, middleware, and OpenAPI docs into a single `Router`.

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::api;
use crate::app_config::build_cors_layer;
use crate::state::AppState;

/// Build the complete application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = build_cors_layer(&state.config.server);

    Router::new()
        .route("/", get(api::pages::root))
        .route("/home/", get(api::pages::home))
        .route("/playground/", get(api::pages::playground))
        .route("/health", get(api::health::health))
        // Auth
        .route("/test_neo4j_and_signup/", post(api::auth::signup))
        .route("/test_neo4j_and_login/", post(api::auth::login))
        .route("/logout/", post(api::auth::logout))
        // Saved databases; the frontend posts to /add_database without the slash
        .route("/get_user_databases/", get(api::databases::list_databases))
        .route("/add_database", post(api::databases::add_database))
        .route("/add_database/", post(api::databases::add_database))
        .route("/select_database/", post(api::databases::select_database))
        .route("/delete_database/", post(api::databases::delete_database))
        // Graph browsing
        .route("/get_database_info/", get(api::graph::database_info))
        .route("/get_nodeEntities/", post(api::graph::node_entities))
        .route("/get_relationshipEntities/", post(api::graph::relationship_entities))
        .fallback(api::health::not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::refresh_session_cookie,
        ))
        .layer(cors)
        .with_state(state)
        .merge(Scalar::with_url("/docs", api::doc::ApiDoc::openapi()))
}

#[cfg(test)]
mod tests;
