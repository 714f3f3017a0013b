//! Schema and entity queries against the session's selected database.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use smartd_core::{DatabaseInfo, GraphNode, GraphRelationship};

use crate::state::AppState;

use super::{connector_error, parse_body, require_selected, require_user, ApiError, ErrorResponse};

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct NodeEntitiesRequest {
    pub label: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RelationshipEntitiesRequest {
    #[serde(rename = "type")]
    pub rel_type: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct DatabaseInfoResponse {
    pub success: bool,
    #[serde(flatten)]
    pub info: DatabaseInfo,
}

/// `nodeEntities` is `[primeEntities, nodes]`: display names and the nodes
/// they belong to, index for index.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct NodeEntitiesResponse {
    pub success: bool,
    #[serde(rename = "nodeEntities")]
    #[schema(value_type = Vec<Object>)]
    pub node_entities: (Vec<String>, Vec<GraphNode>),
}

/// `relationshipEntities` is `[[startName, endName]..., relationships]`.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RelationshipEntitiesResponse {
    pub success: bool,
    #[serde(rename = "relationshipEntities")]
    #[schema(value_type = Vec<Object>)]
    pub relationship_entities: (Vec<[String; 2]>, Vec<GraphRelationship>),
}

/// Labels, relationship types and property keys of the selected database.
#[utoipa::path(
    get,
    path = "/get_database_info/",
    tag = "Graph",
    responses(
        (status = 200, description = "Database schema overview", body = DatabaseInfoResponse),
        (status = 400, description = "No database selected", body = ErrorResponse),
        (status = 401, description = "Not logged in", body = ErrorResponse),
        (status = 502, description = "Neo4j query failed", body = ErrorResponse)
    )
)]
pub async fn database_info(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<DatabaseInfoResponse>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let selected = require_selected(&state, &user).await?;
    let info = selected.connector.database_info().await.map_err(connector_error)?;
    Ok(Json(DatabaseInfoResponse { success: true, info }))
}

#[utoipa::path(
    post,
    path = "/get_nodeEntities/",
    tag = "Graph",
    request_body = NodeEntitiesRequest,
    responses(
        (status = 200, description = "Nodes carrying the label", body = NodeEntitiesResponse),
        (status = 400, description = "No database selected or invalid label", body = ErrorResponse),
        (status = 401, description = "Not logged in", body = ErrorResponse),
        (status = 502, description = "Neo4j query failed", body = ErrorResponse)
    )
)]
pub async fn node_entities(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<NodeEntitiesRequest>, JsonRejection>,
) -> Result<Json<NodeEntitiesResponse>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let req = parse_body(body)?;
    let selected = require_selected(&state, &user).await?;

    let nodes = selected
        .connector
        .node_entities(&req.label, state.config.neo4j.entity_limit)
        .await
        .map_err(connector_error)?;
    let names: Vec<String> = nodes.iter().map(GraphNode::display_name).collect();

    Ok(Json(NodeEntitiesResponse {
        success: true,
        node_entities: (names, nodes),
    }))
}

#[utoipa::path(
    post,
    path = "/get_relationshipEntities/",
    tag = "Graph",
    request_body = RelationshipEntitiesRequest,
    responses(
        (status = 200, description = "Relationships of the type", body = RelationshipEntitiesResponse),
        (status = 400, description = "No database selected or invalid type", body = ErrorResponse),
        (status = 401, description = "Not logged in", body = ErrorResponse),
        (status = 502, description = "Neo4j query failed", body = ErrorResponse)
    )
)]
pub async fn relationship_entities(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<RelationshipEntitiesRequest>, JsonRejection>,
) -> Result<Json<RelationshipEntitiesResponse>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let req = parse_body(body)?;
    let selected = require_selected(&state, &user).await?;

    let entries = selected
        .connector
        .relationship_entities(&req.rel_type, state.config.neo4j.entity_limit)
        .await
        .map_err(connector_error)?;
    let (names, relationships): (Vec<[String; 2]>, Vec<GraphRelationship>) = entries
        .into_iter()
        .map(|e| ([e.start_name, e.end_name], e.relationship))
        .unzip();

    Ok(Json(RelationshipEntitiesResponse {
        success: true,
        relationship_entities: (names, relationships),
    }))
}
